use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::registry::{
    ActionDescriptor, ActionRegistry, CREATE_EVENT, DELETE_EVENT, LIST_EVENTS, UPDATE_EVENT,
};
use crate::error::ActionError;
use crate::models::event::{parse_attendees, EventPatch, NewEvent};
use crate::service::event_format::parse_wall_clock;

/// Action choice exactly as the language model produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInvocation {
    pub name: String,
    /// JSON text; expected to be a flat object of string values.
    pub arguments: String,
}

impl ActionInvocation {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// Validated calendar operation. Handlers match on this exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarAction {
    ListEvents,
    CreateEvent(NewEvent),
    UpdateEvent { event_id: String, patch: EventPatch },
    DeleteEvent { event_id: String },
}

impl CalendarAction {
    pub fn name(&self) -> &'static str {
        match self {
            CalendarAction::ListEvents => LIST_EVENTS,
            CalendarAction::CreateEvent(_) => CREATE_EVENT,
            CalendarAction::UpdateEvent { .. } => UPDATE_EVENT,
            CalendarAction::DeleteEvent { .. } => DELETE_EVENT,
        }
    }
}

struct Arguments<'a> {
    action: &'a ActionDescriptor,
    values: HashMap<String, String>,
}

impl<'a> Arguments<'a> {
    fn parse(action: &'a ActionDescriptor, raw: &str) -> Result<Self, ActionError> {
        let malformed = |reason: String| ActionError::Malformed {
            action: action.name.to_string(),
            reason,
        };

        let raw = raw.trim();
        let object = if raw.is_empty() {
            serde_json::Map::new()
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(other) => return Err(malformed(format!("expected an object, got {}", other))),
                Err(err) => return Err(malformed(err.to_string())),
            }
        };

        let mut values = HashMap::new();
        for (key, value) in object {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(malformed(format!("\"{}\" must be a string", key)));
                }
            };
            if action.parameter(&key).is_none() {
                tracing::debug!(action = action.name, parameter = %key, "ignoring unknown parameter");
                continue;
            }
            values.insert(key, text);
        }

        let arguments = Self { action, values };
        for param in action.required_parameters() {
            if arguments.optional(param.name).is_none() {
                return Err(ActionError::MissingField {
                    action: action.name.to_string(),
                    field: param.name.to_string(),
                });
            }
        }
        Ok(arguments)
    }

    /// Trimmed value, `None` when absent or blank.
    fn optional(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    /// Missing optional parameters default to the empty string.
    fn text(&self, name: &str) -> String {
        self.optional(name).unwrap_or_default()
    }

    fn time(&self, name: &str) -> Result<Option<DateTime<Utc>>, ActionError> {
        match self.optional(name) {
            Some(value) => parse_wall_clock(&value)
                .map(Some)
                .map_err(|err| self.invalid(name, err.to_string())),
            None => Ok(None),
        }
    }

    fn required_time(&self, name: &str) -> Result<DateTime<Utc>, ActionError> {
        self.time(name)?.ok_or_else(|| ActionError::MissingField {
            action: self.action.name.to_string(),
            field: name.to_string(),
        })
    }

    fn invalid(&self, field: &str, reason: String) -> ActionError {
        ActionError::InvalidField {
            action: self.action.name.to_string(),
            field: field.to_string(),
            reason,
        }
    }
}

/// Resolves an invocation against the registry and turns its argument bag
/// into a typed action.
pub fn decode(
    registry: &ActionRegistry,
    invocation: &ActionInvocation,
) -> Result<CalendarAction, ActionError> {
    let descriptor = registry
        .get(&invocation.name)
        .ok_or_else(|| ActionError::UnknownAction(invocation.name.clone()))?;
    let args = Arguments::parse(descriptor, &invocation.arguments)?;

    match descriptor.name {
        LIST_EVENTS => Ok(CalendarAction::ListEvents),
        CREATE_EVENT => {
            let start = args.required_time("start_time")?;
            let end = args.required_time("end_time")?;
            if end < start {
                return Err(args.invalid("end_time", "must not be before start_time".to_string()));
            }
            Ok(CalendarAction::CreateEvent(NewEvent {
                summary: args.text("summary"),
                location: args.text("location"),
                description: args.text("description"),
                start,
                end,
                timezone: args.text("timezone"),
                attendees: parse_attendees(&args.text("attendees_emails")),
            }))
        }
        UPDATE_EVENT => {
            let start = args.time("start_time")?;
            let end = args.time("end_time")?;
            if let (Some(start), Some(end)) = (start, end) {
                if end < start {
                    return Err(
                        args.invalid("end_time", "must not be before start_time".to_string())
                    );
                }
            }
            let attendees = parse_attendees(&args.text("attendees_emails"));
            Ok(CalendarAction::UpdateEvent {
                event_id: args.text("event_id"),
                patch: EventPatch {
                    summary: args.optional("summary"),
                    location: args.optional("location"),
                    description: args.optional("description"),
                    start,
                    end,
                    timezone: args.optional("timezone"),
                    attendees: if attendees.is_empty() { None } else { Some(attendees) },
                },
            })
        }
        DELETE_EVENT => Ok(CalendarAction::DeleteEvent {
            event_id: args.text("event_id"),
        }),
        other => Err(ActionError::UnknownAction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn decode_raw(name: &str, args: &str) -> Result<CalendarAction, ActionError> {
        decode(&ActionRegistry::calendar(), &ActionInvocation::new(name, args))
    }

    #[test]
    fn list_events_accepts_empty_arguments() {
        assert_eq!(decode_raw("list_events", "").unwrap(), CalendarAction::ListEvents);
        assert_eq!(decode_raw("list_events", "{}").unwrap(), CalendarAction::ListEvents);
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert_eq!(
            decode_raw("send_email", "{}"),
            Err(ActionError::UnknownAction("send_email".to_string()))
        );
    }

    #[test]
    fn create_event_converts_eastern_times() {
        let action = decode_raw(
            "create_event",
            r#"{"summary":"Sync","start_time":"2026-02-11T15:00:00Z","end_time":"2026-02-11T16:00:00Z","timezone":"America/New_York","attendees_emails":"alice@example.com"}"#,
        )
        .unwrap();
        let CalendarAction::CreateEvent(event) = action else {
            panic!("expected create");
        };
        assert_eq!(event.summary, "Sync");
        assert_eq!(event.location, "");
        assert_eq!(event.start, Utc.with_ymd_and_hms(2026, 2, 11, 20, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2026, 2, 11, 21, 0, 0).unwrap());
        assert_eq!(event.attendees, vec!["alice@example.com".to_string()]);
    }

    #[test]
    fn create_event_names_missing_timezone() {
        let err = decode_raw(
            "create_event",
            r#"{"summary":"Sync","start_time":"2026-02-11T15:00:00Z","end_time":"2026-02-11T16:00:00Z"}"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("timezone"));
    }

    #[test]
    fn blank_required_value_counts_as_missing() {
        let err = decode_raw("delete_event", r#"{"event_id":"   "}"#).unwrap_err();
        assert!(matches!(err, ActionError::MissingField { ref field, .. } if field == "event_id"));
    }

    #[test]
    fn nested_values_are_malformed() {
        let err = decode_raw("delete_event", r#"{"event_id":["a","b"]}"#).unwrap_err();
        assert!(matches!(err, ActionError::Malformed { .. }));
        let err = decode_raw("delete_event", "not json").unwrap_err();
        assert!(matches!(err, ActionError::Malformed { .. }));
        let err = decode_raw("delete_event", "[1,2]").unwrap_err();
        assert!(matches!(err, ActionError::Malformed { .. }));
    }

    #[test]
    fn invalid_time_names_field() {
        let err = decode_raw(
            "update_event",
            r#"{"event_id":"abc","start_time":"3pm tomorrow"}"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("start_time"));
    }

    #[test]
    fn update_event_keeps_blank_fields_unset() {
        let action = decode_raw(
            "update_event",
            r#"{"event_id":"abc","summary":"Renamed","location":"","attendees_emails":""}"#,
        )
        .unwrap();
        assert_eq!(
            action,
            CalendarAction::UpdateEvent {
                event_id: "abc".to_string(),
                patch: EventPatch {
                    summary: Some("Renamed".to_string()),
                    ..EventPatch::default()
                },
            }
        );
    }

    #[test]
    fn end_before_start_is_invalid() {
        let err = decode_raw(
            "create_event",
            r#"{"summary":"Sync","start_time":"2026-02-11T16:00:00Z","end_time":"2026-02-11T15:00:00Z","timezone":"EST"}"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("end_time"));
    }
}
