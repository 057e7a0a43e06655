//! Turns one chat message into at most one calendar operation and a reply.
//!
//! `handle_turn` locks the session's conversation for its whole body, asks
//! the language model what to do, decodes and validates any action the model
//! picked, runs it against the calendar and records the user turn followed by
//! exactly one assistant turn. Only a failure to reach the model escapes as an
//! error; in that case nothing is recorded.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::action::registry::{CREATE_EVENT, DELETE_EVENT, LIST_EVENTS, UPDATE_EVENT};
use crate::action::{decode, ActionInvocation, ActionRegistry};
use crate::error::{ActionError, AuthenticationRequired, CalendarError, DispatchError, ModelError};
use crate::handlers::action::{failure_text, ActionOutcome, CalendarActionHandler};
use crate::models::conversation::Turn;
use crate::service::calendar_service::CalendarConnector;
use crate::service::openai_service::{LanguageModel, ModelReply};
use crate::service::session::Session;
use crate::service::timeout::{retry_once_on_timeout, DEFAULT_TIMEOUT};

pub const GENERIC_FAILURE: &str = "Sorry, I couldn't complete that request.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnReply {
    Message { text: String },
    /// The calendar needs the user to (re)authorize before anything can run.
    AuthenticationRequired { auth_url: String, text: String },
}

impl TurnReply {
    pub fn text(&self) -> &str {
        match self {
            TurnReply::Message { text } | TurnReply::AuthenticationRequired { text, .. } => text,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    model: Arc<dyn LanguageModel>,
    calendar: Arc<dyn CalendarConnector>,
    handler: CalendarActionHandler,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ActionRegistry>,
        model: Arc<dyn LanguageModel>,
        calendar: Arc<dyn CalendarConnector>,
    ) -> Self {
        Self::with_timeout(registry, model, calendar, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        registry: Arc<ActionRegistry>,
        model: Arc<dyn LanguageModel>,
        calendar: Arc<dyn CalendarConnector>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            model,
            calendar,
            handler: CalendarActionHandler::new(timeout),
            timeout,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn handle_turn(
        &self,
        session: &Session,
        user_text: &str,
    ) -> Result<TurnReply, DispatchError> {
        let mut conversation = session.conversation().lock().await;
        let user_turn = Turn::user(user_text);
        let history: Vec<Turn> = conversation.with_pending(&user_turn).cloned().collect();

        let model_reply = retry_once_on_timeout(self.timeout, "language_model", || {
            self.model.complete(&history, self.registry.list_actions())
        })
        .await
        .unwrap_or(Err(ModelError::Timeout))
        .inspect_err(|err| {
            tracing::error!(session = %session.id(), error = %err, "language model call failed");
        })?;

        let reply = match model_reply {
            ModelReply::Text(text) => TurnReply::Message { text },
            ModelReply::Invocation(invocation) => self.run_invocation(session, &invocation).await,
        };

        conversation.record_exchange(user_turn, Turn::assistant(reply.text()));
        Ok(reply)
    }

    async fn run_invocation(&self, session: &Session, invocation: &ActionInvocation) -> TurnReply {
        let action = match decode(&self.registry, invocation) {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(session = %session.id(), action = %invocation.name, error = %err, "rejected model invocation");
                return TurnReply::Message {
                    text: validation_text(&err),
                };
            }
        };
        tracing::info!(session = %session.id(), action = action.name(), "dispatching calendar action");

        let service = match self.calendar.connect().await {
            Ok(service) => service,
            Err(required) => return auth_reply(required),
        };

        match self.handler.execute(service.as_ref(), &action).await {
            ActionOutcome::Reply(text) => TurnReply::Message { text },
            ActionOutcome::Unauthorized => match self.calendar.reauthorize().await {
                Some(required) => auth_reply(required),
                None => TurnReply::Message {
                    text: failure_text(&action, &CalendarError::Unauthorized),
                },
            },
        }
    }
}

fn auth_reply(required: AuthenticationRequired) -> TurnReply {
    TurnReply::AuthenticationRequired {
        text: format!(
            "Calendar authorization required. Visit {} to connect your calendar.",
            required.auth_url
        ),
        auth_url: required.auth_url,
    }
}

fn verb(action: &str) -> &'static str {
    match action {
        LIST_EVENTS => "list",
        CREATE_EVENT => "create",
        UPDATE_EVENT => "update",
        DELETE_EVENT => "delete",
        _ => "run",
    }
}

pub fn validation_text(err: &ActionError) -> String {
    match err {
        ActionError::UnknownAction(_) => GENERIC_FAILURE.to_string(),
        ActionError::Malformed { action, .. } => {
            format!("Sorry, I couldn't understand the details for {}.", action)
        }
        ActionError::MissingField { action, field } => format!(
            "Unable to {} the event: missing required field \"{}\".",
            verb(action),
            field
        ),
        ActionError::InvalidField {
            action,
            field,
            reason,
        } => format!(
            "Unable to {} the event: invalid value for \"{}\": {}.",
            verb(action),
            field,
            reason
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_text_names_field() {
        let text = validation_text(&ActionError::MissingField {
            action: "create_event".to_string(),
            field: "timezone".to_string(),
        });
        assert_eq!(
            text,
            "Unable to create the event: missing required field \"timezone\"."
        );
    }

    #[test]
    fn unknown_action_gets_generic_text() {
        assert_eq!(
            validation_text(&ActionError::UnknownAction("x".to_string())),
            GENERIC_FAILURE
        );
    }

    #[test]
    fn reply_text_for_auth() {
        let reply = auth_reply(AuthenticationRequired {
            auth_url: "https://accounts.example/auth".to_string(),
        });
        assert!(reply.text().contains("https://accounts.example/auth"));
        assert!(matches!(reply, TurnReply::AuthenticationRequired { .. }));
    }
}
