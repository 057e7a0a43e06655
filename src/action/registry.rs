use serde::Serialize;
use serde_json::{json, Map, Value};

pub const LIST_EVENTS: &str = "list_events";
pub const CREATE_EVENT: &str = "create_event";
pub const UPDATE_EVENT: &str = "update_event";
pub const DELETE_EVENT: &str = "delete_event";

/// Literal format every time parameter uses. The trailing `Z` is part of the
/// format; values are Eastern wall-clock times.
pub const TIME_FORMAT_HINT: &str = "YYYY-MM-DDTHH:MM:SSZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
}

impl ParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub required: bool,
    pub description: &'static str,
}

impl ParameterSpec {
    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParameterType::String,
            required: true,
            description,
        }
    }

    const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: ParameterType::String,
            required: false,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSpec>,
}

impl ActionDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// Renders the descriptor as an OpenAI function tool.
    pub fn to_tool_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }
        let required: Vec<&str> = self.required_parameters().map(|p| p.name).collect();

        let mut parameters = json!({
            "type": "object",
            "properties": Value::Object(properties),
        });
        if !required.is_empty() {
            parameters["required"] = json!(required);
        }

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": parameters,
            }
        })
    }
}

/// Fixed catalog of calendar operations, built once at startup.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: Vec<ActionDescriptor>,
}

impl ActionRegistry {
    pub fn calendar() -> Self {
        let actions = vec![
            ActionDescriptor {
                name: LIST_EVENTS,
                description: "List upcoming Google Calendar events",
                parameters: Vec::new(),
            },
            ActionDescriptor {
                name: CREATE_EVENT,
                description: "Create a new event in Google Calendar",
                parameters: vec![
                    ParameterSpec::required("summary", "Event Title"),
                    ParameterSpec::optional("location", "Location"),
                    ParameterSpec::optional("description", "Description"),
                    ParameterSpec::required("start_time", "Start Time (YYYY-MM-DDTHH:MM:SSZ)"),
                    ParameterSpec::required("end_time", "End Time (YYYY-MM-DDTHH:MM:SSZ)"),
                    ParameterSpec::required("timezone", "Timezone"),
                    ParameterSpec::optional(
                        "attendees_emails",
                        "Comma-separated Attendee Emails",
                    ),
                ],
            },
            ActionDescriptor {
                name: UPDATE_EVENT,
                description: "Update an existing Google Calendar event",
                parameters: vec![
                    ParameterSpec::required("event_id", "Event ID"),
                    ParameterSpec::optional("summary", "New Event Title"),
                    ParameterSpec::optional("location", "New Location"),
                    ParameterSpec::optional("description", "New Description"),
                    ParameterSpec::optional(
                        "start_time",
                        "New Start Time (YYYY-MM-DDTHH:MM:SSZ)",
                    ),
                    ParameterSpec::optional("end_time", "New End Time (YYYY-MM-DDTHH:MM:SSZ)"),
                    ParameterSpec::optional("timezone", "Timezone"),
                    ParameterSpec::optional(
                        "attendees_emails",
                        "New Comma-separated Attendee Emails",
                    ),
                ],
            },
            ActionDescriptor {
                name: DELETE_EVENT,
                description: "Delete a Google Calendar event",
                parameters: vec![ParameterSpec::required("event_id", "Event ID to Delete")],
            },
        ];
        Self { actions }
    }

    pub fn list_actions(&self) -> &[ActionDescriptor] {
        &self.actions
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn tool_schemas(&self) -> Vec<Value> {
        self.actions.iter().map(|a| a.to_tool_schema()).collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::calendar()
    }
}
