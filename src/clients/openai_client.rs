use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::registry::{ActionDescriptor, TIME_FORMAT_HINT};
use crate::action::ActionInvocation;
use crate::error::ModelError;
use crate::models::conversation::Turn;
use crate::service::event_format::{format_wall_clock, DISPLAY_TZ};
use crate::service::openai_service::ModelReply;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parallel_tool_calls: Option<bool>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
    // Older completions report a single `function_call` instead of tools.
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn system_prompt(now: DateTime<Utc>) -> String {
    format!(
        "You are a calendar assistant.\n\
         Current date and time (UTC): {now}\n\
         Current date and time (user timezone {tz}): {local} ({weekday})\n\
         Rules:\n\
         - When the user asks to see, create, change or remove calendar events, call exactly one of the provided functions.\n\
         - Express every time argument as a {tz} wall-clock time in the literal format {hint}.\n\
         - Pass attendee emails as a single comma-separated string.\n\
         - Use the event ID exactly as it appears in earlier event listings.\n\
         - Otherwise reply conversationally in plain text.",
        now = now.to_rfc3339(),
        tz = DISPLAY_TZ.name(),
        local = format_wall_clock(&now),
        weekday = now.with_timezone(&DISPLAY_TZ).format("%A"),
        hint = TIME_FORMAT_HINT,
    )
}

pub fn build_request<'a>(
    model: &str,
    history: impl IntoIterator<Item = &'a Turn>,
    actions: &[ActionDescriptor],
    now: DateTime<Utc>,
) -> OpenAIRequest {
    let mut messages = vec![OpenAIMessage {
        role: "system".to_string(),
        content: system_prompt(now),
    }];
    messages.extend(history.into_iter().map(|turn| OpenAIMessage {
        role: turn.role().as_str().to_string(),
        content: turn.content().to_string(),
    }));

    let tools: Vec<Value> = actions.iter().map(|a| a.to_tool_schema()).collect();
    let has_tools = !tools.is_empty();

    OpenAIRequest {
        model: model.to_string(),
        messages,
        tools,
        tool_choice: has_tools.then_some("auto"),
        parallel_tool_calls: has_tools.then_some(false),
        max_tokens: 1500,
        temperature: 0.2,
    }
}

/// Decodes a chat-completions body into plain text or a single action choice.
pub fn parse_completion(body: &str) -> Result<ModelReply, ModelError> {
    let parsed: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::Decode(format!("{}; raw body: {}", e, body)))?;
    let Some(choice) = parsed.choices.into_iter().next() else {
        return Err(ModelError::EmptyResponse);
    };
    let message = choice.message;

    let mut calls = message
        .tool_calls
        .into_iter()
        .map(|call| call.function)
        .chain(message.function_call);
    if let Some(first) = calls.next() {
        let ignored = calls.count();
        if ignored > 0 {
            tracing::warn!(ignored, action = %first.name, "model requested several actions; using the first");
        }
        return Ok(ModelReply::Invocation(ActionInvocation::new(
            first.name,
            first.arguments,
        )));
    }

    match message.content {
        Some(text) => Ok(ModelReply::Text(text)),
        None => Err(ModelError::EmptyResponse),
    }
}

pub async fn query_openai(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &OpenAIRequest,
) -> Result<ModelReply, ModelError> {
    let response = http
        .post(format!("{}/chat/completions", base_url.trim_end_matches('/')))
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        tracing::error!(status = status.as_u16(), body = %text, "openai request failed");
        return Err(ModelError::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    parse_completion(&text)
}
