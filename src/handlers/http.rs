use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;
use warp::Filter;

use crate::runtime::App;
use crate::service::dispatcher::TurnReply;
use crate::service::session::SessionId;
use crate::service::token_store::authorize_with_code;

const MAX_BODY_BYTES: u64 = 16 * 1024;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    BadRequest(String),
    Upstream(String),
}

impl ChatFailure {
    fn status(&self) -> StatusCode {
        match self {
            ChatFailure::BadRequest(_) => StatusCode::BAD_REQUEST,
            ChatFailure::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> &str {
        match self {
            ChatFailure::BadRequest(m) | ChatFailure::Upstream(m) => m,
        }
    }
}

/// Runs one chat turn for the session named in the request, creating a new
/// session when none is given.
pub async fn chat(app: &App, request: ChatRequest) -> Result<ChatResponse, ChatFailure> {
    if request.message.trim().is_empty() {
        return Err(ChatFailure::BadRequest("message must not be empty".to_string()));
    }
    // Only ids handed out by this server are accepted; expired ones must start over.
    let session = match request.session_id.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let id = raw
                .parse::<SessionId>()
                .map_err(|_| ChatFailure::BadRequest(format!("invalid session_id: {}", raw)))?;
            app.sessions
                .get(id)
                .await
                .ok_or_else(|| ChatFailure::BadRequest(format!("unknown session_id: {}", raw)))?
        }
        _ => app.sessions.create().await,
    };
    tracing::debug!(session = %session.id(), "chat request");
    let reply = app
        .dispatcher
        .handle_turn(&session, &request.message)
        .await
        .map_err(|err| ChatFailure::Upstream(err.to_string()))?;

    let (response, auth_url) = match reply {
        TurnReply::Message { text } => (text, None),
        TurnReply::AuthenticationRequired { auth_url, text } => (text, Some(auth_url)),
    };
    Ok(ChatResponse {
        session_id: session.id().to_string(),
        response,
        auth_url,
    })
}

async fn handle_chat(
    request: ChatRequest,
    app: Arc<App>,
) -> Result<warp::reply::WithStatus<warp::reply::Json>, Infallible> {
    let reply = match chat(&app, request).await {
        Ok(response) => warp::reply::with_status(warp::reply::json(&response), StatusCode::OK),
        Err(failure) => warp::reply::with_status(
            warp::reply::json(&ErrorMessage {
                error: failure.message().to_string(),
            }),
            failure.status(),
        ),
    };
    Ok(reply)
}

/// Result of the OAuth redirect, as status and plain-text body.
pub async fn oauth_callback(app: &App, params: &HashMap<String, String>) -> (StatusCode, String) {
    let Some(authorization) = &app.authorization else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Calendar authorization is not configured.".to_string(),
        );
    };
    if let Some(error) = params.get("error") {
        return (
            StatusCode::BAD_REQUEST,
            format!("Authorization was not granted: {}", error),
        );
    }
    let Some(code) = params.get("code").filter(|c| !c.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing `code` parameter.".to_string());
    };

    match authorize_with_code(&authorization.oauth, authorization.tokens.as_ref(), code).await {
        Ok(_) => (
            StatusCode::OK,
            "Calendar connected. You can return to the chat.".to_string(),
        ),
        Err(err) => {
            tracing::error!(error = %err, "authorization code exchange failed");
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to complete authorization: {}", err),
            )
        }
    }
}

async fn handle_oauth_callback(
    params: HashMap<String, String>,
    app: Arc<App>,
) -> Result<warp::reply::WithStatus<String>, Infallible> {
    let (status, body) = oauth_callback(&app, &params).await;
    Ok(warp::reply::with_status(body, status))
}

fn with_app(app: Arc<App>) -> impl Filter<Extract = (Arc<App>,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

pub fn routes(
    app: Arc<App>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let chat = warp::path("chat")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_app(app.clone()))
        .and_then(handle_chat);

    let callback = warp::path("oauth2callback")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_app(app))
        .and_then(handle_oauth_callback);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "ok");

    chat.or(callback).or(health)
}
