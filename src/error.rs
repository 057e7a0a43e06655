//! Error types shared across the dispatcher and its collaborators.

use thiserror::Error;

/// Failures talking to the language model. These are the only errors that
/// escape `Dispatcher::handle_turn`.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("language model transport error: {0}")]
    Transport(String),
    #[error("language model request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode language model response: {0}")]
    Decode(String),
    #[error("language model request timed out")]
    Timeout,
    #[error("language model returned no choices")]
    EmptyResponse,
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        ModelError::Transport(err.to_string())
    }
}

/// Error returned to callers of `handle_turn`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    LanguageModel(#[from] ModelError),
}

/// Raised while turning a raw model invocation into a typed calendar action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("malformed arguments for {action}: {reason}")]
    Malformed { action: String, reason: String },
    #[error("missing required field \"{field}\" for {action}")]
    MissingField { action: String, field: String },
    #[error("invalid value for \"{field}\" in {action}: {reason}")]
    InvalidField {
        action: String,
        field: String,
        reason: String,
    },
}

impl ActionError {
    /// Name of the offending parameter, when the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ActionError::MissingField { field, .. } | ActionError::InvalidField { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// A time argument that cannot be read as a US Eastern wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WallClockError {
    #[error("expected YYYY-MM-DDTHH:MM:SSZ, got \"{0}\"")]
    Unparsable(String),
    #[error("{0} does not exist in US Eastern time")]
    Nonexistent(String),
}

/// Failures reported by a calendar service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("event {0} not found")]
    NotFound(String),
    #[error("{0}")]
    Provider(String),
    #[error("calendar credentials were rejected")]
    Unauthorized,
    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CalendarError::Timeout
        } else {
            CalendarError::Provider(err.to_string())
        }
    }
}

/// The calendar bootstrap could not produce an authenticated session. The
/// caller must send the user through `auth_url`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("calendar authorization required: {auth_url}")]
pub struct AuthenticationRequired {
    pub auth_url: String,
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("oauth transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oauth endpoint rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("invalid oauth configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token record is not valid json: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unsupported token record version {0}")]
    UnsupportedVersion(u32),
    #[error("token record has no refresh token")]
    MissingRefreshToken,
    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config line {line}: {content}")]
    InvalidLine { line: usize, content: String },
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
