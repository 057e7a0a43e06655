use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

pub const TOKEN_RECORD_VERSION: u32 = 1;

/// Tokens are treated as expired slightly early so a request never starts
/// with a token that lapses mid-flight.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub version: u32,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            version: TOKEN_RECORD_VERSION,
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn from_json(raw: &str) -> Result<Self, TokenError> {
        let record: TokenRecord = serde_json::from_str(raw)?;
        if record.version != TOKEN_RECORD_VERSION {
            return Err(TokenError::UnsupportedVersion(record.version));
        }
        Ok(record)
    }

    pub fn to_json(&self) -> Result<String, TokenError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_includes_skew() {
        let expires_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = TokenRecord::new("a".to_string(), None, expires_at);
        assert!(!record.is_expired(expires_at - Duration::minutes(5)));
        assert!(record.is_expired(expires_at - Duration::seconds(30)));
        assert!(record.is_expired(expires_at + Duration::minutes(1)));
    }

    #[test]
    fn rejects_unknown_version() {
        let raw = r#"{"version":7,"access_token":"a","expires_at":"2026-03-01T12:00:00Z"}"#;
        assert!(matches!(
            TokenRecord::from_json(raw),
            Err(TokenError::UnsupportedVersion(7))
        ));
    }
}
