use std::fs;

use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::Deserialize;

use crate::error::OAuthError;
use crate::models::token::TokenRecord;

pub const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";
pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }

    /// Parses a Google `client_secret.json` download (`web` or `installed`).
    pub fn from_json(raw: &str) -> Result<Self, OAuthError> {
        let file: ClientSecretsFile =
            serde_json::from_str(raw).map_err(|e| OAuthError::Config(e.to_string()))?;
        file.web
            .or(file.installed)
            .ok_or_else(|| OAuthError::Config("no `web` or `installed` section".to_string()))
    }

    pub fn from_file(path: &str) -> Result<Self, OAuthError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| OAuthError::Config(format!("{}: {}", path, e)))?;
        Self::from_json(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_record(self, previous_refresh: Option<String>, now: DateTime<Utc>) -> TokenRecord {
        let expires_at = now + Duration::seconds(self.expires_in.unwrap_or(3600));
        TokenRecord::new(
            self.access_token,
            self.refresh_token.or(previous_refresh),
            expires_at,
        )
    }
}

#[derive(Debug, Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    secrets: ClientSecrets,
    redirect_uri: String,
}

impl GoogleOAuthClient {
    pub fn new(secrets: ClientSecrets, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secrets,
            redirect_uri,
        }
    }

    /// Consent page the user must visit to grant calendar access.
    pub fn authorization_url(&self) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            &self.secrets.auth_uri,
            &[
                ("client_id", self.secrets.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", CALENDAR_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| OAuthError::Config(format!("invalid auth uri: {}", e)))?;
        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let response = self.post_token(&params).await?;
        Ok(response.into_record(None, Utc::now()))
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.secrets.client_id.as_str()),
            ("client_secret", self.secrets.client_secret.as_str()),
        ];
        let response = self.post_token(&params).await?;
        Ok(response.into_record(Some(refresh_token.to_string()), Utc::now()))
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let response = self
            .http
            .post(&self.secrets.token_uri)
            .form(params)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reads_web_client_secrets() {
        let raw = r#"{"web":{"client_id":"id.apps","client_secret":"s3cret","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","redirect_uris":["http://localhost:5000/oauth2callback"]}}"#;
        let secrets = ClientSecrets::from_json(raw).unwrap();
        assert_eq!(secrets.client_id, "id.apps");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn rejects_secrets_without_known_section() {
        assert!(ClientSecrets::from_json(r#"{"other":{}}"#).is_err());
    }

    #[test]
    fn authorization_url_requests_offline_calendar_scope() {
        let client = GoogleOAuthClient::new(
            ClientSecrets::new("id.apps".to_string(), "s".to_string()),
            "http://127.0.0.1:5000/oauth2callback".to_string(),
        );
        let url = Url::parse(&client.authorization_url().unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "id.apps".to_string())));
        assert!(pairs.contains(&("scope".to_string(), CALENDAR_SCOPE.to_string())));
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://127.0.0.1:5000/oauth2callback".to_string()
        )));
    }

    #[test]
    fn refresh_keeps_previous_refresh_token() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"new","expires_in":3599,"token_type":"Bearer"}"#)
                .unwrap();
        let record = response.into_record(Some("r1".to_string()), now);
        assert_eq!(record.access_token, "new");
        assert_eq!(record.refresh_token.as_deref(), Some("r1"));
        assert_eq!(record.expires_at, now + Duration::seconds(3599));
    }
}
