use std::collections::HashMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;

use crate::clients::openai_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:5000/oauth2callback";
pub const DEFAULT_TOKEN_PATH: &str = "./data/token.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

/// `KEY=value` pairs read from the file named by `CONFIG_FILE`.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    /// File value first, then the process environment. Blank values count as unset.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.get(key)
            .or_else(|| env::var(key).ok())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredentials {
    Inline {
        client_id: String,
        client_secret: String,
    },
    SecretsFile(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub google: GoogleCredentials,
    pub redirect_uri: String,
    pub token_path: String,
    pub bind_addr: SocketAddr,
    pub request_timeout: Duration,
    pub session_idle_ttl: Duration,
}

impl Settings {
    /// Reads `CONFIG_FILE` when set, then resolves every key with
    /// environment fallback.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match env::var("CONFIG_FILE") {
            Ok(path) => AppConfig::from_file(&path)?,
            Err(_) => AppConfig::default(),
        };
        Self::from_config(&config)
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let openai_api_key = config
            .lookup("OPENAI_API_KEY")
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;

        let google = match (
            config.lookup("GOOGLE_CLIENT_ID"),
            config.lookup("GOOGLE_CLIENT_SECRET"),
            config.lookup("GOOGLE_CLIENT_SECRETS_FILE"),
        ) {
            (Some(client_id), Some(client_secret), _) => GoogleCredentials::Inline {
                client_id,
                client_secret,
            },
            (_, _, Some(path)) => GoogleCredentials::SecretsFile(path),
            _ => {
                return Err(ConfigError::Missing(
                    "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET (or GOOGLE_CLIENT_SECRETS_FILE)",
                ));
            }
        };

        let bind_raw = config
            .lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let request_timeout = positive_secs(config, "REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let session_idle_ttl =
            positive_secs(config, "SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS)?;

        Ok(Self {
            openai_api_key,
            openai_model: config
                .lookup("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: config
                .lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            google,
            redirect_uri: config
                .lookup("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            token_path: config
                .lookup("TOKEN_PATH")
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
            bind_addr,
            request_timeout,
            session_idle_ttl,
        })
    }
}

fn positive_secs(
    config: &AppConfig,
    key: &'static str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match config.lookup(key) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
        None => Ok(Duration::from_secs(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are prefixed so the process environment cannot satisfy them.
    #[test]
    fn parse_handles_comments_exports_and_quotes() {
        let config = AppConfig::parse(
            "# comment\nexport CALBOT_A=\"quoted\"\nCALBOT_B='single'\n\nCALBOT_C = plain \n",
        )
        .unwrap();
        assert_eq!(config.get("CALBOT_A").as_deref(), Some("quoted"));
        assert_eq!(config.get("CALBOT_B").as_deref(), Some("single"));
        assert_eq!(config.get("CALBOT_C").as_deref(), Some("plain"));
    }

    #[test]
    fn parse_rejects_lines_without_equals() {
        let err = AppConfig::parse("GOOD=1\nbroken line\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLine { line: 2, .. }));
    }

    #[test]
    fn settings_read_from_config_file() {
        let config = AppConfig::parse(
            "OPENAI_API_KEY=sk-test\nGOOGLE_CLIENT_ID=id\nGOOGLE_CLIENT_SECRET=secret\nOPENAI_MODEL=gpt-4o-mini\nBIND_ADDR=127.0.0.1:5000\nREQUEST_TIMEOUT_SECS=30\nGOOGLE_REDIRECT_URI=http://127.0.0.1:5000/oauth2callback\nTOKEN_PATH=./data/token.json\nOPENAI_BASE_URL=https://api.openai.com/v1\n",
        )
        .unwrap();
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.openai_api_key, "sk-test");
        assert_eq!(settings.bind_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.session_idle_ttl, Duration::from_secs(3600));
        assert_eq!(
            settings.google,
            GoogleCredentials::Inline {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            }
        );
    }

    #[test]
    fn settings_reject_zero_timeout() {
        let config =
            AppConfig::parse("OPENAI_API_KEY=sk-test\nGOOGLE_CLIENT_SECRETS_FILE=client_secret.json\nREQUEST_TIMEOUT_SECS=0\n").unwrap();
        assert!(matches!(
            Settings::from_config(&config),
            Err(ConfigError::InvalidValue { key: "REQUEST_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn settings_read_session_idle_ttl() {
        let config = AppConfig::parse(
            "OPENAI_API_KEY=sk-test\nGOOGLE_CLIENT_SECRETS_FILE=client_secret.json\nSESSION_IDLE_SECS=120\n",
        )
        .unwrap();
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.session_idle_ttl, Duration::from_secs(120));
    }
}
