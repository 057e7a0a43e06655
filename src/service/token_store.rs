use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clients::google_oauth::GoogleOAuthClient;
use crate::error::TokenError;
use crate::models::token::TokenRecord;

/// Persistence and renewal of the calendar credentials.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<TokenRecord>, TokenError>;
    async fn save(&self, record: &TokenRecord) -> Result<(), TokenError>;
    /// Obtains a fresh access token for `record` and persists it.
    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, TokenError>;
}

/// Keeps the token record as JSON in a single file.
pub struct FileTokenStore {
    path: PathBuf,
    oauth: GoogleOAuthClient,
    // Held while refreshing so concurrent turns trade the refresh token once.
    refresh_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, oauth: GoogleOAuthClient) -> Self {
        Self {
            path: path.into(),
            oauth,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, TokenError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => TokenRecord::from_json(&raw).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), TokenError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        // Write then rename so a crash never leaves a half-written record.
        // Each write uses its own temp file so concurrent saves cannot collide.
        let tmp = self.path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, record.to_json()?).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        tracing::debug!(path = %self.path.display(), "saved token record");
        Ok(())
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, TokenError> {
        let _guard = self.refresh_lock.lock().await;
        // Another turn may have refreshed while this one waited.
        if let Some(current) = self.load().await? {
            if current != *record && !current.is_expired(Utc::now()) {
                return Ok(current);
            }
        }
        let refresh_token = record
            .refresh_token
            .as_deref()
            .ok_or(TokenError::MissingRefreshToken)?;
        let refreshed = self.oauth.refresh(refresh_token).await?;
        self.save(&refreshed).await?;
        tracing::info!(expires_at = %refreshed.expires_at, "refreshed calendar token");
        Ok(refreshed)
    }
}

/// Finishes the consent flow: trades the authorization code for tokens and
/// stores them.
pub async fn authorize_with_code(
    oauth: &GoogleOAuthClient,
    store: &dyn TokenStore,
    code: &str,
) -> Result<TokenRecord, TokenError> {
    let record = oauth.exchange_code(code.trim()).await?;
    store.save(&record).await?;
    tracing::info!(expires_at = %record.expires_at, "stored calendar authorization");
    Ok(record)
}
