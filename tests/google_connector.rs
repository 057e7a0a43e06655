use std::sync::Arc;

use async_trait::async_trait;
use calendarBot::clients::google_calendar::GoogleConnector;
use calendarBot::clients::google_oauth::{ClientSecrets, GoogleOAuthClient};
use calendarBot::error::TokenError;
use calendarBot::models::token::TokenRecord;
use calendarBot::service::calendar_service::CalendarConnector;
use calendarBot::service::token_store::TokenStore;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryTokenStore {
    record: Mutex<Option<TokenRecord>>,
    refreshes: Mutex<usize>,
    refresh_fails: bool,
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenRecord>, TokenError> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &TokenRecord) -> Result<(), TokenError> {
        *self.record.lock().await = Some(record.clone());
        Ok(())
    }

    async fn refresh(&self, record: &TokenRecord) -> Result<TokenRecord, TokenError> {
        *self.refreshes.lock().await += 1;
        if self.refresh_fails {
            return Err(TokenError::MissingRefreshToken);
        }
        let refreshed = TokenRecord::new(
            "fresh-access".to_string(),
            record.refresh_token.clone(),
            Utc::now() + Duration::hours(1),
        );
        self.save(&refreshed).await?;
        Ok(refreshed)
    }
}

fn oauth() -> GoogleOAuthClient {
    GoogleOAuthClient::new(
        ClientSecrets::new("client-123".to_string(), "secret".to_string()),
        "http://127.0.0.1:5000/oauth2callback".to_string(),
    )
}

fn record(expires_in: Duration) -> TokenRecord {
    TokenRecord::new(
        "access".to_string(),
        Some("refresh".to_string()),
        Utc::now() + expires_in,
    )
}

#[tokio::test]
async fn missing_token_asks_for_authorization() {
    let store = Arc::new(MemoryTokenStore::default());
    let connector = GoogleConnector::new(store, oauth());

    let Err(required) = connector.connect().await else {
        panic!("expected authorization to be required");
    };
    assert!(required.auth_url.starts_with("https://accounts.google.com/"));
    assert!(required.auth_url.contains("client_id=client-123"));
    assert!(required.auth_url.contains("access_type=offline"));
}

#[tokio::test]
async fn valid_token_connects_without_refresh() {
    let store = Arc::new(MemoryTokenStore {
        record: Mutex::new(Some(record(Duration::hours(1)))),
        ..MemoryTokenStore::default()
    });
    let connector = GoogleConnector::new(store.clone(), oauth());

    assert!(connector.connect().await.is_ok());
    assert_eq!(*store.refreshes.lock().await, 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_saved() {
    let store = Arc::new(MemoryTokenStore {
        record: Mutex::new(Some(record(Duration::minutes(-5)))),
        ..MemoryTokenStore::default()
    });
    let connector = GoogleConnector::new(store.clone(), oauth());

    assert!(connector.connect().await.is_ok());
    assert_eq!(*store.refreshes.lock().await, 1);
    let saved = store.record.lock().await.clone().unwrap();
    assert_eq!(saved.access_token, "fresh-access");
}

#[tokio::test]
async fn failed_refresh_falls_back_to_authorization() {
    let store = Arc::new(MemoryTokenStore {
        record: Mutex::new(Some(record(Duration::minutes(-5)))),
        refresh_fails: true,
        ..MemoryTokenStore::default()
    });
    let connector = GoogleConnector::new(store, oauth());

    assert!(connector.connect().await.is_err());
    assert!(connector.reauthorize().await.is_some());
}
