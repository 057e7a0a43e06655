use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AuthenticationRequired, CalendarError};
use crate::models::event::{CalendarEvent, EventPatch, NewEvent};

pub const UPCOMING_LIMIT: usize = 10;

/// The four operations the dispatcher's handlers need from a calendar.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Future events only, soonest first.
    async fn list_upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, CalendarError>;
    /// Returns the provider's id for the new event.
    async fn create(&self, event: &NewEvent) -> Result<String, CalendarError>;
    async fn update(&self, event_id: &str, patch: &EventPatch) -> Result<(), CalendarError>;
    async fn delete(&self, event_id: &str) -> Result<(), CalendarError>;
}

/// Bootstrap step that yields a pre-authenticated calendar, or the URL the
/// user has to visit first.
#[async_trait]
pub trait CalendarConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn CalendarService>, AuthenticationRequired>;

    /// Called when the provider rejects credentials that `connect` accepted.
    /// `None` means the connector cannot send the user anywhere.
    async fn reauthorize(&self) -> Option<AuthenticationRequired> {
        None
    }
}

/// Connector for a calendar that needs no bootstrap.
pub struct StaticConnector {
    service: Arc<dyn CalendarService>,
}

impl StaticConnector {
    pub fn new(service: Arc<dyn CalendarService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl CalendarConnector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn CalendarService>, AuthenticationRequired> {
        Ok(self.service.clone())
    }
}
