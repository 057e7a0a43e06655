use std::time::Duration;

use crate::action::CalendarAction;
use crate::error::CalendarError;
use crate::service::calendar_service::{CalendarService, UPCOMING_LIMIT};
use crate::service::event_format::format_event_list;
use crate::service::timeout::{retry_once_on_timeout, DEFAULT_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Text for the user, including converted provider failures.
    Reply(String),
    /// The provider rejected the credentials mid-request.
    Unauthorized,
}

/// Executes validated calendar actions. Provider failures never escape; they
/// become reply text.
#[derive(Debug, Clone)]
pub struct CalendarActionHandler {
    timeout: Duration,
}

impl Default for CalendarActionHandler {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl CalendarActionHandler {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        service: &dyn CalendarService,
        action: &CalendarAction,
    ) -> ActionOutcome {
        let result = match action {
            CalendarAction::ListEvents => self
                .call(action, || service.list_upcoming(UPCOMING_LIMIT))
                .await
                .map(|events| format_event_list(&events)),
            CalendarAction::CreateEvent(event) => self
                .call(action, || service.create(event))
                .await
                .map(|id| format!("Event created successfully with id: {}", id)),
            CalendarAction::UpdateEvent { event_id, patch } => self
                .call(action, || service.update(event_id, patch))
                .await
                .map(|_| "Event has been updated successfully!".to_string()),
            CalendarAction::DeleteEvent { event_id } => self
                .call(action, || service.delete(event_id))
                .await
                .map(|_| "Event deleted successfully.".to_string()),
        };

        match result {
            Ok(text) => ActionOutcome::Reply(text),
            Err(CalendarError::Unauthorized) => ActionOutcome::Unauthorized,
            Err(err) => {
                tracing::warn!(action = action.name(), error = %err, "calendar operation failed");
                ActionOutcome::Reply(failure_text(action, &err))
            }
        }
    }

    async fn call<T, F, Fut>(&self, action: &CalendarAction, call: F) -> Result<T, CalendarError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, CalendarError>>,
    {
        retry_once_on_timeout(self.timeout, action.name(), call)
            .await
            .unwrap_or(Err(CalendarError::Timeout))
    }
}

pub fn failure_text(action: &CalendarAction, err: &CalendarError) -> String {
    if let CalendarError::NotFound(id) = err {
        return format!("No event found with ID {}.", id);
    }
    match action {
        CalendarAction::ListEvents => format!("Failed to list the events. Error: {}", err),
        CalendarAction::CreateEvent(_) => format!("Failed to create the event. Error: {}", err),
        CalendarAction::UpdateEvent { .. } => format!("Failed to update the event. Error: {}", err),
        CalendarAction::DeleteEvent { .. } => format!("Failed to delete the event. Error: {}", err),
    }
}
