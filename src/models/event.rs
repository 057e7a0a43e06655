use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request-scoped view of an event held by the calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: Option<String>,
    pub attendees: Vec<String>,
}

/// Fields for a new event, already validated and converted to UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub attendees: Vec<String>,
}

/// Partial update. `None` keeps whatever the provider currently stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub attendees: Option<Vec<String>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self == &EventPatch::default()
    }
}

/// Splits a comma-separated attendee list, dropping blanks.
pub fn parse_attendees(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|email| email.trim())
        .filter(|email| !email.is_empty())
        .map(|email| email.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_attendees_trims_and_skips_blanks() {
        assert_eq!(
            parse_attendees(" alice@example.com, ,bob@example.com,"),
            vec!["alice@example.com".to_string(), "bob@example.com".to_string()]
        );
        assert!(parse_attendees("").is_empty());
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(EventPatch::default().is_empty());
        let patch = EventPatch {
            summary: Some("Sync".to_string()),
            ..EventPatch::default()
        };
        assert!(!patch.is_empty());
    }
}
