use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::clients::google_oauth::{GoogleOAuthClient, DEFAULT_AUTH_URI};
use crate::error::{AuthenticationRequired, CalendarError};
use crate::models::event::{CalendarEvent, EventPatch, NewEvent};
use crate::service::calendar_service::{CalendarConnector, CalendarService};
use crate::service::event_format::eastern_to_utc;
use crate::service::token_store::TokenStore;

pub const DEFAULT_EVENTS_URL: &str =
    "https://www.googleapis.com/calendar/v3/calendars/primary/events";

// Reminder and conferencing defaults applied to every created event.
const EMAIL_REMINDER_MINUTES: u32 = 24 * 60;
const POPUP_REMINDER_MINUTES: u32 = 10;

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start: EventTime,
    end: EventTime,
    #[serde(default)]
    attendees: Vec<Attendee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date_time: Option<DateTime<FixedOffset>>,
    date: Option<NaiveDate>,
    time_zone: Option<String>,
}

impl EventTime {
    /// All-day events only carry a date; they start at Eastern midnight.
    fn instant(&self) -> Option<DateTime<Utc>> {
        match (self.date_time, self.date) {
            (Some(dt), _) => Some(dt.with_timezone(&Utc)),
            (None, Some(date)) => eastern_to_utc(date.and_time(NaiveTime::MIN)),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Attendee {
    email: Option<String>,
}

impl GoogleEvent {
    fn into_calendar_event(self) -> Option<CalendarEvent> {
        Some(CalendarEvent {
            start: self.start.instant()?,
            end: self.end.instant()?,
            timezone: self.start.time_zone,
            id: self.id,
            title: self.summary,
            location: self.location,
            description: self.description,
            attendees: self.attendees.into_iter().filter_map(|a| a.email).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

fn rfc3339(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Only tz database names are passed through; anything else ("Eastern Time")
/// falls back to UTC since the instants are already absolute.
fn provider_time_zone(requested: &str) -> String {
    match requested.parse::<Tz>() {
        Ok(tz) => tz.name().to_string(),
        Err(_) => "UTC".to_string(),
    }
}

fn event_time(instant: &DateTime<Utc>, time_zone: &str) -> Value {
    json!({
        "dateTime": rfc3339(instant),
        "timeZone": time_zone,
    })
}

fn attendee_list(emails: &[String]) -> Value {
    Value::Array(emails.iter().map(|email| json!({ "email": email })).collect())
}

pub fn create_body(event: &NewEvent, conference_request_id: &str) -> Value {
    let time_zone = provider_time_zone(&event.timezone);
    json!({
        "summary": event.summary,
        "location": event.location,
        "description": event.description,
        "start": event_time(&event.start, &time_zone),
        "end": event_time(&event.end, &time_zone),
        "attendees": attendee_list(&event.attendees),
        "reminders": {
            "useDefault": false,
            "overrides": [
                { "method": "email", "minutes": EMAIL_REMINDER_MINUTES },
                { "method": "popup", "minutes": POPUP_REMINDER_MINUTES },
            ],
        },
        "conferenceData": {
            "createRequest": {
                "requestId": conference_request_id,
                "conferenceSolutionKey": { "type": "hangoutsMeet" },
            },
        },
    })
}

/// Applies a patch to the event resource fetched from the provider.
pub fn apply_patch(resource: &mut Value, patch: &EventPatch) {
    if let Some(summary) = &patch.summary {
        resource["summary"] = json!(summary);
    }
    if let Some(location) = &patch.location {
        resource["location"] = json!(location);
    }
    if let Some(description) = &patch.description {
        resource["description"] = json!(description);
    }
    let time_zone = patch.timezone.as_deref().map(provider_time_zone);
    for (key, instant) in [("start", patch.start), ("end", patch.end)] {
        if let Some(instant) = instant {
            let zone = time_zone.clone().unwrap_or_else(|| "UTC".to_string());
            resource[key] = event_time(&instant, &zone);
        } else if let Some(zone) = &time_zone {
            if resource[key].get("dateTime").is_some() {
                resource[key]["timeZone"] = json!(zone);
            }
        }
    }
    if let Some(attendees) = &patch.attendees {
        resource["attendees"] = attendee_list(attendees);
    }
}

fn provider_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|m| m.to_string()))
        .unwrap_or_else(|| format!("{} {}", status.as_u16(), body.trim()))
}

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    access_token: String,
    events_url: String,
}

impl GoogleCalendarClient {
    pub fn new(access_token: String) -> Self {
        Self::with_events_url(access_token, DEFAULT_EVENTS_URL.to_string())
    }

    pub fn with_events_url(access_token: String, events_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            access_token,
            events_url,
        }
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        Url::parse(&self.events_url)
            .map_err(|e| CalendarError::Provider(format!("invalid calendar url: {}", e)))
    }

    fn event_url(&self, event_id: &str) -> Result<Url, CalendarError> {
        let mut url = self.events_url()?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Provider("calendar url cannot be a base".to_string()))?
            .push(event_id);
        Ok(url)
    }

    /// Maps a non-success status to the calendar error taxonomy.
    async fn check(
        response: reqwest::Response,
        event_id: Option<&str>,
    ) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match (status, event_id) {
            (StatusCode::UNAUTHORIZED, _) => Err(CalendarError::Unauthorized),
            (StatusCode::NOT_FOUND | StatusCode::GONE, Some(id)) => {
                Err(CalendarError::NotFound(id.to_string()))
            }
            _ => Err(CalendarError::Provider(provider_message(status, &body))),
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendarClient {
    async fn list_upcoming(&self, limit: usize) -> Result<Vec<CalendarEvent>, CalendarError> {
        let now = rfc3339(&Utc::now());
        let limit = limit.to_string();
        let response = self
            .http
            .get(self.events_url()?)
            .bearer_auth(&self.access_token)
            .query(&[
                ("maxResults", limit.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("timeMin", now.as_str()),
            ])
            .send()
            .await?;
        let list: EventList = Self::check(response, None).await?.json().await?;
        Ok(list
            .items
            .into_iter()
            .filter_map(GoogleEvent::into_calendar_event)
            .collect())
    }

    async fn create(&self, event: &NewEvent) -> Result<String, CalendarError> {
        let body = create_body(event, &Uuid::new_v4().to_string());
        let response = self
            .http
            .post(self.events_url()?)
            .bearer_auth(&self.access_token)
            .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
            .json(&body)
            .send()
            .await?;
        let created: CreatedEvent = Self::check(response, None).await?.json().await?;
        Ok(created.id)
    }

    async fn update(&self, event_id: &str, patch: &EventPatch) -> Result<(), CalendarError> {
        let url = self.event_url(event_id)?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let mut resource: Value = Self::check(response, Some(event_id)).await?.json().await?;
        if patch.is_empty() {
            // Nothing to write; the lookup above still reports a missing event.
            return Ok(());
        }

        apply_patch(&mut resource, patch);

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&resource)
            .send()
            .await?;
        Self::check(response, Some(event_id)).await?;
        Ok(())
    }

    async fn delete(&self, event_id: &str) -> Result<(), CalendarError> {
        let response = self
            .http
            .delete(self.event_url(event_id)?)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        Self::check(response, Some(event_id)).await?;
        Ok(())
    }
}

/// Loads (and if needed refreshes) the stored token before handing out a
/// calendar client.
pub struct GoogleConnector {
    tokens: Arc<dyn TokenStore>,
    oauth: GoogleOAuthClient,
    events_url: String,
}

impl GoogleConnector {
    pub fn new(tokens: Arc<dyn TokenStore>, oauth: GoogleOAuthClient) -> Self {
        Self {
            tokens,
            oauth,
            events_url: DEFAULT_EVENTS_URL.to_string(),
        }
    }

    fn authentication_required(&self) -> AuthenticationRequired {
        let auth_url = self.oauth.authorization_url().unwrap_or_else(|err| {
            tracing::error!(error = %err, "could not build authorization url");
            DEFAULT_AUTH_URI.to_string()
        });
        AuthenticationRequired { auth_url }
    }
}

#[async_trait]
impl CalendarConnector for GoogleConnector {
    async fn connect(&self) -> Result<Arc<dyn CalendarService>, AuthenticationRequired> {
        let record = match self.tokens.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!("no calendar token stored");
                return Err(self.authentication_required());
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load calendar token");
                return Err(self.authentication_required());
            }
        };

        let record = if record.is_expired(Utc::now()) {
            match self.tokens.refresh(&record).await {
                Ok(refreshed) => refreshed,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to refresh calendar token");
                    return Err(self.authentication_required());
                }
            }
        } else {
            record
        };

        Ok(Arc::new(GoogleCalendarClient::with_events_url(
            record.access_token,
            self.events_url.clone(),
        )))
    }

    async fn reauthorize(&self) -> Option<AuthenticationRequired> {
        Some(self.authentication_required())
    }
}
