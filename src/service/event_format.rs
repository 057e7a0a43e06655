//! Rendering of calendar events and conversion between Eastern wall-clock
//! times and UTC instants.
//!
//! Every date and time shown to the user is expressed in [`DISPLAY_TZ`],
//! regardless of the timezone stored on the event. Times supplied by the
//! model use the same zone and the literal layout `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::WallClockError;
use crate::models::event::CalendarEvent;

pub const DISPLAY_TZ: Tz = chrono_tz::America::New_York;
pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
pub const NO_EVENTS: &str = "No upcoming events found.";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%I:%M %p";

/// Resolves a local Eastern time to UTC. During the autumn fall-back hour the
/// earlier instant wins.
pub fn eastern_to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    match DISPLAY_TZ.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// Parses an Eastern wall-clock literal such as `2026-03-04T15:00:00Z`.
pub fn parse_wall_clock(value: &str) -> Result<DateTime<Utc>, WallClockError> {
    let trimmed = value.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, WALL_CLOCK_FORMAT)
        .map_err(|_| WallClockError::Unparsable(trimmed.to_string()))?;
    eastern_to_utc(naive).ok_or_else(|| WallClockError::Nonexistent(trimmed.to_string()))
}

pub fn format_wall_clock(instant: &DateTime<Utc>) -> String {
    instant
        .with_timezone(&DISPLAY_TZ)
        .format(WALL_CLOCK_FORMAT)
        .to_string()
}

/// Whole minutes between start and end, rounded toward zero.
pub fn duration_minutes(start: &DateTime<Utc>, end: &DateTime<Utc>) -> i64 {
    (*end - *start).num_minutes()
}

pub fn format_event(event: &CalendarEvent) -> String {
    let local_start = event.start.with_timezone(&DISPLAY_TZ);
    let title = event.title.as_deref().filter(|t| !t.is_empty()).unwrap_or("No Title");
    let description = event
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("No Description");

    format!(
        "Title: {title}\nDate: {date}\nStart Time: {time}\nDuration: {duration} mins\nDescription: {description}\nID: {id}",
        title = title,
        date = local_start.format(DATE_FORMAT),
        time = local_start.format(TIME_FORMAT),
        duration = duration_minutes(&event.start, &event.end),
        description = description,
        id = event.id,
    )
}

pub fn format_event_list(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_EVENTS.to_string();
    }
    let blocks: Vec<String> = events.iter().map(format_event).collect();
    format!("Upcoming Events:\n\n{}", blocks.join("\n\n"))
}

/// Start and end recovered from a rendered event block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedTimes {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Reads the Date, Start Time and Duration lines of a block produced by
/// [`format_event`] back into UTC instants.
pub fn parse_event_block(block: &str) -> Option<DisplayedTimes> {
    let mut date = None;
    let mut time = None;
    let mut minutes = None;

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("Date: ") {
            date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok();
        } else if let Some(value) = line.strip_prefix("Start Time: ") {
            time = NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok();
        } else if let Some(value) = line.strip_prefix("Duration: ") {
            minutes = value.trim().trim_end_matches("mins").trim().parse::<i64>().ok();
        }
    }

    let start = eastern_to_utc(date?.and_time(time?))?;
    Some(DisplayedTimes {
        start,
        end: start + Duration::minutes(minutes?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: "evt1".to_string(),
            title: Some("Standup".to_string()),
            location: None,
            description: None,
            start,
            end,
            timezone: Some("UTC".to_string()),
            attendees: Vec::new(),
        }
    }

    #[test]
    fn wall_clock_is_eastern() {
        // EST in winter, EDT in summer.
        let winter = parse_wall_clock("2026-01-15T15:00:00Z").unwrap();
        assert_eq!(winter, Utc.with_ymd_and_hms(2026, 1, 15, 20, 0, 0).unwrap());
        let summer = parse_wall_clock("2026-07-15T15:00:00Z").unwrap();
        assert_eq!(summer, Utc.with_ymd_and_hms(2026, 7, 15, 19, 0, 0).unwrap());
        assert_eq!(format_wall_clock(&summer), "2026-07-15T15:00:00Z");
    }

    #[test]
    fn wall_clock_rejects_bad_input() {
        assert!(matches!(
            parse_wall_clock("tomorrow at 3"),
            Err(WallClockError::Unparsable(_))
        ));
        // 2:30 AM on the spring-forward date is skipped.
        let err = parse_wall_clock("2026-03-08T02:30:00Z").unwrap_err();
        assert_eq!(err, WallClockError::Nonexistent("2026-03-08T02:30:00Z".to_string()));
        assert_eq!(
            err.to_string(),
            "2026-03-08T02:30:00Z does not exist in US Eastern time"
        );
        assert_eq!(
            parse_wall_clock(" noon ").unwrap_err().to_string(),
            "expected YYYY-MM-DDTHH:MM:SSZ, got \"noon\""
        );
    }

    #[test]
    fn ambiguous_fall_back_uses_earliest() {
        let instant = parse_wall_clock("2026-11-01T01:30:00Z").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap());
    }

    #[test]
    fn duration_rounds_toward_zero() {
        let start = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        assert_eq!(duration_minutes(&start, &(start + Duration::seconds(119))), 1);
        assert_eq!(duration_minutes(&start, &(start - Duration::seconds(119))), -1);
    }

    #[test]
    fn event_block_uses_fixed_field_order() {
        let start = Utc.with_ymd_and_hms(2026, 2, 10, 20, 0, 0).unwrap();
        let block = format_event(&event(start, start + Duration::minutes(45)));
        assert_eq!(
            block,
            "Title: Standup\nDate: 2026-02-10\nStart Time: 03:00 PM\nDuration: 45 mins\nDescription: No Description\nID: evt1"
        );
    }

    #[test]
    fn empty_list_message() {
        assert_eq!(format_event_list(&[]), "No upcoming events found.");
    }

    #[test]
    fn list_separates_blocks() {
        let start = Utc.with_ymd_and_hms(2026, 2, 10, 20, 0, 0).unwrap();
        let rendered = format_event_list(&[
            event(start, start + Duration::minutes(30)),
            event(start + Duration::days(1), start + Duration::days(1) + Duration::minutes(60)),
        ]);
        assert!(rendered.starts_with("Upcoming Events:\n\nTitle: Standup"));
        assert_eq!(rendered.matches("\n\nTitle: ").count(), 2);
    }
}
