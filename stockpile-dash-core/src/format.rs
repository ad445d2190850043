//! Timestamp parsing and operator-facing time labels.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use std::fmt;

/// Label used when a timestamp cannot be parsed.
pub const INVALID_DATE: &str = "Invalid date";

/// Relative calendar rendering of an absolute timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarLabel {
    Valid(String),
    Invalid,
}

impl CalendarLabel {
    pub fn is_valid(&self) -> bool {
        matches!(self, CalendarLabel::Valid(_))
    }
}

impl fmt::Display for CalendarLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarLabel::Valid(label) => f.write_str(label),
            CalendarLabel::Invalid => f.write_str(INVALID_DATE),
        }
    }
}

/// Parses a server timestamp.
///
/// Accepts RFC 3339 with up to nine fractional digits (Go's JSON encoding of
/// `time.Time`) and Go's `time.String()` layout
/// (`2018-05-10 12:00:00.123456789 +0200 CEST`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    // Drop the trailing zone abbreviation; the numeric offset is authoritative.
    let mut parts = raw.split_whitespace();
    let (date, time, offset) = (parts.next()?, parts.next()?, parts.next()?);
    DateTime::parse_from_str(&format!("{date} {time} {offset}"), "%Y-%m-%d %H:%M:%S%.f %z").ok()
}

/// Formats `ts` relative to `now`, in `now`'s time zone.
///
/// - same day: `Today at 3:45 PM`
/// - previous / next day: `Yesterday at ...` / `Tomorrow at ...`
/// - within the previous week: `Last Monday at ...`
/// - within the next week: `Monday at ...`
/// - otherwise: `05/10/2018`
pub fn format_calendar<Tz>(ts: &DateTime<FixedOffset>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let local = ts.with_timezone(&now.timezone());
    let days = (local.date_naive() - now.date_naive()).num_days();
    let time = local.format("%-I:%M %p");

    match days {
        0 => format!("Today at {time}"),
        -1 => format!("Yesterday at {time}"),
        1 => format!("Tomorrow at {time}"),
        -6..=-2 => format!("Last {} at {time}", local.format("%A")),
        2..=6 => format!("{} at {time}", local.format("%A")),
        _ => local.format("%m/%d/%Y").to_string(),
    }
}

/// Parses `raw` and renders it relative to `now`. Never fails.
pub fn calendar_label<Tz>(raw: &str, now: &DateTime<Tz>) -> CalendarLabel
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match parse_timestamp(raw) {
        Some(ts) => CalendarLabel::Valid(format_calendar(&ts, now)),
        None => {
            tracing::debug!(raw = %raw, "Unparseable timestamp");
            CalendarLabel::Invalid
        }
    }
}

/// Renders `raw` relative to the local clock.
pub fn calendar(raw: &str) -> CalendarLabel {
    calendar_label(raw, &Local::now())
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 1 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else {
        format!("{}d ago", duration.num_days())
    }
}
