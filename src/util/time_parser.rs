//! Time filter parser for report boundaries.
//!
//! Supported formats:
//! - Date and time (UTC): `2026-02-07 17:00:00` or `2026-02-07 17:00`
//! - ISO 8601: `2026-02-07T17:00:00`, `2026-02-07T17:00:00+03:00`
//! - Unix timestamp: `1738944000`
//! - Relative to the base: `-1h`, `-30m`, `-2d`
//! - Time only, on the base date (UTC): `17:00:00` or `17:00`

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};

/// Error type for time parsing failures.
#[derive(Debug, Clone)]
pub struct TimeParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse time '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for TimeParseError {}

/// Parses a time expression, resolving relative and time-only values
/// against `base` (normally the first archive entry).
///
/// | Format | Example | Result |
/// |--------|---------|--------|
/// | Date+time | `2026-02-07 17:00:00` | that instant, UTC |
/// | ISO 8601 | `2026-02-07T17:00:00` | that instant, UTC unless an offset is given |
/// | Unix timestamp | `1738944000` | seconds since epoch |
/// | Relative | `-1h`, `-30m`, `-2d` | `base` minus the amount |
/// | Time only | `17:00:00`, `17:00` | that time on the date of `base` |
pub fn parse_time(input: &str, base: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    let input = input.trim();
    let fail = |message: &str| TimeParseError {
        input: input.to_string(),
        message: message.to_string(),
    };

    if let Some(secs) = try_parse_unix_timestamp(input) {
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| fail("timestamp out of range"));
    }

    if let Some(delta) = try_parse_relative(input) {
        return base
            .checked_sub_signed(delta)
            .ok_or_else(|| fail("relative time overflow"));
    }

    if let Some(ts) = try_parse_iso8601(input) {
        return Ok(ts);
    }

    if let Some(ts) = try_parse_date_time(input) {
        return Ok(ts);
    }

    if let Some(time) = try_parse_time_only(input) {
        return Ok(base.date_naive().and_time(time).and_utc());
    }

    Err(fail(
        "Unrecognized format. Use: date and time (2026-02-07 17:00:00), \
         ISO 8601 (2026-02-07T17:00:00), Unix timestamp (1738944000), \
         relative (-1h, -30m, -2d) or time only (17:00:00)",
    ))
}

fn try_parse_unix_timestamp(input: &str) -> Option<i64> {
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        input.parse::<i64>().ok()
    } else {
        None
    }
}

/// `-<number><unit>`, unit one of `s`, `m`, `h`, `d`, `w`.
fn try_parse_relative(input: &str) -> Option<Duration> {
    let rest = input.strip_prefix('-')?;
    let unit = rest.chars().last()?;
    let number: i64 = rest[..rest.len() - unit.len_utf8()].parse().ok()?;
    if number < 0 {
        return None;
    }

    match unit {
        's' => Duration::try_seconds(number),
        'm' => Duration::try_minutes(number),
        'h' => Duration::try_hours(number),
        'd' => Duration::try_days(number),
        'w' => Duration::try_weeks(number),
        _ => None,
    }
}

fn try_parse_iso8601(input: &str) -> Option<DateTime<Utc>> {
    if !input.contains('T') {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|ndt| ndt.and_utc())
}

fn try_parse_date_time(input: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .map(|ndt| ndt.and_utc())
}

fn try_parse_time_only(input: &str) -> Option<NaiveTime> {
    if input.chars().nth(2) != Some(':') {
        return None;
    }
    match input.len() {
        8 => NaiveTime::parse_from_str(input, "%H:%M:%S").ok(),
        5 => NaiveTime::parse_from_str(input, "%H:%M").ok(),
        _ => None,
    }
}
