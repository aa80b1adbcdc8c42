//! Archive entry naming: `<category>.<YYYYMMDDTHHMMSS.mmm>.json`.
//!
//! The name alone carries enough to order entries and to apply time-range
//! filters, so readers can skip entries without touching their payload.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

const NAME_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y%m%dT%H%M%S%.f";

/// Parsed archive entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName {
    pub category: String,
    /// Millisecond precision, matching what the name can hold.
    pub timestamp: DateTime<Utc>,
}

impl EntryName {
    /// Creates a name, rounding the timestamp down to milliseconds.
    pub fn new(category: &str, timestamp: DateTime<Utc>) -> Result<Self, String> {
        if category.is_empty() {
            return Err("empty category name".to_string());
        }
        if category.contains(['.', '/']) {
            return Err(format!(
                "category '{}' must not contain '.' or '/'",
                category
            ));
        }
        Ok(Self {
            category: category.to_string(),
            timestamp: timestamp.trunc_subsecs(3),
        })
    }

    /// Parses a name produced by [`EntryName::new`]; `None` if it does not fit.
    pub fn parse(name: &str) -> Option<Self> {
        let (category, stamp) = name.strip_suffix(NAME_SUFFIX)?.split_once('.')?;
        if category.is_empty() {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_PARSE_FORMAT).ok()?;
        Some(Self {
            category: category.to_string(),
            timestamp: naive.and_utc(),
        })
    }
}

impl std::fmt::Display for EntryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}{}",
            self.category,
            self.timestamp.format(TIMESTAMP_FORMAT),
            NAME_SUFFIX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn name_round_trips_with_milliseconds() {
        let ts = Utc.with_ymd_and_hms(2026, 2, 7, 17, 0, 5).unwrap() + Duration::microseconds(123_456);
        let name = EntryName::new("activity", ts).unwrap();
        let text = name.to_string();
        assert_eq!(text, "activity.20260207T170005.123.json");

        let parsed = EntryName::parse(&text).unwrap();
        assert_eq!(parsed, name);
        assert_eq!(
            parsed.timestamp,
            Utc.with_ymd_and_hms(2026, 2, 7, 17, 0, 5).unwrap() + Duration::milliseconds(123)
        );
    }

    #[test]
    fn underscored_categories_are_accepted() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let name = EntryName::new("statements_timings", ts).unwrap();
        assert_eq!(
            EntryName::parse(&name.to_string()).unwrap().category,
            "statements_timings"
        );
    }

    #[test]
    fn rejects_bad_categories() {
        let ts = Utc::now();
        assert!(EntryName::new("", ts).is_err());
        assert!(EntryName::new("a.b", ts).is_err());
        assert!(EntryName::new("a/b", ts).is_err());
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(EntryName::parse("README").is_none());
        assert!(EntryName::parse("activity.json").is_none());
        assert!(EntryName::parse("activity.notatime.json").is_none());
        assert!(EntryName::parse(".20260207T170005.000.json").is_none());
        assert!(EntryName::parse("activity.20260207T170005.000.txt").is_none());
    }
}
