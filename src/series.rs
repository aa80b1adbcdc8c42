//! Per-category sample series: keeps the previous sample of every category and
//! turns each new one into a displayable delta.
//!
//! Shared by live watch output and archive reports so both print the same
//! numbers for the same samples.

use std::collections::HashMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::delta::compute_delta;
use crate::error::StatError;
use crate::table::TabularSnapshot;
use crate::view::View;

/// Format of the timestamp line printed above every table.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Default)]
pub struct SeriesTracker {
    previous: HashMap<String, (DateTime<Utc>, TabularSnapshot)>,
}

impl SeriesTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next sample of `view`.
    ///
    /// Returns `Ok(None)` while the sample only serves as a baseline: the first
    /// sample of a cumulative view, or one whose column set differs from its
    /// predecessor. Non-cumulative views are returned sorted right away.
    pub fn advance(
        &mut self,
        view: &View,
        timestamp: DateTime<Utc>,
        snapshot: TabularSnapshot,
    ) -> Result<Option<TabularSnapshot>, StatError> {
        if !view.is_cumulative() {
            let mut shown = snapshot;
            shown.sort(view.order_key, view.order_desc);
            return Ok(Some(shown));
        }

        let previous = self.previous.remove(&view.name);
        let result = match &previous {
            None => Ok(None),
            Some((_, prev)) if prev.columns != snapshot.columns => {
                debug!(view = %view.name, "column set changed, starting a new baseline");
                Ok(None)
            }
            Some((prev_ts, prev)) => {
                let spec = view.delta_spec(elapsed_secs(*prev_ts, timestamp), 0);
                compute_delta(&snapshot, prev, &spec).map(Some)
            }
        };

        self.previous
            .insert(view.name.clone(), (timestamp, snapshot));
        result
    }
}

/// Whole seconds between two samples, rounded to nearest.
pub fn elapsed_secs(previous: DateTime<Utc>, current: DateTime<Utc>) -> u64 {
    let millis = (current - previous).num_milliseconds().max(0);
    ((millis + 500) / 1000) as u64
}

/// Prints a `timestamp, category` line, the table and a blank line.
pub fn write_sample<W: Write>(
    out: &mut W,
    timestamp: DateTime<Utc>,
    category: &str,
    snapshot: &TabularSnapshot,
) -> io::Result<()> {
    writeln!(out, "{}, {}", timestamp.format(DISPLAY_TIME_FORMAT), category)?;
    snapshot.write_to(out)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::snapshot;
    use chrono::{Duration, TimeZone};

    fn ts(millis: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap() + Duration::milliseconds(millis)
    }

    fn counters() -> View {
        View {
            name: "tables".into(),
            query: String::new(),
            unique_key: 0,
            diff_range: (1, 1),
            order_key: 1,
            order_desc: true,
            min_version: 0,
        }
    }

    fn sample(rows: &[(&str, &str)]) -> TabularSnapshot {
        let rows: Vec<Vec<Option<&str>>> = rows.iter().map(|(k, v)| vec![Some(*k), Some(*v)]).collect();
        let refs: Vec<&[Option<&str>]> = rows.iter().map(|r| r.as_slice()).collect();
        snapshot(&["table", "seq_scan"], &refs)
    }

    #[test]
    fn first_sample_is_baseline() {
        let mut tracker = SeriesTracker::new();
        let got = tracker
            .advance(&counters(), ts(0), sample(&[("a", "10")]))
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn following_samples_are_rates() {
        let mut tracker = SeriesTracker::new();
        let view = counters();
        tracker.advance(&view, ts(0), sample(&[("a", "10"), ("b", "5")])).unwrap();

        let got = tracker
            .advance(&view, ts(2000), sample(&[("a", "30"), ("b", "25"), ("c", "1")]))
            .unwrap()
            .unwrap();
        assert_eq!(
            got.rows,
            vec![
                vec![Some("a".to_string()), Some("10".to_string())],
                vec![Some("b".to_string()), Some("10".to_string())],
                vec![Some("c".to_string()), Some("1".to_string())],
            ]
        );

        let got = tracker
            .advance(&view, ts(3000), sample(&[("a", "31"), ("b", "45")]))
            .unwrap()
            .unwrap();
        assert_eq!(got.cell(0, 0), Some("b"));
        assert_eq!(got.cell(0, 1), Some("20"));
        assert_eq!(got.cell(1, 1), Some("1"));
    }

    #[test]
    fn column_change_resets_baseline() {
        let mut tracker = SeriesTracker::new();
        let view = counters();
        tracker.advance(&view, ts(0), sample(&[("a", "10")])).unwrap();

        let other = snapshot(&["table", "idx_scan"], &[&[Some("a"), Some("99")]]);
        assert!(tracker.advance(&view, ts(1000), other).unwrap().is_none());

        let next = snapshot(&["table", "idx_scan"], &[&[Some("a"), Some("100")]]);
        let got = tracker.advance(&view, ts(2000), next).unwrap().unwrap();
        assert_eq!(got.cell(0, 1), Some("1"));
    }

    #[test]
    fn failed_diff_still_moves_baseline() {
        let mut tracker = SeriesTracker::new();
        let view = counters();
        tracker.advance(&view, ts(0), sample(&[("a", "10")])).unwrap();
        assert!(tracker.advance(&view, ts(1000), sample(&[("a", "n/a")])).is_err());

        let got = tracker
            .advance(&view, ts(2000), sample(&[("a", "n/a")]))
            .map(|r| r.is_some());
        assert!(got.is_err());

        let got = tracker
            .advance(&view, ts(3000), sample(&[("a", "50")]))
            .unwrap_err();
        assert!(matches!(got, StatError::InvalidNumericCell(_)));
    }

    #[test]
    fn snapshot_views_are_shown_immediately() {
        let mut tracker = SeriesTracker::new();
        let view = View {
            diff_range: (0, 0),
            ..counters()
        };
        let got = tracker
            .advance(&view, ts(0), sample(&[("a", "1"), ("b", "7")]))
            .unwrap()
            .unwrap();
        assert_eq!(got.cell(0, 0), Some("b"));
    }

    #[test]
    fn elapsed_rounds_to_nearest_second() {
        assert_eq!(elapsed_secs(ts(0), ts(999)), 1);
        assert_eq!(elapsed_secs(ts(0), ts(1499)), 1);
        assert_eq!(elapsed_secs(ts(0), ts(1500)), 2);
        assert_eq!(elapsed_secs(ts(0), ts(400)), 0);
        assert_eq!(elapsed_secs(ts(1000), ts(0)), 0);
    }

    #[test]
    fn sample_output_has_header_line() {
        let mut out = Vec::new();
        write_sample(&mut out, ts(0), "tables", &sample(&[("a", "1")])).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "2026-02-07 12:00:00, tables\ntable  seq_scan\na      1\n\n"
        );
    }
}
