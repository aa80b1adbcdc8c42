//! Sampling loop: one cycle per tick, every view in order, handed to a sink.
//!
//! Each cycle samples all views, stamps them with one cycle timestamp and
//! passes them to a [`SampleSink`]. The loop stops after the configured number
//! of cycles, on cancellation, or on the first error.

mod printer;

pub use printer::DeltaPrinter;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info};

use crate::archive::ArchiveWriter;
use crate::collector::{SourceError, StatSource};
use crate::error::StatError;
use crate::table::TabularSnapshot;
use crate::view::{View, Views};

/// How long a cancelled loop may keep sleeping before it notices.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error that ended a sampling session, by stage.
#[derive(Debug)]
pub enum LoopError {
    /// A view could not be sampled.
    Sampling { view: String, source: SourceError },
    /// Two samples could not be diffed.
    Diff { view: String, source: StatError },
    /// The archive could not be written.
    ArchiveWrite(StatError),
    /// Live output could not be written.
    Output(std::io::Error),
}

impl std::fmt::Display for LoopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopError::Sampling { view, source } => write!(f, "sampling '{}': {}", view, source),
            LoopError::Diff { view, source } => write!(f, "diffing '{}': {}", view, source),
            LoopError::ArchiveWrite(e) => write!(f, "archive write: {}", e),
            LoopError::Output(e) => write!(f, "output: {}", e),
        }
    }
}

impl std::error::Error for LoopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoopError::Sampling { source, .. } => Some(source),
            LoopError::Diff { source, .. } => Some(source),
            LoopError::ArchiveWrite(e) => Some(e),
            LoopError::Output(e) => Some(e),
        }
    }
}

/// Shared cancellation flag, set from a signal handler and checked between
/// cycles.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleeps up to `duration`, waking early on cancellation.
    ///
    /// Returns `false` if the token was cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while remaining > Duration::ZERO && !self.is_cancelled() {
            let step = remaining.min(CANCEL_POLL_INTERVAL);
            std::thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }
        !self.is_cancelled()
    }
}

/// One view's sample within a cycle.
#[derive(Debug)]
pub struct Sample<'v> {
    pub view: &'v View,
    pub snapshot: TabularSnapshot,
}

/// Receives every completed cycle.
pub trait SampleSink {
    fn write_cycle(
        &mut self,
        timestamp: DateTime<Utc>,
        samples: &[Sample<'_>],
    ) -> Result<(), LoopError>;
}

/// One open-append-close scope per cycle.
impl SampleSink for ArchiveWriter {
    fn write_cycle(
        &mut self,
        timestamp: DateTime<Utc>,
        samples: &[Sample<'_>],
    ) -> Result<(), LoopError> {
        let mut cycle = self.begin_cycle().map_err(LoopError::ArchiveWrite)?;
        for sample in samples {
            cycle
                .append(&sample.view.name, timestamp, &sample.snapshot)
                .map_err(LoopError::ArchiveWrite)?;
        }
        cycle.finish().map_err(LoopError::ArchiveWrite)?;
        Ok(())
    }
}

/// Loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordConfig {
    /// Time from the start of one cycle to the start of the next.
    pub interval: Duration,
    /// Cycles to run; 0 runs until cancelled.
    pub count: usize,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            count: 0,
        }
    }
}

/// Hands out cycle timestamps that are strictly increasing at millisecond
/// resolution, even when the wall clock stalls or steps back.
#[derive(Debug, Default)]
pub struct CycleClock {
    last: Option<DateTime<Utc>>,
}

impl CycleClock {
    pub fn next(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(3);
        let ts = match self.last {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.last = Some(ts);
        ts
    }
}

pub struct SamplingLoop {
    config: RecordConfig,
    clock: CycleClock,
}

impl SamplingLoop {
    pub fn new(config: RecordConfig) -> Self {
        Self {
            config,
            clock: CycleClock::default(),
        }
    }

    /// Runs cycles until the count is reached or `cancel` is set.
    ///
    /// Cancellation never interrupts a cycle in flight. Returns the number of
    /// completed cycles.
    pub fn run(
        &mut self,
        source: &mut dyn StatSource,
        views: &Views,
        sink: &mut dyn SampleSink,
        cancel: &CancelToken,
    ) -> Result<usize, LoopError> {
        let count = self.config.count;
        let mut cycles = 0usize;
        info!(
            views = views.len(),
            interval_ms = self.config.interval.as_millis() as u64,
            count,
            "sampling started"
        );

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let timestamp = self.clock.next(Utc::now());

            let samples = sample_views(source, views)?;
            sink.write_cycle(timestamp, &samples)?;
            cycles += 1;
            debug!(cycle = cycles, %timestamp, views = samples.len(), "cycle written");

            if count > 0 && cycles >= count {
                break;
            }
            let pause = self.config.interval.saturating_sub(started.elapsed());
            if !cancel.sleep(pause) {
                break;
            }
        }

        info!(cycles, "sampling stopped");
        Ok(cycles)
    }
}

fn sample_views<'v>(
    source: &mut dyn StatSource,
    views: &'v Views,
) -> Result<Vec<Sample<'v>>, LoopError> {
    views
        .iter()
        .map(|view| {
            source
                .query(&view.query)
                .map(|snapshot| Sample { view, snapshot })
                .map_err(|source| LoopError::Sampling {
                    view: view.name.clone(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveReader, EntryFilter, WriteMode};
    use crate::collector::MockSource;
    use crate::table::tests::snapshot;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn view(name: &str, query: &str, diff_range: (usize, usize)) -> View {
        View {
            name: name.into(),
            query: query.into(),
            unique_key: 0,
            diff_range,
            order_key: 0,
            order_desc: true,
            min_version: 0,
        }
    }

    fn two_views() -> Views {
        let mut views = Views::new();
        views.register(view("databases", "SELECT db", (1, 1)));
        views.register(view("activity", "SELECT act", (0, 0)));
        views
    }

    fn scripted() -> MockSource {
        MockSource::new()
            .respond("SELECT db", snapshot(&["db", "xact"], &[&[Some("app"), Some("300")]]))
            .respond("SELECT db", snapshot(&["db", "xact"], &[&[Some("app"), Some("330.5")]]))
            .respond("SELECT act", snapshot(&["pid", "state"], &[&[Some("7"), Some("idle")]]))
    }

    /// Collects cycles in memory.
    #[derive(Default)]
    struct Recorder {
        cycles: Vec<(DateTime<Utc>, Vec<String>)>,
        cancel_after: Option<(usize, CancelToken)>,
    }

    impl SampleSink for Recorder {
        fn write_cycle(
            &mut self,
            timestamp: DateTime<Utc>,
            samples: &[Sample<'_>],
        ) -> Result<(), LoopError> {
            let names = samples.iter().map(|s| s.view.name.clone()).collect();
            self.cycles.push((timestamp, names));
            if let Some((n, token)) = &self.cancel_after
                && self.cycles.len() >= *n
            {
                token.cancel();
            }
            Ok(())
        }
    }

    fn quick(count: usize) -> SamplingLoop {
        SamplingLoop::new(RecordConfig {
            interval: Duration::ZERO,
            count,
        })
    }

    #[test]
    fn runs_requested_cycles_in_view_order() {
        let mut source = scripted();
        let mut sink = Recorder::default();
        let cycles = quick(3)
            .run(&mut source, &two_views(), &mut sink, &CancelToken::new())
            .unwrap();

        assert_eq!(cycles, 3);
        assert_eq!(sink.cycles.len(), 3);
        for (_, names) in &sink.cycles {
            assert_eq!(names, &["databases", "activity"]);
        }
        assert_eq!(
            source.log(),
            ["SELECT db", "SELECT act", "SELECT db", "SELECT act", "SELECT db", "SELECT act"]
        );
    }

    #[test]
    fn cycle_timestamps_strictly_increase() {
        let mut source = scripted();
        let mut sink = Recorder::default();
        quick(20)
            .run(&mut source, &two_views(), &mut sink, &CancelToken::new())
            .unwrap();

        let stamps: Vec<DateTime<Utc>> = sink.cycles.iter().map(|(t, _)| *t).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn cancellation_is_honoured_between_cycles() {
        let mut source = scripted();
        let token = CancelToken::new();
        let mut sink = Recorder {
            cancel_after: Some((2, token.clone())),
            ..Default::default()
        };

        let cycles = SamplingLoop::new(RecordConfig {
            interval: Duration::from_secs(60),
            count: 0,
        })
        .run(&mut source, &two_views(), &mut sink, &token)
        .unwrap();
        assert_eq!(cycles, 2);
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let token = CancelToken::new();
        token.cancel();
        let mut sink = Recorder::default();
        let cycles = quick(0)
            .run(&mut scripted(), &two_views(), &mut sink, &token)
            .unwrap();
        assert_eq!(cycles, 0);
        assert!(sink.cycles.is_empty());
    }

    #[test]
    fn source_failure_names_the_view() {
        let mut source = MockSource::new()
            .respond("SELECT db", snapshot(&["db", "xact"], &[&[Some("app"), Some("1")]]))
            .fail("SELECT act", "permission denied");
        let mut sink = Recorder::default();
        let err = quick(1)
            .run(&mut source, &two_views(), &mut sink, &CancelToken::new())
            .unwrap_err();
        match err {
            LoopError::Sampling { view, .. } => assert_eq!(view, "activity"),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(sink.cycles.is_empty());
    }

    #[test]
    fn records_into_archive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        let mut writer = ArchiveWriter::new(&path, WriteMode::Truncate);

        quick(2)
            .run(&mut scripted(), &two_views(), &mut writer, &CancelToken::new())
            .unwrap();

        let mut reader = ArchiveReader::open(&path).unwrap();
        let records: Vec<_> = reader
            .records(EntryFilter::default())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let names: Vec<&str> = records.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, ["databases", "activity", "databases", "activity"]);
        assert_eq!(records[0].timestamp, records[1].timestamp);
        assert!(records[1].timestamp < records[2].timestamp);
        assert_eq!(records[2].snapshot.cell(0, 1), Some("330.5"));
    }

    #[test]
    fn failed_archive_cycle_is_not_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stat.tar");
        let mut writer = ArchiveWriter::new(&path, WriteMode::Truncate);
        quick(1)
            .run(&mut scripted(), &two_views(), &mut writer, &CancelToken::new())
            .unwrap();

        let mut views = two_views();
        views.register(view("bad.name", "SELECT act", (0, 0)));
        let err = quick(1)
            .run(&mut scripted(), &views, &mut writer, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, LoopError::ArchiveWrite(_)));

        let mut reader = ArchiveReader::open(&path).unwrap();
        let names: Vec<String> = reader
            .records(EntryFilter::default())
            .unwrap()
            .map(|r| r.unwrap().category)
            .collect();
        assert_eq!(names, ["databases", "activity"]);
    }

    #[test]
    fn clock_steps_past_stalled_wall_clock() {
        let t = Utc.with_ymd_and_hms(2026, 2, 7, 12, 0, 0).unwrap();
        let mut clock = CycleClock::default();
        assert_eq!(clock.next(t), t);
        assert_eq!(clock.next(t), t + chrono::Duration::milliseconds(1));
        assert_eq!(
            clock.next(t - chrono::Duration::seconds(5)),
            t + chrono::Duration::milliseconds(2)
        );
        assert_eq!(
            clock.next(t + chrono::Duration::seconds(1)),
            t + chrono::Duration::seconds(1)
        );
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let started = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
