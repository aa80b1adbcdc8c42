//! Live watch output.

use std::io::Write;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{LoopError, Sample, SampleSink};
use crate::series::{SeriesTracker, write_sample};

/// Prints the delta of every sample against the previous cycle.
///
/// Cumulative views print nothing on their first cycle.
pub struct DeltaPrinter<W: Write> {
    out: W,
    tracker: SeriesTracker,
    /// Maximum rows per table; 0 means unlimited.
    limit: usize,
    /// Maximum characters per cell; 0 means unlimited.
    string_limit: usize,
}

impl<W: Write> DeltaPrinter<W> {
    pub fn new(out: W, limit: usize, string_limit: usize) -> Self {
        Self {
            out,
            tracker: SeriesTracker::new(),
            limit,
            string_limit,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleSink for DeltaPrinter<W> {
    fn write_cycle(
        &mut self,
        timestamp: DateTime<Utc>,
        samples: &[Sample<'_>],
    ) -> Result<(), LoopError> {
        for sample in samples {
            let shown = self
                .tracker
                .advance(sample.view, timestamp, sample.snapshot.clone())
                .map_err(|source| LoopError::Diff {
                    view: sample.view.name.clone(),
                    source,
                })?;

            let Some(mut table) = shown else {
                debug!(view = %sample.view.name, "baseline sample, nothing to print");
                continue;
            };
            table.truncate_strings(self.string_limit);
            table.truncate_rows(self.limit);
            write_sample(&mut self.out, timestamp, &sample.view.name, &table)
                .map_err(LoopError::Output)?;
        }
        self.out.flush().map_err(LoopError::Output)
    }
}
