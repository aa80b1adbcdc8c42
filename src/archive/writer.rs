//! Archive write path.
//!
//! Every sampling cycle is a separate open → append → finish scope. The file is
//! only held open while one cycle is written, and every cycle ends with a fresh
//! end-of-archive marker, so the file on disk always contains whole cycles
//! between ticks and another process can read it in the meantime. A cycle that
//! fails or is dropped unfinished is cut back to where it started.

use std::fs::{File, OpenOptions};
use std::io::{self, Read as _, Seek, SeekFrom, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::name::EntryName;
use super::payload;
use crate::error::StatError;
use crate::table::TabularSnapshot;

const BLOCK_SIZE: u64 = 512;
/// Two zero blocks terminate a tar stream.
const END_MARKER_SIZE: u64 = 2 * BLOCK_SIZE;

/// What to do with an existing archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Continue after the entries already in the file.
    Append,
    /// Drop existing content on the first cycle, append afterwards.
    Truncate,
}

/// Appends sampling cycles to a tar archive.
pub struct ArchiveWriter {
    path: PathBuf,
    mode: WriteMode,
}

impl ArchiveWriter {
    pub fn new(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the archive for one cycle, positioned over the end-of-archive
    /// marker.
    ///
    /// In [`WriteMode::Truncate`] the file is emptied on the first call only.
    pub fn begin_cycle(&mut self) -> Result<ArchiveCycle, StatError> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        if self.mode == WriteMode::Truncate {
            options.truncate(true);
        }

        let mut file = options.open(&self.path).map_err(|e| self.unwritable(e))?;
        let offset = append_offset(&mut file).map_err(|e| self.unwritable(e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| self.unwritable(e))?;

        debug!(path = %self.path.display(), offset, "archive opened for cycle");
        self.mode = WriteMode::Append;

        Ok(ArchiveCycle {
            path: self.path.clone(),
            builder: Some(tar::Builder::new(file)),
            start: offset,
            entries: 0,
        })
    }

    fn unwritable(&self, e: io::Error) -> StatError {
        StatError::ArchiveUnwritable {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

/// One open write scope.
///
/// Entries only become part of the archive through [`ArchiveCycle::finish`].
/// A failed append, or dropping the cycle unfinished, truncates the file back
/// to the offset the cycle started at and restores the end marker; the cycle
/// then refuses further appends and `finish` reports it as discarded.
pub struct ArchiveCycle {
    path: PathBuf,
    /// `None` once the cycle was finished or rolled back.
    builder: Option<tar::Builder<File>>,
    start: u64,
    entries: usize,
}

impl ArchiveCycle {
    /// Appends one snapshot as `<category>.<timestamp>.json`.
    pub fn append(
        &mut self,
        category: &str,
        timestamp: DateTime<Utc>,
        snapshot: &TabularSnapshot,
    ) -> Result<(), StatError> {
        let result = self.try_append(category, timestamp, snapshot);
        if result.is_err() {
            self.rollback();
        }
        result
    }

    fn try_append(
        &mut self,
        category: &str,
        timestamp: DateTime<Utc>,
        snapshot: &TabularSnapshot,
    ) -> Result<(), StatError> {
        let Some(builder) = self.builder.as_mut() else {
            return Err(self.discarded());
        };
        let name = EntryName::new(category, timestamp).map_err(|reason| {
            StatError::ArchiveUnwritable {
                path: self.path.clone(),
                reason,
            }
        })?;
        let data = payload::encode(snapshot)?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(name.timestamp.timestamp().max(0) as u64);

        builder
            .append_data(&mut header, name.to_string(), data.as_slice())
            .map_err(|e| StatError::ArchiveUnwritable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        self.entries += 1;
        Ok(())
    }

    /// Writes the end-of-archive marker, syncs and closes the file.
    ///
    /// Returns the number of entries written in this cycle.
    pub fn finish(mut self) -> Result<usize, StatError> {
        let Some(builder) = self.builder.take() else {
            return Err(self.discarded());
        };
        let unwritable = |e: io::Error| StatError::ArchiveUnwritable {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        let file = builder.into_inner().map_err(unwritable)?;
        file.sync_all().map_err(unwritable)?;
        debug!(path = %self.path.display(), entries = self.entries, "archive cycle closed");
        Ok(self.entries)
    }

    /// Cuts the file back to the cycle's start offset.
    fn rollback(&mut self) {
        let Some(mut builder) = self.builder.take() else {
            return;
        };
        // Marks the builder finished even when the marker write fails; the
        // marker is rewritten at the start offset below.
        let _ = builder.finish();
        let restored = builder
            .into_inner()
            .and_then(|mut file| restore_end(&mut file, self.start));
        match restored {
            Ok(()) => warn!(
                path = %self.path.display(),
                offset = self.start,
                entries = self.entries,
                "archive cycle discarded"
            ),
            Err(e) => warn!(
                path = %self.path.display(),
                offset = self.start,
                "failed to discard archive cycle: {}",
                e
            ),
        }
        self.entries = 0;
    }

    fn discarded(&self) -> StatError {
        StatError::ArchiveUnwritable {
            path: self.path.clone(),
            reason: "cycle was discarded after a failed append".to_string(),
        }
    }
}

impl Drop for ArchiveCycle {
    fn drop(&mut self) {
        self.rollback();
    }
}

/// Truncates to `offset` and writes a fresh end-of-archive marker there.
fn restore_end(file: &mut File, offset: u64) -> io::Result<()> {
    file.set_len(offset)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&[0u8; END_MARKER_SIZE as usize])?;
    file.sync_all()
}

/// Finds where new entries go: the start of the trailing run of zero blocks.
fn append_offset(file: &mut File) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }
    if len % BLOCK_SIZE != 0 {
        return Err(io::Error::other(format!(
            "existing file is not a tar archive (size {} is not a multiple of {})",
            len, BLOCK_SIZE
        )));
    }

    let mut block = [0u8; BLOCK_SIZE as usize];
    let mut offset = len;
    while offset >= BLOCK_SIZE {
        file.seek(SeekFrom::Start(offset - BLOCK_SIZE))?;
        file.read_exact(&mut block)?;
        if block.iter().any(|&b| b != 0) {
            break;
        }
        offset -= BLOCK_SIZE;
    }

    if len - offset < END_MARKER_SIZE {
        warn!(
            len,
            offset, "archive has no end-of-archive marker, last cycle may be incomplete"
        );
    }
    Ok(offset)
}
