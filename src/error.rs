//! Error type shared by the snapshot, delta and archive layers.

use std::path::PathBuf;

/// Errors raised while building, diffing or persisting snapshots.
#[derive(Debug)]
pub enum StatError {
    /// Query result (or hand-built snapshot) violates the row/column invariant.
    MalformedResult(String),
    /// Archive payload could not be turned back into a snapshot.
    MalformedArchiveEntry(String),
    /// A cell that must be numeric is NULL or non-numeric text.
    InvalidNumericCell(String),
    /// A column index points outside the snapshot.
    InvalidColumn { index: usize, columns: usize },
    /// Archive file cannot be opened, positioned or written.
    ArchiveUnwritable { path: PathBuf, reason: String },
    /// Archive file cannot be opened for reading.
    ArchiveUnreadable { path: PathBuf, reason: String },
    /// Archive stream or entry is damaged; replay stops here.
    ArchiveCorrupt {
        entry: String,
        position: usize,
        reason: String,
    },
}

impl std::fmt::Display for StatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatError::MalformedResult(msg) => write!(f, "malformed result: {}", msg),
            StatError::MalformedArchiveEntry(msg) => {
                write!(f, "malformed archive entry: {}", msg)
            }
            StatError::InvalidNumericCell(msg) => write!(f, "invalid numeric value: {}", msg),
            StatError::InvalidColumn { index, columns } => write!(
                f,
                "column index {} out of range (snapshot has {} columns)",
                index, columns
            ),
            StatError::ArchiveUnwritable { path, reason } => {
                write!(f, "archive {} is not writable: {}", path.display(), reason)
            }
            StatError::ArchiveUnreadable { path, reason } => {
                write!(f, "archive {} is not readable: {}", path.display(), reason)
            }
            StatError::ArchiveCorrupt {
                entry,
                position,
                reason,
            } => write!(
                f,
                "archive entry #{} ({}) is corrupt: {}",
                position, entry, reason
            ),
        }
    }
}

impl std::error::Error for StatError {}
