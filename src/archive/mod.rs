//! Snapshot archive: a plain tar file with one entry per category per
//! sampling cycle.
//!
//! Entries appear in write order. Within one cycle every category carries the
//! same timestamp, so `tar tf` lists a recording in chronological order.

mod name;
pub mod payload;
mod reader;
mod writer;

pub use name::EntryName;
pub use reader::{ArchiveReader, ArchiveRecord, EntryFilter, Records};
pub use writer::{ArchiveCycle, ArchiveWriter, WriteMode};
