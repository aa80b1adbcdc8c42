//! pgrec - PostgreSQL statistics recorder library.
//!
//! This library provides the core functionality shared between:
//! - `pgrecd` - records statistics snapshots into a tar archive
//! - `pgrec` - live delta view and reports over recorded archives

pub mod archive;
pub mod collector;
pub mod delta;
pub mod error;
pub mod report;
pub mod sampling;
pub mod series;
pub mod table;
pub mod util;
pub mod view;

pub use error::StatError;
pub use table::TabularSnapshot;
