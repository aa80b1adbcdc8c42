//! Utility modules for pgrec.

mod time_parser;

pub use time_parser::{TimeParseError, parse_time};
