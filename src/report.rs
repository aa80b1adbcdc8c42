//! Archive reports: replay one category from a recording and print its deltas.

use std::io::{self, Write};
use std::path::PathBuf;

use regex::Regex;
use tracing::{debug, info};

use crate::archive::{ArchiveReader, EntryFilter};
use crate::error::StatError;
use crate::series::{SeriesTracker, write_sample};
use crate::util::{TimeParseError, parse_time};
use crate::view::{QueryOptions, Views};

/// Error type for report generation.
#[derive(Debug)]
pub enum ReportError {
    /// The archive could not be opened or an entry is damaged.
    Archive(StatError),
    /// Two consecutive records could not be diffed.
    Diff(StatError),
    /// The category is not one of the stock views.
    UnknownCategory(String),
    /// An order or grep column is not in the recorded table.
    UnknownColumn(String),
    /// Grep filter is not `COLUMN:REGEX` or the regex does not compile.
    InvalidPattern(String),
    /// A start or end time could not be parsed.
    InvalidTime(TimeParseError),
    /// Report output could not be written.
    Output(io::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Archive(e) => write!(f, "{}", e),
            ReportError::Diff(e) => write!(f, "diff failed: {}", e),
            ReportError::UnknownCategory(name) => write!(f, "unknown category '{}'", name),
            ReportError::UnknownColumn(name) => write!(f, "unknown column '{}'", name),
            ReportError::InvalidPattern(msg) => write!(f, "invalid filter: {}", msg),
            ReportError::InvalidTime(e) => write!(f, "{}", e),
            ReportError::Output(e) => write!(f, "output: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

/// Report settings.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub input: PathBuf,
    /// Inclusive lower time bound, any format [`parse_time`] accepts.
    pub start: Option<String>,
    pub end: Option<String>,
    pub category: String,
    /// Column name to sort by instead of the category default.
    pub order: Option<String>,
    /// Sort direction; `None` keeps the category default.
    pub descending: Option<bool>,
    /// `COLUMN:REGEX`; rows whose cell does not match are hidden.
    pub grep: Option<String>,
    /// Maximum rows per table; 0 means unlimited.
    pub limit: usize,
    /// Maximum characters per cell; 0 means unlimited.
    pub string_limit: usize,
}

impl ReportConfig {
    pub fn new(input: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            start: None,
            end: None,
            category: category.into(),
            order: None,
            descending: None,
            grep: None,
            limit: 0,
            string_limit: 32,
        }
    }
}

/// Parsed `COLUMN:REGEX` filter.
#[derive(Debug)]
struct Grep {
    column: String,
    pattern: Regex,
}

impl Grep {
    fn parse(spec: &str) -> Result<Self, ReportError> {
        let (column, pattern) = spec.split_once(':').ok_or_else(|| {
            ReportError::InvalidPattern(format!("'{}' is not COLUMN:PATTERN", spec))
        })?;
        if column.is_empty() {
            return Err(ReportError::InvalidPattern(format!(
                "'{}' has no column name",
                spec
            )));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| ReportError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
        Ok(Self {
            column: column.to_string(),
            pattern,
        })
    }
}

/// Prints the report to `out` and returns how many tables were printed.
///
/// Output produced before a damaged archive entry stays written; the error is
/// returned after it.
pub fn run_report<W: Write>(config: &ReportConfig, out: &mut W) -> Result<usize, ReportError> {
    // Diff rules do not depend on the server, only on the category.
    let catalogue = Views::default_catalogue(&QueryOptions::default());
    let view = catalogue
        .get(&config.category)
        .ok_or_else(|| ReportError::UnknownCategory(config.category.clone()))?;
    let grep = config.grep.as_deref().map(Grep::parse).transpose()?;

    let first = ArchiveReader::open(&config.input)
        .and_then(|mut r| r.first_entry())
        .map_err(ReportError::Archive)?;
    let Some(first) = first else {
        info!(path = %config.input.display(), "archive is empty");
        return Ok(0);
    };

    let resolve = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| parse_time(v, first.timestamp))
            .transpose()
            .map_err(ReportError::InvalidTime)
    };
    let filter = EntryFilter::default()
        .category(config.category.as_str())
        .range(resolve(&config.start)?, resolve(&config.end)?);
    debug!(?filter, "report filter");

    let mut reader = ArchiveReader::open(&config.input).map_err(ReportError::Archive)?;
    let mut tracker = SeriesTracker::new();
    let mut printed = 0usize;

    for record in reader.records(filter).map_err(ReportError::Archive)? {
        let record = record.map_err(ReportError::Archive)?;
        let Some(mut table) = tracker
            .advance(view, record.timestamp, record.snapshot)
            .map_err(ReportError::Diff)?
        else {
            continue;
        };

        let order = match &config.order {
            Some(name) => {
                let column = table
                    .column_index(name)
                    .ok_or_else(|| ReportError::UnknownColumn(name.clone()))?;
                Some((column, config.descending.unwrap_or(view.order_desc)))
            }
            None => config.descending.map(|desc| (view.order_key, desc)),
        };
        if let Some((column, descending)) = order {
            table.sort(column, descending);
        }
        if let Some(grep) = &grep {
            let column = table
                .column_index(&grep.column)
                .ok_or_else(|| ReportError::UnknownColumn(grep.column.clone()))?;
            table
                .retain_matching(column, &grep.pattern)
                .map_err(|_| ReportError::UnknownColumn(grep.column.clone()))?;
        }
        table.truncate_strings(config.string_limit);
        table.truncate_rows(config.limit);

        write_sample(out, record.timestamp, &record.category, &table)
            .map_err(ReportError::Output)?;
        printed += 1;
    }

    out.flush().map_err(ReportError::Output)?;
    Ok(printed)
}
