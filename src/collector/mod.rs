//! Statistics sources.
//!
//! A [`StatSource`] runs one SQL statement and returns its result as a
//! [`TabularSnapshot`]. [`PostgresSource`] talks to a live server,
//! [`MockSource`] replays scripted results in tests.

mod mock;
mod pg_source;

pub use mock::MockSource;
pub use pg_source::PostgresSource;

use tracing::debug;

use crate::table::TabularSnapshot;

/// Error type for statistics acquisition.
#[derive(Debug)]
pub enum SourceError {
    /// Environment variable not set.
    EnvNotSet(String),
    /// Connection failed.
    ConnectionError(String),
    /// Query execution failed or returned an unusable result.
    QueryError(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::EnvNotSet(var) => write!(f, "PostgreSQL: {} not set", var),
            SourceError::ConnectionError(msg) => write!(f, "PostgreSQL: {}", msg),
            SourceError::QueryError(msg) => write!(f, "PostgreSQL query error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Something that can answer a statistics query.
pub trait StatSource {
    /// Runs `sql` and returns every row as text, NULLs preserved.
    fn query(&mut self, sql: &str) -> Result<TabularSnapshot, SourceError>;
}

/// Query used by [`ServerProperties::fetch`].
pub const PROPERTIES_QUERY: &str = "SELECT current_setting('server_version_num') AS version, \
     pg_is_in_recovery() AS recovery, \
     (SELECT n.nspname FROM pg_extension e JOIN pg_namespace n ON n.oid = e.extnamespace \
     WHERE e.extname = 'pg_stat_statements') AS pgss_schema";

/// Server facts that decide which views run and how their SQL looks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProperties {
    /// `server_version_num`, e.g. `160002`.
    pub version: u32,
    pub recovery: bool,
    /// Schema where pg_stat_statements is installed, if it is.
    pub pgss_schema: Option<String>,
}

impl ServerProperties {
    pub fn fetch(source: &mut dyn StatSource) -> Result<Self, SourceError> {
        let result = source.query(PROPERTIES_QUERY)?;
        if result.nrows != 1 || result.ncols < 3 {
            return Err(SourceError::QueryError(format!(
                "server properties: expected 1 row with 3 columns, got {} rows with {} columns",
                result.nrows, result.ncols
            )));
        }

        let version = result
            .cell(0, 0)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                SourceError::QueryError(format!(
                    "server properties: bad server_version_num {:?}",
                    result.cell(0, 0)
                ))
            })?;
        let recovery = matches!(result.cell(0, 1), Some("t") | Some("true"));
        let pgss_schema = result
            .cell(0, 2)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let props = Self {
            version,
            recovery,
            pgss_schema,
        };
        debug!(
            version = props.version,
            recovery = props.recovery,
            pgss_schema = ?props.pgss_schema,
            "server properties"
        );
        Ok(props)
    }
}
