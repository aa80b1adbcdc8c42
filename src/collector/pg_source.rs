//! PostgreSQL statistics source.
//!
//! Every statistics query goes through the simple query protocol, so the
//! server sends all values as text and no per-column type mapping is needed.
//! NULL is kept distinct from the empty string.

use postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, info};

use super::{SourceError, StatSource};
use crate::table::{Row, TabularSnapshot};

/// Statistics source backed by a single PostgreSQL connection.
///
/// Connects using standard environment variables:
/// - PGHOST (default: localhost)
/// - PGPORT (default: 5432)
/// - PGUSER (default: $USER)
/// - PGPASSWORD (default: empty)
/// - PGDATABASE (default: same as PGUSER)
///
/// The connection is opened lazily on the first query. A failed query does not
/// reconnect; the caller decides whether the session continues.
pub struct PostgresSource {
    connection_string: String,
    client: Option<Client>,
}

impl PostgresSource {
    /// Creates a source from environment variables.
    ///
    /// Uses $USER as default if PGUSER is not set.
    pub fn from_env() -> Result<Self, SourceError> {
        let user = std::env::var("PGUSER")
            .or_else(|_| std::env::var("USER"))
            .map_err(|_| SourceError::EnvNotSet("PGUSER or USER".to_string()))?;

        let host = std::env::var("PGHOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("PGPORT").unwrap_or_else(|_| "5432".to_string());
        let password = std::env::var("PGPASSWORD").unwrap_or_default();
        let database = std::env::var("PGDATABASE").unwrap_or_else(|_| user.clone());

        Ok(Self::with_connection_string(build_connection_string(
            &host, &port, &user, &password, &database,
        )))
    }

    /// Creates a source with an explicit libpq-style connection string.
    pub fn with_connection_string(connection_string: String) -> Self {
        Self {
            connection_string,
            client: None,
        }
    }

    /// Connects now instead of on the first query.
    ///
    /// Useful for startup checks before the sampling loop begins.
    pub fn try_connect(&mut self) -> Result<(), SourceError> {
        self.ensure_connected().map(|_| ())
    }

    fn ensure_connected(&mut self) -> Result<&mut Client, SourceError> {
        if self.client.is_none() {
            let client = Client::connect(&self.connection_string, NoTls)
                .map_err(|e| SourceError::ConnectionError(format_postgres_error(&e)))?;
            info!("connected to PostgreSQL");
            self.client = Some(client);
        }
        self.client
            .as_mut()
            .ok_or_else(|| SourceError::ConnectionError("not connected".to_string()))
    }
}

impl StatSource for PostgresSource {
    fn query(&mut self, sql: &str) -> Result<TabularSnapshot, SourceError> {
        let client = self.ensure_connected()?;
        let messages = client
            .simple_query(sql)
            .map_err(|e| SourceError::QueryError(format_postgres_error(&e)))?;

        let mut columns: Option<Vec<String>> = None;
        let mut rows: Vec<Row> = Vec::new();
        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    if columns.is_none() {
                        columns = Some(description.iter().map(|c| c.name().to_string()).collect());
                    }
                }
                SimpleQueryMessage::Row(row) => {
                    if columns.is_none() {
                        columns = Some(row.columns().iter().map(|c| c.name().to_string()).collect());
                    }
                    rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
                }
                SimpleQueryMessage::CommandComplete(_) => {
                    // Only the first statement's result is kept.
                    if columns.is_some() {
                        break;
                    }
                }
                _ => {}
            }
        }

        let columns = columns
            .ok_or_else(|| SourceError::QueryError("statement returned no result set".to_string()))?;
        debug!(columns = columns.len(), rows = rows.len(), "query done");
        TabularSnapshot::new(columns, rows).map_err(|e| SourceError::QueryError(e.to_string()))
    }
}

fn build_connection_string(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    database: &str,
) -> String {
    let mut parts = vec![
        format!("host={}", quote_value(host)),
        format!("port={}", quote_value(port)),
        format!("user={}", quote_value(user)),
    ];
    if !password.is_empty() {
        parts.push(format!("password={}", quote_value(password)));
    }
    parts.push(format!("dbname={}", quote_value(database)));
    parts.push("application_name=pgrec".to_string());
    parts.join(" ")
}

/// Quotes a connection string value when it contains spaces, quotes or
/// backslashes.
fn quote_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Formats PostgreSQL error message for display.
fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}
