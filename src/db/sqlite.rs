//! SQLite database client implementation.
//!
//! Each grading worker opens its own `SqliteClient` against the provisioned
//! database file; nothing is shared across process boundaries.

use crate::db::{DatabaseHandle, Row, Value};
use crate::error::{GraderError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row as SqlxRow, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// A single SQLite connection.
#[derive(Debug)]
pub struct SqliteClient {
    conn: SqliteConnection,
}

impl SqliteClient {
    /// Opens an existing database file.
    pub async fn open(handle: &DatabaseHandle) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(handle.path())
            .create_if_missing(false)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let conn = SqliteConnection::connect_with(&options).await.map_err(|e| {
            GraderError::query(format!(
                "Cannot open database {}: {e}",
                handle.path().display()
            ))
        })?;
        debug!("Opened {}", handle.path().display());
        Ok(Self { conn })
    }

    /// Creates a fresh database file, used by provisioning.
    pub(crate) async fn create(handle: &DatabaseHandle) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(handle.path())
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));

        let conn = SqliteConnection::connect_with(&options).await.map_err(|e| {
            GraderError::provisioning(format!(
                "Cannot create database {}: {e}",
                handle.path().display()
            ))
        })?;
        Ok(Self { conn })
    }

    /// Executes a SQL query and returns every row in the engine's order.
    pub async fn execute_query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| GraderError::query(format_query_error(e)))?;

        Ok(rows.iter().map(convert_row).collect())
    }

    /// Returns the underlying connection for provisioning statements.
    pub(crate) fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| GraderError::query(format!("Failed to close connection: {e}")))
    }
}

/// Converts a sqlx SqliteRow to our Row type.
pub(super) fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

/// Converts a single column value, dispatching on the value's runtime
/// storage class rather than the declared column type.
fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_uppercase(),
        Err(_) => return Value::Null,
    };

    match type_name.as_str() {
        "INTEGER" | "INT8" | "BIGINT" | "BOOLEAN" => row
            .try_get_unchecked::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "REAL" | "FLOAT" | "DOUBLE" => row
            .try_get_unchecked::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BLOB" => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // TEXT and anything date-like SQLite reports
        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

/// Formats a query error the way SQLite reports it.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => db_error.message().to_string(),
        None => error.to_string(),
    }
}
