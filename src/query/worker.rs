//! The isolated side of query execution.
//!
//! `sqlgrade worker --database <PATH>` reads one SQL text from stdin, runs it
//! on a private connection and writes exactly one JSON [`WorkerReply`] to
//! stdout. The grader treats anything else (no reply, a crash, a kill) as a
//! failed execution.

use crate::db::{DatabaseHandle, Row, SqliteClient};
use crate::error::{GraderError, Result};
use crate::query::QueryOutcome;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Name of the hidden CLI subcommand that runs a worker.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// The single message a worker sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkerReply {
    /// The query ran to completion.
    Rows { rows: Vec<Row> },
    /// The query could not be run.
    Error { message: String },
}

impl WorkerReply {
    /// Parses a reply from raw worker stdout.
    pub fn parse(stdout: &[u8]) -> Result<Self> {
        serde_json::from_slice(stdout)
            .map_err(|e| GraderError::worker(format!("invalid worker reply: {e}")))
    }
}

impl From<WorkerReply> for QueryOutcome {
    fn from(reply: WorkerReply) -> Self {
        match reply {
            WorkerReply::Rows { rows } => QueryOutcome::Rows(rows),
            WorkerReply::Error { message } => QueryOutcome::Error(message),
        }
    }
}

/// Executes `sql` against the database and packages the result.
///
/// Never fails: every error becomes a [`WorkerReply::Error`].
pub async fn execute_local(sql: &str, database: &DatabaseHandle) -> WorkerReply {
    let mut client = match SqliteClient::open(database).await {
        Ok(client) => client,
        Err(e) => return error_reply(e),
    };

    let reply = match client.execute_query(sql).await {
        Ok(rows) => {
            debug!("Worker produced {} rows", rows.len());
            WorkerReply::Rows { rows }
        }
        Err(e) => error_reply(e),
    };

    let _ = client.close().await;
    reply
}

fn error_reply(error: GraderError) -> WorkerReply {
    let message = match error {
        GraderError::Query(msg) => msg,
        other => other.to_string(),
    };
    WorkerReply::Error { message }
}

/// Worker process entry point: stdin in, one JSON reply out.
pub async fn run_worker(database: &DatabaseHandle) -> Result<()> {
    let mut input = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut input)
        .await
        .map_err(|e| GraderError::worker(format!("Failed to read query from stdin: {e}")))?;

    let reply = match String::from_utf8(input) {
        Ok(sql) => execute_local(&sql, database).await,
        Err(e) => WorkerReply::Error {
            message: format!("query is not valid UTF-8: {e}"),
        },
    };

    let json = serde_json::to_vec(&reply)
        .map_err(|e| GraderError::internal(format!("Failed to encode reply: {e}")))?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&json)
        .await
        .map_err(|e| GraderError::worker(format!("Failed to write reply: {e}")))?;
    stdout
        .flush()
        .await
        .map_err(|e| GraderError::worker(format!("Failed to write reply: {e}")))?;
    Ok(())
}
