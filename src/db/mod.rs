//! Database layer for sqlgrade.
//!
//! Provisions the reference SQLite database once per run and exposes the
//! client each isolated worker uses to execute a submission.

mod provision;
mod schema;
mod sqlite;
mod types;

pub use provision::{provision, SeedMode};
pub use schema::{ColumnDef, ForeignKeyRef, SchemaSource, TableDef};
pub use sqlite::SqliteClient;
pub use types::{Row, Value};

use std::path::{Path, PathBuf};

/// Location of a provisioned database.
///
/// Cheap to clone and safe to hand to worker processes: it carries only the
/// path, never a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHandle {
    path: PathBuf,
}

impl DatabaseHandle {
    /// Creates a handle for the database file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
