//! Reference database provisioning.
//!
//! Runs once before grading: the database file is recreated from the schema
//! and seeded either with fixture rows or with generated data.

use super::schema::{Affinity, ForeignKeyRef, SchemaSource, TableDef};
use super::sqlite::{convert_row, SqliteClient};
use super::{DatabaseHandle, Value};
use crate::error::{GraderError, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection};
use sqlx::query::Query;
use sqlx::Connection;
use std::path::Path;
use tracing::{debug, info, warn};

/// Length of generated text values.
const RANDOM_WORD_LEN: usize = 7;

/// Length of generated blob values.
const RANDOM_BLOB_LEN: usize = 8;

/// How the reference database is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// Insert the fixture rows declared in the schema.
    Fixture,
    /// Generate random rows; a seed makes the data reproducible.
    Random { seed: Option<u64> },
}

/// Creates the database at `path` from `schema` and seeds it.
///
/// Any existing file at `path` is replaced. Every failure is a
/// [`GraderError::Provisioning`].
pub async fn provision(
    schema: &SchemaSource,
    seed_mode: SeedMode,
    path: &Path,
) -> Result<DatabaseHandle> {
    remove_existing(path)?;

    let handle = DatabaseHandle::new(path);
    let mut client = SqliteClient::create(&handle).await?;

    match schema {
        SchemaSource::Script { sql } => {
            if matches!(seed_mode, SeedMode::Random { .. }) {
                return Err(GraderError::provisioning(
                    "Random data requires a TOML schema; SQL scripts seed themselves",
                ));
            }
            sqlx::raw_sql(sql)
                .execute(client.connection())
                .await
                .map_err(|e| GraderError::provisioning(format!("Schema script failed: {e}")))?;
        }
        SchemaSource::Tables { tables, .. } => {
            let conn = client.connection();
            let mut tx = conn
                .begin()
                .await
                .map_err(|e| GraderError::provisioning(format!("Cannot begin transaction: {e}")))?;

            for table in tables {
                let statement = table.create_statement();
                debug!("{statement}");
                sqlx::query(&statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        GraderError::provisioning(format!(
                            "Failed to create table {}: {e}",
                            table.name
                        ))
                    })?;
            }

            match seed_mode {
                SeedMode::Fixture => {
                    for table in tables {
                        insert_fixture(&mut tx, table).await?;
                    }
                }
                SeedMode::Random { seed } => {
                    let mut rng = match seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_os_rng(),
                    };
                    for table in tables {
                        insert_random(&mut tx, table, &mut rng).await?;
                    }
                }
            }

            tx.commit()
                .await
                .map_err(|e| GraderError::provisioning(format!("Failed to commit seed data: {e}")))?;
        }
    }

    client
        .close()
        .await
        .map_err(|e| GraderError::provisioning(e.to_string()))?;

    info!("Provisioned {} ({:?})", path.display(), seed_mode);
    Ok(handle)
}

fn remove_existing(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path).map_err(|e| {
            GraderError::provisioning(format!("Cannot replace {}: {e}", path.display()))
        })?;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            GraderError::provisioning(format!("Cannot create {}: {e}", parent.display()))
        })?;
    }
    Ok(())
}

async fn insert_fixture(conn: &mut SqliteConnection, table: &TableDef) -> Result<()> {
    for (index, row) in table.fixture.iter().enumerate() {
        if row.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES;", table.name);
            sqlx::query(&sql).execute(&mut *conn).await.map_err(|e| {
                GraderError::provisioning(format!("Fixture row {index} of {}: {e}", table.name))
            })?;
            continue;
        }

        let mut columns = Vec::with_capacity(row.len());
        let mut values = Vec::with_capacity(row.len());
        for (column, value) in row {
            if !column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(GraderError::provisioning(format!(
                    "Invalid column name '{column}' in fixture of {}",
                    table.name
                )));
            }
            columns.push(column.as_str());
            values.push(fixture_value(value).ok_or_else(|| {
                GraderError::provisioning(format!(
                    "Unsupported fixture value for {}.{column}: {value}",
                    table.name
                ))
            })?);
        }

        let sql = insert_statement(&table.name, &columns, "INSERT");
        let query = values
            .iter()
            .fold(sqlx::query(&sql), |query, value| bind_value(query, value));
        query.execute(&mut *conn).await.map_err(|e| {
            GraderError::provisioning(format!("Fixture row {index} of {}: {e}", table.name))
        })?;
    }

    debug!("Inserted {} fixture rows into {}", table.fixture.len(), table.name);
    Ok(())
}

fn fixture_value(value: &toml::Value) -> Option<Value> {
    match value {
        toml::Value::Integer(i) => Some(Value::Int(*i)),
        toml::Value::Float(f) => Some(Value::Float(*f)),
        toml::Value::String(s) => Some(Value::Text(s.clone())),
        toml::Value::Boolean(b) => Some(Value::Int(i64::from(*b))),
        _ => None,
    }
}

async fn insert_random(
    conn: &mut SqliteConnection,
    table: &TableDef,
    rng: &mut StdRng,
) -> Result<()> {
    let columns: Vec<_> = table
        .column_defs()
        .into_iter()
        .filter(|c| !c.is_rowid_alias)
        .collect();
    let foreign_keys = table.foreign_keys();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

    // Conflicting random rows (UNIQUE, NOT NULL on an empty parent) are skipped.
    let sql = if names.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES;", table.name)
    } else {
        insert_statement(&table.name, &names, "INSERT OR IGNORE")
    };

    for _ in 0..table.random_rows {
        let mut values = Vec::with_capacity(columns.len());
        for column in &columns {
            let value = match foreign_keys.iter().find(|fk| fk.column == column.name) {
                Some(fk) => {
                    let candidates = referenced_values(conn, fk).await?;
                    candidates.choose(rng).cloned().unwrap_or(Value::Null)
                }
                None => random_value(column.affinity(), rng),
            };
            values.push(value);
        }

        let query = values
            .iter()
            .fold(sqlx::query(&sql), |query, value| bind_value(query, value));
        query.execute(&mut *conn).await.map_err(|e| {
            GraderError::provisioning(format!("Random row for {}: {e}", table.name))
        })?;
    }

    for fk in foreign_keys.iter().filter(|fk| fk.table == table.name) {
        repoint_self_reference(conn, table, fk, rng).await?;
    }

    debug!("Inserted {} random rows into {}", table.random_rows, table.name);
    Ok(())
}

/// Points each row of a self-referencing table at a random other row,
/// building a hierarchy instead of leaving every reference NULL.
async fn repoint_self_reference(
    conn: &mut SqliteConnection,
    table: &TableDef,
    fk: &ForeignKeyRef,
    rng: &mut StdRng,
) -> Result<()> {
    let targets = referenced_values(conn, fk).await?;
    let select = format!("SELECT rowid, {} FROM {};", fk.referenced_column, table.name);
    let rows = sqlx::query(&select)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| GraderError::provisioning(format!("Reading {}: {e}", table.name)))?;

    let update = format!(
        "UPDATE {} SET {} = ? WHERE rowid = ?;",
        table.name, fk.column
    );
    for row in rows.iter().map(convert_row) {
        let (Some(rowid), Some(own_key)) = (row.first(), row.get(1)) else {
            continue;
        };
        let Some(parent) = targets.choose(rng) else {
            break;
        };
        if parent == own_key {
            continue;
        }
        let query = bind_value(bind_value(sqlx::query(&update), parent), rowid);
        if let Err(e) = query.execute(&mut *conn).await {
            warn!("Could not set {}.{} for row {}: {e}", table.name, fk.column, rowid);
        }
    }
    Ok(())
}

async fn referenced_values(conn: &mut SqliteConnection, fk: &ForeignKeyRef) -> Result<Vec<Value>> {
    let sql = format!("SELECT {} FROM {};", fk.referenced_column, fk.table);
    let rows = sqlx::query(&sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            GraderError::provisioning(format!(
                "Cannot read {}.{}: {e}",
                fk.table, fk.referenced_column
            ))
        })?;

    Ok(rows
        .iter()
        .map(convert_row)
        .filter_map(|row| row.into_iter().next())
        .filter(|value| !value.is_null())
        .collect())
}

fn random_value(affinity: Affinity, rng: &mut StdRng) -> Value {
    match affinity {
        Affinity::Integer | Affinity::Numeric => Value::Int(rng.random_range(1..=100)),
        Affinity::Real => {
            let raw: f64 = rng.random_range(0.0..100.0);
            Value::Float((raw * 100.0).round() / 100.0)
        }
        Affinity::Text => Value::Text(random_word(rng, RANDOM_WORD_LEN)),
        Affinity::Blob => Value::Bytes((0..RANDOM_BLOB_LEN).map(|_| rng.random()).collect()),
    }
}

fn random_word(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'a' + rng.random_range(0..26u8)))
        .collect()
}

fn insert_statement(table: &str, columns: &[&str], verb: &str) -> String {
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "{verb} INTO {table} ({}) VALUES ({placeholders});",
        columns.join(", ")
    )
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
    }
}
