/// SQLite persistence for every resource family
///
/// One storage struct per table family, each wrapping a clone of the shared
/// pool. JSON columns are stored as TEXT and decoded with serde_json; status
/// columns are stored as their lowercase names.

pub mod api_logs;
pub mod tasks;
pub mod webhooks;
pub mod workflows;

pub use api_logs::ApiLogStorage;
pub use tasks::TaskStorage;
pub use webhooks::WebhookStorage;
pub use workflows::WorkflowStorage;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqlitePool, SqliteRow},
    Row, Sqlite, Transaction,
};
use std::str::FromStr;

/// Result of deleting a parent row that may own executions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Refused: this many child executions still reference the row
    HasChildren(i64),
}

/// Begin a transaction that holds the write lock from its first statement
///
/// A deferred transaction that reads and then writes cannot wait for the lock:
/// SQLite fails the upgrade with `SQLITE_BUSY` when another writer got there
/// first. `BEGIN IMMEDIATE` queues on the busy timeout instead.
pub(crate) async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE")
        .await
        .context("Failed to begin write transaction")
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("Column '{}' holds invalid JSON", column))
}

pub(crate) fn optional_json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<T>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|raw| serde_json::from_str(&raw))
        .transpose()
        .with_context(|| format!("Column '{}' holds invalid JSON", column))
}

pub(crate) fn enum_column<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn to_optional_json<T: Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value.as_ref().map(to_json).transpose()
}
