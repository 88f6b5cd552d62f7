//! Executes generated SQL against the flights database and loads the dataset.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

mod decode;
pub mod error;
pub mod import;
mod kind;
mod postgres;
mod sqlite;
mod statement;

pub use error::{ExecutionError, ImportError};
pub use import::{import_dataset, ImportReport, TableImport};
pub use kind::ColumnKind;
pub use postgres::{PostgresExecutor, PostgresExecutorBuilder};
pub use sqlite::{SqliteExecutor, SqliteExecutorBuilder};

pub const DEFAULT_ROW_CAP: usize = 100;

pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
}

/// Outcome of a successful query. `row_count` is the size of the full result;
/// `rows` holds at most the requested cap, in datastore order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub rows: Vec<Row>,
    pub column_names: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, ExecutionError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

impl Backend {
    pub fn from_url(database_url: &str) -> Result<Self, ExecutionError> {
        let url = database_url.trim();
        if url.starts_with("sqlite:") {
            Ok(Backend::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Backend::Postgres)
        } else {
            Err(ExecutionError::InvalidConfig(format!(
                "unsupported database url '{url}' (expected sqlite: or postgres://)"
            )))
        }
    }
}

/// Builds the executor matching the URL scheme. Connections are opened lazily.
pub fn connect_executor(
    database_url: &str,
    max_connections: u32,
) -> Result<Arc<dyn SqlExecutor>, ExecutionError> {
    match Backend::from_url(database_url)? {
        Backend::Sqlite => Ok(Arc::new(
            SqliteExecutor::builder(database_url)
                .max_connections(max_connections)
                .build()?,
        )),
        Backend::Postgres => Ok(Arc::new(
            PostgresExecutor::builder(database_url)
                .max_connections(max_connections)
                .build()?,
        )),
    }
}
