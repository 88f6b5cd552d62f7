use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, TypeInfo, ValueRef};
use tracing::Instrument;

use crate::decode::{assemble, float_value, Cell};
use crate::statement::ensure_single_statement;
use crate::{ColumnKind, ExecutionError, ExecutionResult, SqlExecutor};

#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, Clone)]
pub struct SqliteExecutorBuilder {
    database_url: String,
    max_connections: u32,
    create_if_missing: bool,
}

impl SqliteExecutor {
    pub fn builder(database_url: impl Into<String>) -> SqliteExecutorBuilder {
        SqliteExecutorBuilder {
            database_url: database_url.into(),
            max_connections: 5,
            create_if_missing: false,
        }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

impl SqliteExecutorBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    /// Does not touch the database; a missing file surfaces on the first query.
    pub fn build(self) -> Result<SqliteExecutor, ExecutionError> {
        if self.max_connections == 0 {
            return Err(ExecutionError::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        let options = SqliteConnectOptions::from_str(&self.database_url)
            .map_err(|err| ExecutionError::InvalidConfig(err.to_string()))?
            .create_if_missing(self.create_if_missing);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_lazy_with(options);
        Ok(SqliteExecutor { pool })
    }
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, ExecutionError> {
        if sql.trim().is_empty() {
            return Err(ExecutionError::EmptyQuery);
        }
        ensure_single_statement(sql)?;

        let span = tracing::info_span!("sql_execute", backend = "sqlite", row_cap);
        async {
            let rows = sqlx::query(sql)
                .persistent(false)
                .fetch_all(&self.pool)
                .await?;

            let (column_names, declared) = match rows.first() {
                Some(row) => describe_row(row),
                None => describe_statement(&self.pool, sql).await,
            };
            let decoded = rows
                .iter()
                .map(|row| decode_row(row, &declared))
                .collect::<Result<Vec<_>, _>>()?;

            let result = assemble(column_names, declared, decoded, row_cap);
            tracing::debug!(row_count = result.row_count, "query executed");
            Ok::<_, ExecutionError>(result)
        }
        .instrument(span)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "sqlite query failed");
            err
        })
    }
}

fn describe_row(row: &SqliteRow) -> (Vec<String>, Vec<ColumnKind>) {
    row.columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                ColumnKind::from_declared(column.type_info().name()),
            )
        })
        .unzip()
}

/// Column metadata for a query that returned no rows.
async fn describe_statement(
    pool: &sqlx::SqlitePool,
    sql: &str,
) -> (Vec<String>, Vec<ColumnKind>) {
    match pool.describe(sql).await {
        Ok(described) => described
            .columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_string(),
                    ColumnKind::from_declared(column.type_info().name()),
                )
            })
            .unzip(),
        Err(_) => (Vec::new(), Vec::new()),
    }
}

fn decode_row(row: &SqliteRow, declared: &[ColumnKind]) -> Result<Vec<Cell>, ExecutionError> {
    (0..row.len())
        .map(|index| {
            let declared = declared.get(index).copied().unwrap_or(ColumnKind::Null);
            decode_cell(row, index, declared)
        })
        .collect()
}

fn decode_cell(row: &SqliteRow, index: usize, declared: ColumnKind) -> Result<Cell, ExecutionError> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Cell::null());
    }
    // Storage class of this value, not the declared column type.
    let storage = raw.type_info().into_owned();
    let decode_err = |err: sqlx::Error| ExecutionError::Decode {
        column: row.columns()[index].name().to_string(),
        reason: err.to_string(),
    };

    let cell = match storage.name() {
        "INTEGER" if declared == ColumnKind::Boolean => {
            let value: bool = row.try_get_unchecked(index).map_err(decode_err)?;
            Cell::new(Value::Bool(value), ColumnKind::Boolean)
        }
        "INTEGER" => {
            let value: i64 = row.try_get_unchecked(index).map_err(decode_err)?;
            Cell::new(Value::from(value), ColumnKind::Integer)
        }
        "REAL" | "NUMERIC" => {
            let value: f64 = row.try_get_unchecked(index).map_err(decode_err)?;
            Cell::new(float_value(value), ColumnKind::Float)
        }
        "BLOB" => {
            let value: Vec<u8> = row.try_get_unchecked(index).map_err(decode_err)?;
            Cell::new(
                Value::String(String::from_utf8_lossy(&value).into_owned()),
                ColumnKind::Text,
            )
        }
        _ => {
            let value: String = row.try_get_unchecked(index).map_err(decode_err)?;
            // SQLite keeps dates as text; trust the declared type for the label.
            let kind = if declared.is_temporal() {
                declared
            } else {
                ColumnKind::Text
            };
            Cell::new(Value::String(value), kind)
        }
    };
    Ok(cell)
}
