use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, TypeInfo};
use tracing::Instrument;

use crate::decode::{assemble, float_value, Cell};
use crate::statement::ensure_single_statement;
use crate::{ColumnKind, ExecutionError, ExecutionResult, SqlExecutor};

#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    pool: sqlx::PgPool,
}

#[derive(Debug, Clone)]
pub struct PostgresExecutorBuilder {
    database_url: String,
    max_connections: u32,
    min_connections: u32,
    acquire_timeout: Duration,
}

impl PostgresExecutor {
    pub fn builder(database_url: impl Into<String>) -> PostgresExecutorBuilder {
        PostgresExecutorBuilder {
            database_url: database_url.into(),
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(10),
        }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

impl PostgresExecutorBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn min_connections(mut self, min_connections: u32) -> Self {
        self.min_connections = min_connections;
        self
    }

    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Parses the URL only; an unreachable server surfaces on the first query.
    pub fn build(self) -> Result<PostgresExecutor, ExecutionError> {
        if self.max_connections == 0 {
            return Err(ExecutionError::InvalidConfig(
                "max_connections must be greater than 0".to_string(),
            ));
        }
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy(&self.database_url)
            .map_err(|err| ExecutionError::InvalidConfig(err.to_string()))?;
        Ok(PostgresExecutor { pool })
    }
}

#[async_trait]
impl SqlExecutor for PostgresExecutor {
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, ExecutionError> {
        if sql.trim().is_empty() {
            return Err(ExecutionError::EmptyQuery);
        }
        ensure_single_statement(sql)?;

        let span = tracing::info_span!("sql_execute", backend = "postgres", row_cap);
        async {
            let rows = sqlx::query(sql)
                .persistent(false)
                .fetch_all(&self.pool)
                .await?;

            let (column_names, declared) = match rows.first() {
                Some(row) => row
                    .columns()
                    .iter()
                    .map(|column| {
                        (
                            column.name().to_string(),
                            ColumnKind::from_declared(column.type_info().name()),
                        )
                    })
                    .unzip(),
                None => describe_statement(&self.pool, sql).await,
            };
            let decoded = rows
                .iter()
                .map(decode_row)
                .collect::<Result<Vec<_>, _>>()?;

            let result = assemble(column_names, declared, decoded, row_cap);
            tracing::debug!(row_count = result.row_count, "query executed");
            Ok::<_, ExecutionError>(result)
        }
        .instrument(span)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "postgres query failed");
            err
        })
    }
}

async fn describe_statement(pool: &sqlx::PgPool, sql: &str) -> (Vec<String>, Vec<ColumnKind>) {
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

fn decode_row(row: &PgRow) -> Result<Vec<Cell>, ExecutionError> {
    row.columns()
        .iter()
        .map(|column| {
            decode_cell(row, column.ordinal(), column.type_info().name()).map_err(|err| {
                ExecutionError::Decode {
                    column: column.name().to_string(),
                    reason: err.to_string(),
                }
            })
        })
        .collect()
}

fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> Result<Cell, sqlx::Error> {
    let cell = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)?
            .map(|value| Cell::new(Value::Bool(value), ColumnKind::Boolean)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|value| Cell::new(Value::from(value), ColumnKind::Integer)),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|value| Cell::new(Value::from(value), ColumnKind::Integer)),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)?
            .map(|value| Cell::new(Value::from(value), ColumnKind::Integer)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|value| Cell::new(float_value(f64::from(value)), ColumnKind::Float)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)?
            .map(|value| Cell::new(float_value(value), ColumnKind::Float)),
        // CAST(x AS decimal(p, s)) lands here; callers want plain numbers.
        "NUMERIC" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(index)?
            .map(|value| match value.to_f64() {
                Some(number) => Cell::new(float_value(number), ColumnKind::Float),
                None => Cell::new(Value::String(value.to_string()), ColumnKind::Text),
            }),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(|value| {
                Cell::new(
                    Value::String(value.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    ColumnKind::Timestamp,
                )
            }),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(|value| Cell::new(Value::String(value.to_rfc3339()), ColumnKind::Timestamp)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|value| Cell::new(Value::String(value.to_string()), ColumnKind::Date)),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)?
            .map(|value| Cell::new(Value::String(value.to_string()), ColumnKind::Text)),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)?
            .map(|value| Cell::new(value, ColumnKind::Text)),
        // MAX(time_hour) - MIN(time_hour) and friends.
        "INTERVAL" => row
            .try_get::<Option<PgInterval>, _>(index)?
            .map(|value| Cell::new(Value::String(interval_iso8601(&value)), ColumnKind::Text)),
        "UUID" => row
            .try_get::<Option<sqlx::types::Uuid>, _>(index)?
            .map(|value| Cell::new(Value::String(value.to_string()), ColumnKind::Text)),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "UNKNOWN" | "CITEXT" | "citext" => row
            .try_get::<Option<String>, _>(index)?
            .map(|value| Cell::new(Value::String(value), ColumnKind::Text)),
        // Values arrive in binary form; reading unknown types as text yields garbage.
        other => {
            return Err(sqlx::Error::Decode(
                format!("unsupported column type {other}").into(),
            ))
        }
    };
    Ok(cell.unwrap_or_else(Cell::null))
}

/// Formats an interval as an ISO-8601 duration, e.g. `P1Y2M3DT4H5M6.5S`.
pub(crate) fn interval_iso8601(interval: &PgInterval) -> String {
    const MICROS_PER_SECOND: i64 = 1_000_000;
    const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
    const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

    let mut out = String::from("P");
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        out.push_str(&format!("{years}Y"));
    }
    if months != 0 {
        out.push_str(&format!("{months}M"));
    }
    if interval.days != 0 {
        out.push_str(&format!("{}D", interval.days));
    }

    let micros = interval.microseconds;
    if micros != 0 {
        out.push('T');
        let hours = micros / MICROS_PER_HOUR;
        let minutes = (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
        let rest = micros % MICROS_PER_MINUTE;
        if hours != 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes != 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if rest != 0 {
            let sign = if rest < 0 { "-" } else { "" };
            let rest = rest.unsigned_abs();
            let seconds = rest / 1_000_000;
            let fraction = rest % 1_000_000;
            if fraction == 0 {
                out.push_str(&format!("{sign}{seconds}S"));
            } else {
                let fraction = format!("{fraction:06}");
                out.push_str(&format!("{sign}{seconds}.{}S", fraction.trim_end_matches('0')));
            }
        }
    }

    if out == "P" {
        out.push_str("T0S");
    }
    out
}
