//! Loads the nycflights13 CSV export into a fresh set of tables.

use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use skyquery_core::schema::{Table, FLIGHT_SCHEMA};
use skyquery_core::ColumnType;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Database, Pool};

use crate::{Backend, ImportError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableImport {
    pub table: &'static str,
    pub rows: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub tables: Vec<TableImport>,
}

impl ImportReport {
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|table| table.rows).sum()
    }
}

/// Drops and recreates every flight table at `database_url`, then loads
/// `<table>.csv` files from `data_dir`.
pub async fn import_dataset(
    database_url: &str,
    data_dir: &Path,
) -> Result<ImportReport, ImportError> {
    match Backend::from_url(database_url)? {
        Backend::Sqlite => {
            let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;
            import_into(&pool, Backend::Sqlite, data_dir).await
        }
        Backend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(1)
                .connect(database_url)
                .await?;
            import_into(&pool, Backend::Postgres, data_dir).await
        }
    }
}

pub async fn import_into<DB>(
    pool: &Pool<DB>,
    backend: Backend,
    data_dir: &Path,
) -> Result<ImportReport, ImportError>
where
    DB: Database,
    for<'q> Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> Option<i64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> Option<f64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    for<'c> &'c Pool<DB>: sqlx::Executor<'c, Database = DB>,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    for statement in drop_statements(backend) {
        sqlx::query::<DB>(&statement).execute(pool).await?;
    }

    let mut report = ImportReport::default();
    for table in FLIGHT_SCHEMA {
        sqlx::query::<DB>(&create_table_sql(table))
            .execute(pool)
            .await?;
        let path = data_dir.join(format!("{}.csv", table.name));
        let rows = load_table(pool, backend, table, &path).await?;
        tracing::info!(table = table.name, rows, "table loaded");
        report.tables.push(TableImport {
            table: table.name,
            rows,
        });
    }
    Ok(report)
}

/// Reverse dependency order, so referencing tables go first.
pub fn drop_statements(backend: Backend) -> Vec<String> {
    let cascade = match backend {
        Backend::Postgres => " CASCADE",
        Backend::Sqlite => "",
    };
    FLIGHT_SCHEMA
        .iter()
        .rev()
        .map(|table| format!("DROP TABLE IF EXISTS {}{cascade}", table.name))
        .collect()
}

pub fn create_table_sql(table: &Table) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|column| format!("{} {}", column.name, column.ty.sql_type()))
        .collect();
    format!("CREATE TABLE {} ({})", table.name, columns.join(", "))
}

pub fn insert_sql(table: &Table, backend: Backend) -> String {
    let names: Vec<&str> = table.columns.iter().map(|column| column.name).collect();
    let placeholders: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| match (column.ty, backend) {
            (ColumnType::Timestamp, Backend::Postgres) => {
                format!("CAST(${} AS TIMESTAMP)", index + 1)
            }
            _ => format!("${}", index + 1),
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name,
        names.join(", "),
        placeholders.join(", ")
    )
}

#[derive(Clone, Debug, PartialEq)]
enum Bound {
    Text(Option<String>),
    Int(Option<i64>),
    Float(Option<f64>),
}

async fn load_table<DB>(
    pool: &Pool<DB>,
    backend: Backend,
    table: &Table,
    path: &Path,
) -> Result<u64, ImportError>
where
    DB: Database,
    for<'q> Option<String>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> Option<i64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> Option<f64>: sqlx::Encode<'q, DB> + sqlx::Type<DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
{
    let csv_error = |source: csv::Error| ImportError::Csv {
        path: path.display().to_string(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();
    // Schema columns missing from the file load as NULL; extra file columns are ignored.
    let positions: Vec<Option<usize>> = table
        .columns
        .iter()
        .map(|column| headers.iter().position(|header| header.trim() == column.name))
        .collect();

    let statement = insert_sql(table, backend);
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let line = record.position().map(|pos| pos.line()).unwrap_or(0);

        let mut query = sqlx::query::<DB>(&statement);
        for (column, position) in table.columns.iter().zip(&positions) {
            let raw = position.and_then(|index| record.get(index));
            let bound = parse_cell(raw, column.ty).map_err(|expected| {
                ImportError::InvalidValue {
                    table: table.name.to_string(),
                    column: column.name.to_string(),
                    line,
                    value: raw.unwrap_or_default().to_string(),
                    expected,
                }
            })?;
            query = match bound {
                Bound::Text(value) => query.bind(value),
                Bound::Int(value) => query.bind(value),
                Bound::Float(value) => query.bind(value),
            };
        }
        query.execute(&mut *tx).await?;
        inserted += 1;
    }

    tx.commit().await?;
    Ok(inserted)
}

fn parse_cell(raw: Option<&str>, ty: ColumnType) -> Result<Bound, &'static str> {
    let value = raw
        .map(str::trim)
        .filter(|value| !value.is_empty() && *value != "NA");

    match ty {
        ColumnType::Text | ColumnType::Timestamp => Ok(Bound::Text(value.map(str::to_string))),
        ColumnType::Float => value
            .map(|value| value.parse::<f64>().map_err(|_| "float"))
            .transpose()
            .map(Bound::Float),
        ColumnType::Int => value
            .map(parse_integer)
            .transpose()
            .map(Bound::Int),
    }
}

/// Accepts "517" as well as "517.0", which some CSV exports write for integer columns.
fn parse_integer(value: &str) -> Result<i64, &'static str> {
    if let Ok(parsed) = value.parse::<i64>() {
        return Ok(parsed);
    }
    match value.parse::<f64>() {
        Ok(parsed) if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 => Ok(parsed as i64),
        _ => Err("integer"),
    }
}
