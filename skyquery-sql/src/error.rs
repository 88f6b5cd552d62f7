use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("No SQL query provided")]
    EmptyQuery,
    /// Driver message, unmodified.
    #[error("{0}")]
    Database(String),
    #[error("failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err.as_database_error() {
            Some(db_err) => ExecutionError::Database(db_err.message().to_string()),
            None => ExecutionError::Database(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{table}.{column} row {line}: cannot parse '{value}' as {expected}")]
    InvalidValue {
        table: String,
        column: String,
        line: u64,
        value: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ExecutionError),
}
