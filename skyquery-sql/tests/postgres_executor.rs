use std::time::Duration;

use serde_json::json;
use skyquery_sql::{ColumnKind, ExecutionError, PostgresExecutor, SqlExecutor};

fn postgres_database_url() -> String {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .expect("set DATABASE_URL to run postgres integration tests")
}

fn executor() -> PostgresExecutor {
    PostgresExecutor::builder(postgres_database_url())
        .max_connections(1)
        .build()
        .expect("postgres executor should build")
}

#[tokio::test]
async fn builder_accepts_pool_configuration_without_connecting() {
    let executor = PostgresExecutor::builder("postgres://localhost/flights")
        .max_connections(2)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(1))
        .build();

    assert!(executor.is_ok());
}

#[test]
fn builder_rejects_an_empty_pool() {
    let err = PostgresExecutor::builder("postgres://localhost/flights")
        .max_connections(0)
        .build()
        .unwrap_err();

    assert!(matches!(err, ExecutionError::InvalidConfig(_)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn numeric_and_temporal_values_decode_to_json() {
    let result = executor()
        .execute(
            "SELECT CAST(12.345 AS decimal(10,2)) AS avg_delay, \
                    date_part('month', TIMESTAMP '2013-07-04 09:30:00') AS month, \
                    TIMESTAMP '2013-07-04 09:30:00' AS time_hour, \
                    DATE '2013-07-04' AS day, \
                    TIMESTAMP '2013-07-04 09:30:00' - TIMESTAMP '2013-07-01 08:00:00' AS span, \
                    'JFK'::text AS origin",
            10,
        )
        .await
        .expect("query should run");

    let row = &result.rows[0];
    assert!((row["avg_delay"].as_f64().unwrap() - 12.35).abs() < 1e-9);
    assert_eq!(row["month"].as_f64(), Some(7.0));
    assert_eq!(row["time_hour"], "2013-07-04T09:30:00");
    assert_eq!(row["day"], "2013-07-04");
    assert_eq!(row["span"], "P3DT1H30M");
    assert_eq!(row["origin"], "JFK");

    let kinds: Vec<_> = result.columns.iter().map(|column| column.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ColumnKind::Float,
            ColumnKind::Float,
            ColumnKind::Timestamp,
            ColumnKind::Date,
            ColumnKind::Text,
            ColumnKind::Text,
        ]
    );
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn rows_are_capped_but_fully_counted() {
    let result = executor()
        .execute("SELECT g AS n FROM generate_series(1, 150) AS g", 100)
        .await
        .expect("query should run");

    assert_eq!(result.row_count, 150);
    assert_eq!(result.rows.len(), 100);
    assert_eq!(result.rows[99]["n"], json!(100));
    assert_eq!(result.columns[0].kind, ColumnKind::Integer);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn empty_result_still_names_its_columns() {
    let result = executor()
        .execute(
            "SELECT carrier, dep_delay FROM (VALUES ('UA', 1.5)) AS f(carrier, dep_delay) WHERE false",
            10,
        )
        .await
        .expect("query should run");

    assert_eq!(result.row_count, 0);
    assert!(result.rows.is_empty());
    assert_eq!(result.column_names, vec!["carrier", "dep_delay"]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn driver_message_is_passed_through() {
    let err = executor()
        .execute("SELECT foo FROM (VALUES (1)) AS t(x)", 10)
        .await
        .unwrap_err();

    assert_eq!(err, ExecutionError::Database("column \"foo\" does not exist".to_string()));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn unsupported_types_fail_with_a_named_decode_error() {
    let err = executor()
        .execute("SELECT ARRAY[1, 2] AS xs", 10)
        .await
        .unwrap_err();

    match err {
        ExecutionError::Decode { column, reason } => {
            assert_eq!(column, "xs");
            assert!(reason.contains("unsupported column type"), "{reason}");
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn multiple_statements_are_refused_before_connecting() {
    let executor = PostgresExecutor::builder("postgres://localhost:1/flights")
        .max_connections(1)
        .build()
        .expect("lazy pool builds");

    let err = executor
        .execute("SELECT 1; SELECT 2", 10)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecutionError::Database(ref message) if message.contains("multiple statements")));
}
