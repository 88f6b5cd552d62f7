use skyquery_core::schema::{table, ColumnType, FLIGHT_SCHEMA};
use skyquery_core::schema_context;

#[test]
fn schema_lists_tables_in_dependency_order() {
    let names: Vec<_> = FLIGHT_SCHEMA.iter().map(|table| table.name).collect();
    assert_eq!(names, vec!["airlines", "airports", "planes", "weather", "flights"]);
}

#[test]
fn flights_table_has_time_hour_timestamp() {
    let flights = table("flights").unwrap();
    assert_eq!(flights.columns.len(), 19);
    assert_eq!(flights.column("time_hour").unwrap().ty, ColumnType::Timestamp);
    assert_eq!(flights.column("dep_delay").unwrap().ty, ColumnType::Float);
    assert!(flights.column("missing").is_none());
}

#[test]
fn schema_context_describes_every_column() {
    let context = schema_context();
    assert!(context.starts_with("The database contains the following tables:"));
    assert!(context.contains("1. airlines\n   - carrier (text): Two letter carrier code"));
    assert!(context.contains("5. flights"));
    assert!(context.contains("   - time_hour (timestamp): Date and hour"));
    let column_lines = context.lines().filter(|line| line.starts_with("   - ")).count();
    let expected: usize = FLIGHT_SCHEMA.iter().map(|table| table.columns.len()).sum();
    assert_eq!(column_lines, expected);
}

#[test]
fn column_types_map_to_portable_ddl() {
    assert_eq!(ColumnType::Float.sql_type(), "DOUBLE PRECISION");
    assert_eq!(ColumnType::Int.sql_type(), "BIGINT");
    assert_eq!(ColumnType::Timestamp.label(), "timestamp");
}
