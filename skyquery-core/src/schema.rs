//! The fixed NYC flights schema.
//!
//! The same table definitions drive the schema description that goes into
//! every prompt and the DDL used by the dataset importer.

use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Float,
    Int,
    Timestamp,
}

impl ColumnType {
    /// Label used in the prompt's schema description.
    pub fn label(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Float => "float",
            ColumnType::Int => "int",
            ColumnType::Timestamp => "timestamp",
        }
    }

    /// Column type used when creating tables. Accepted by both SQLite and Postgres.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Int => "BIGINT",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub description: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

const fn col(name: &'static str, ty: ColumnType, description: &'static str) -> Column {
    Column {
        name,
        ty,
        description,
    }
}

use ColumnType::{Float, Int, Text, Timestamp};

/// Tables in dependency order: every table only refers to tables listed before it.
pub const FLIGHT_SCHEMA: &[Table] = &[
    Table {
        name: "airlines",
        columns: &[
            col("carrier", Text, "Two letter carrier code"),
            col("name", Text, "Full carrier name"),
        ],
    },
    Table {
        name: "airports",
        columns: &[
            col("faa", Text, "FAA airport code"),
            col("name", Text, "Airport name"),
            col("lat", Float, "Latitude"),
            col("lon", Float, "Longitude"),
            col("alt", Int, "Altitude"),
            col("tz", Int, "Timezone offset"),
            col("dst", Text, "Daylight savings time zone"),
            col("tzone", Text, "IANA time zone"),
        ],
    },
    Table {
        name: "planes",
        columns: &[
            col("tailnum", Text, "Tail number"),
            col("year", Int, "Year manufactured"),
            col("type", Text, "Type of aircraft"),
            col("manufacturer", Text, "Manufacturer"),
            col("model", Text, "Model"),
            col("engines", Int, "Number of engines"),
            col("seats", Int, "Number of seats"),
            col("speed", Int, "Average cruising speed"),
            col("engine", Text, "Engine type"),
        ],
    },
    Table {
        name: "weather",
        columns: &[
            col("origin", Text, "Weather station (FAA code)"),
            col("year", Int, "Year"),
            col("month", Int, "Month"),
            col("day", Int, "Day"),
            col("hour", Int, "Hour"),
            col("temp", Float, "Temperature (F)"),
            col("dewp", Float, "Dew point (F)"),
            col("humid", Float, "Humidity"),
            col("wind_dir", Int, "Wind direction"),
            col("wind_speed", Float, "Wind speed"),
            col("wind_gust", Float, "Wind gust"),
            col("precip", Float, "Precipitation"),
            col("pressure", Float, "Pressure"),
            col("visib", Float, "Visibility"),
            col("time_hour", Timestamp, "Date and hour"),
        ],
    },
    Table {
        name: "flights",
        columns: &[
            col("year", Int, "Year"),
            col("month", Int, "Month"),
            col("day", Int, "Day"),
            col("dep_time", Int, "Departure time"),
            col("sched_dep_time", Int, "Scheduled departure time"),
            col("dep_delay", Float, "Departure delay"),
            col("arr_time", Int, "Arrival time"),
            col("sched_arr_time", Int, "Scheduled arrival time"),
            col("arr_delay", Float, "Arrival delay"),
            col("carrier", Text, "Carrier code"),
            col("flight", Int, "Flight number"),
            col("tailnum", Text, "Tail number"),
            col("origin", Text, "Origin airport"),
            col("dest", Text, "Destination airport"),
            col("air_time", Float, "Air time"),
            col("distance", Float, "Distance"),
            col("hour", Int, "Hour"),
            col("minute", Int, "Minute"),
            col("time_hour", Timestamp, "Date and hour"),
        ],
    },
];

pub fn table(name: &str) -> Option<&'static Table> {
    FLIGHT_SCHEMA.iter().find(|table| table.name == name)
}

/// Human-readable description of [`FLIGHT_SCHEMA`], supplied verbatim to the model.
pub fn schema_context() -> String {
    let mut out = String::from("The database contains the following tables:\n");
    for (index, table) in FLIGHT_SCHEMA.iter().enumerate() {
        let _ = write!(out, "\n{}. {}\n", index + 1, table.name);
        for column in table.columns {
            let _ = writeln!(
                out,
                "   - {} ({}): {}",
                column.name,
                column.ty.label(),
                column.description
            );
        }
    }
    out
}
