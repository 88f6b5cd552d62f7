use serde::Serialize;

/// Type label reported for a result column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Date,
    Null,
}

impl ColumnKind {
    pub fn label(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Date => "date",
            ColumnKind::Null => "null",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnKind::Timestamp | ColumnKind::Date)
    }

    /// Maps a declared column type name (SQLite affinity or Postgres type) to a label.
    pub fn from_declared(type_name: &str) -> Self {
        let name = type_name.trim().to_ascii_uppercase();
        match name.as_str() {
            "" | "NULL" => ColumnKind::Null,
            "INT" | "INT2" | "INT4" | "INT8" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT"
            | "MEDIUMINT" => ColumnKind::Integer,
            "BOOL" | "BOOLEAN" => ColumnKind::Boolean,
            "DATE" => ColumnKind::Date,
            _ if name.starts_with("TIMESTAMP") || name == "DATETIME" => ColumnKind::Timestamp,
            _ if name.starts_with("REAL")
                || name.starts_with("FLOAT")
                || name.starts_with("DOUBLE")
                || name.starts_with("NUMERIC")
                || name.starts_with("DECIMAL") =>
            {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }

    /// Folds the kind of the next observed value into the column's kind.
    /// Integer and float widen to float; any other disagreement is text.
    pub(crate) fn merge(self, next: ColumnKind) -> ColumnKind {
        match (self, next) {
            (ColumnKind::Null, next) => next,
            (current, ColumnKind::Null) => current,
            (current, next) if current == next => current,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}
