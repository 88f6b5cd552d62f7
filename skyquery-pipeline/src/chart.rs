//! Picks a chart for a result set from its column kinds and values.

use serde::Serialize;
use skyquery_sql::{ColumnInfo, ColumnKind, Row};

const TEMPORAL_NAMES: [&str; 6] = ["year", "month", "day", "hour", "date", "time_hour"];
const SHARE_WORDS: [&str; 5] = ["share", "proportion", "percentage", "percent", "breakdown"];
const PIE_MAX_SLICES: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Scatter,
    Histogram,
    Table,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    pub title: String,
}

impl ChartSpec {
    fn plot(kind: ChartKind, x: &str, y: &str, title: String) -> Self {
        Self {
            kind,
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            title,
        }
    }
}

fn is_temporal(column: &ColumnInfo) -> bool {
    column.kind.is_temporal() || TEMPORAL_NAMES.contains(&column.name.to_ascii_lowercase().as_str())
}

/// `None` only when there is nothing to draw.
pub fn suggest_chart(query: &str, columns: &[ColumnInfo], rows: &[Row]) -> Option<ChartSpec> {
    if rows.is_empty() || columns.is_empty() {
        return None;
    }

    let temporal = columns.iter().find(|column| is_temporal(column));
    let numeric: Vec<&ColumnInfo> = columns
        .iter()
        .filter(|column| column.kind.is_numeric() && !is_temporal(column))
        .collect();
    let text = columns
        .iter()
        .find(|column| column.kind == ColumnKind::Text && !is_temporal(column));

    let spec = match (temporal, text, numeric.as_slice()) {
        (Some(x), _, [y, ..]) => ChartSpec::plot(
            ChartKind::Line,
            &x.name,
            &y.name,
            format!("{} over {}", y.name, x.name),
        ),
        (None, Some(x), [y, ..]) => {
            let kind = if wants_share(query) && fits_pie(rows, &y.name) {
                ChartKind::Pie
            } else {
                ChartKind::Bar
            };
            ChartSpec::plot(kind, &x.name, &y.name, format!("{} by {}", y.name, x.name))
        }
        (None, None, [x, y, ..]) => ChartSpec::plot(
            ChartKind::Scatter,
            &x.name,
            &y.name,
            format!("{} vs {}", y.name, x.name),
        ),
        (None, None, [x]) => ChartSpec {
            kind: ChartKind::Histogram,
            x: Some(x.name.clone()),
            y: None,
            title: format!("Distribution of {}", x.name),
        },
        _ => ChartSpec {
            kind: ChartKind::Table,
            x: None,
            y: None,
            title: "Query results".to_string(),
        },
    };
    Some(spec)
}

fn wants_share(query: &str) -> bool {
    let query = query.to_ascii_lowercase();
    SHARE_WORDS.iter().any(|word| query.contains(word))
}

fn fits_pie(rows: &[Row], value_column: &str) -> bool {
    rows.len() <= PIE_MAX_SLICES
        && rows.iter().all(|row| {
            row.get(value_column)
                .and_then(|value| value.as_f64())
                .map(|value| value >= 0.0)
                .unwrap_or(false)
        })
}
