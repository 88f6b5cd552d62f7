use std::collections::HashSet;

use serde_json::Value;

use crate::{ColumnInfo, ColumnKind, ExecutionResult, Row};

/// One decoded value together with the kind observed for it.
pub(crate) struct Cell {
    pub value: Value,
    pub kind: ColumnKind,
}

impl Cell {
    pub fn null() -> Self {
        Self {
            value: Value::Null,
            kind: ColumnKind::Null,
        }
    }

    pub fn new(value: Value, kind: ColumnKind) -> Self {
        if value.is_null() {
            return Self::null();
        }
        Self { value, kind }
    }
}

/// Builds the result from fully decoded rows: column kinds are inferred from
/// every row, only the first `row_cap` rows are kept. Repeated column names
/// get a `_2`, `_3`... suffix so every column keeps its own row key.
pub(crate) fn assemble(
    column_names: Vec<String>,
    declared: Vec<ColumnKind>,
    decoded: Vec<Vec<Cell>>,
    row_cap: usize,
) -> ExecutionResult {
    let column_names = unique_names(column_names);
    let row_count = decoded.len();
    let mut observed = vec![ColumnKind::Null; column_names.len()];
    let mut rows = Vec::with_capacity(row_count.min(row_cap));

    for (index, cells) in decoded.into_iter().enumerate() {
        for (slot, cell) in observed.iter_mut().zip(cells.iter()) {
            if cell.kind != ColumnKind::Null {
                *slot = slot.merge(cell.kind);
            }
        }
        if index < row_cap {
            let row: Row = column_names
                .iter()
                .cloned()
                .zip(cells.into_iter().map(|cell| cell.value))
                .collect();
            rows.push(row);
        }
    }

    let columns = column_names
        .iter()
        .zip(observed.into_iter().zip(declared))
        .map(|(name, (seen, declared))| ColumnInfo {
            name: name.clone(),
            kind: if seen == ColumnKind::Null { declared } else { seen },
        })
        .collect();

    ExecutionResult {
        rows,
        column_names,
        columns,
        row_count,
    }
}

fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.clone()) {
                return name;
            }
            let mut suffix = 2;
            loop {
                let candidate = format!("{name}_{suffix}");
                if seen.insert(candidate.clone()) {
                    return candidate;
                }
                suffix += 1;
            }
        })
        .collect()
}

pub(crate) fn float_value(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
