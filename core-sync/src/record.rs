//! Row projection: sheet cells → typed destination record.

use crate::mapping::ColumnMapping;
use bridge_traits::database::{ColumnInfo, FieldValue, TableRecord};
use bridge_traits::sheets::SheetValues;
use thiserror::Error;

/// Storage class a declared column type resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Integer,
    Real,
    Boolean,
    Text,
}

impl Affinity {
    /// Resolve a declared SQL type name, following SQLite's affinity rules
    /// with booleans split out.
    pub fn of(declared: &str) -> Self {
        let t = declared.to_ascii_uppercase();
        if t.contains("BOOL") {
            Affinity::Boolean
        } else if t.contains("INT") {
            Affinity::Integer
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
            Affinity::Text
        } else if t.contains("REAL")
            || t.contains("FLOA")
            || t.contains("DOUB")
            || t.contains("NUMERIC")
            || t.contains("DECIMAL")
        {
            Affinity::Real
        } else {
            Affinity::Text
        }
    }
}

/// A cell that could not be converted to its column's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("type mismatch in column '{column}': expected {expected}, got {value:?}")]
pub struct ProjectionError {
    pub column: String,
    pub expected: &'static str,
    pub value: String,
}

/// Convert one cell. Blank cells become `NULL`.
pub fn coerce(cell: &str, column: &ColumnInfo) -> Result<FieldValue, ProjectionError> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(FieldValue::Null);
    }

    let mismatch = |expected: &'static str| ProjectionError {
        column: column.name.clone(),
        expected,
        value: cell.to_string(),
    };

    match Affinity::of(&column.data_type) {
        Affinity::Text => Ok(FieldValue::Text(trimmed.to_string())),
        Affinity::Integer => {
            let digits = strip_grouping(trimmed);
            if let Ok(i) = digits.parse::<i64>() {
                return Ok(FieldValue::Integer(i));
            }
            match digits.parse::<f64>() {
                Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(FieldValue::Integer(f as i64))
                }
                _ => Err(mismatch("integer")),
            }
        }
        Affinity::Real => strip_grouping(trimmed)
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(FieldValue::Real)
            .ok_or_else(|| mismatch("number")),
        Affinity::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" | "o" | "on" => Ok(FieldValue::Bool(true)),
            "false" | "f" | "no" | "n" | "0" | "x" | "off" => Ok(FieldValue::Bool(false)),
            _ => Err(mismatch("boolean")),
        },
    }
}

/// Drop digit grouping and a trailing 원 suffix.
fn strip_grouping(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect::<String>()
        .trim_end_matches('원')
        .to_string()
}

/// Precomputed (destination column, header position) pairs for a mapping.
#[derive(Debug, Clone)]
pub struct RowProjector {
    plan: Vec<(ColumnInfo, usize)>,
}

impl RowProjector {
    /// Build a projector for `mapping` against the sheet header and the
    /// destination columns. Entries that do not resolve on both sides are
    /// skipped; run [`check_mapping`](crate::mapping::check_mapping) first to
    /// report them.
    pub fn new(mapping: &ColumnMapping, values: &SheetValues, columns: &[ColumnInfo]) -> Self {
        let plan = columns
            .iter()
            .filter_map(|column| {
                let source = mapping.get(&column.name)?;
                let index = values.column_index(source)?;
                Some((column.clone(), index))
            })
            .collect();
        Self { plan }
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }

    /// Destination columns this projector writes.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.plan.iter().map(|(c, _)| c.name.as_str())
    }

    /// Project one sheet row. Cells past the end of a short row are blank.
    pub fn project(&self, row: &[String]) -> Result<TableRecord, ProjectionError> {
        let mut record = TableRecord::new();
        for (column, index) in &self.plan {
            let cell = row.get(*index).map(String::as_str).unwrap_or("");
            record.insert(column.name.clone(), coerce(cell, column)?);
        }
        Ok(record)
    }
}
