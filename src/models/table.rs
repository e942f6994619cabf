//! Tabular data model
//! Worksheet contents held in memory between decode, cleaning and upload

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::utils::constants::DATETIME_FORMAT;

/// A single worksheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Missing value
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// JSON value for BigQuery rows (`None` for missing values)
    pub fn to_json(&self) -> Option<Value> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(b) => Some(Value::Bool(*b)),
            CellValue::Int(i) => Some(Value::from(*i)),
            // NaN and infinities have no JSON form
            CellValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            CellValue::String(s) => Some(Value::String(s.clone())),
            CellValue::DateTime(dt) => Some(Value::String(dt.format(DATETIME_FORMAT).to_string())),
        }
    }

    /// JSON value for a Sheets grid; missing values become empty strings
    pub fn to_sheet_value(&self) -> Value {
        self.to_json().unwrap_or_else(|| Value::String(String::new()))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

/// Header plus data rows of one worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn row_is_empty(row: &[CellValue]) -> bool {
        row.iter().all(CellValue::is_empty)
    }

    /// Remove rows where every cell is missing. Returns the number removed.
    pub fn drop_empty_rows(&mut self) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| !Self::row_is_empty(row));
        before - self.rows.len()
    }

    /// Column names made valid for BigQuery field names.
    ///
    /// Names are unique ignoring case; a clash takes the first free `_n` suffix.
    pub fn bigquery_field_names(&self) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::new();
        self.columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut field: String = name
                    .trim()
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                    .collect();
                if field.is_empty() || field.chars().all(|c| c == '_') {
                    field = format!("column_{}", i);
                } else if field.starts_with(|c: char| c.is_ascii_digit()) {
                    field.insert(0, '_');
                }

                if taken.contains(&field.to_lowercase()) {
                    let base = field;
                    let mut n = 1;
                    field = loop {
                        let candidate = format!("{}_{}", base, n);
                        if !taken.contains(&candidate.to_lowercase()) {
                            break candidate;
                        }
                        n += 1;
                    };
                }
                taken.insert(field.to_lowercase());
                field
            })
            .collect()
    }

    /// Newline-delimited JSON, one object per row
    pub fn to_ndjson(&self) -> String {
        let fields = self.bigquery_field_names();
        let mut out = String::new();
        for row in &self.rows {
            let mut object = Map::new();
            for (field, cell) in fields.iter().zip(row.iter()) {
                if let Some(value) = cell.to_json() {
                    object.insert(field.clone(), value);
                }
            }
            out.push_str(&Value::Object(object).to_string());
            out.push('\n');
        }
        out
    }

    /// Header row followed by data rows
    pub fn to_sheet_values(&self) -> Vec<Vec<Value>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(self.columns.iter().cloned().map(Value::String).collect());
        values.extend(
            self.rows
                .iter()
                .map(|row| row.iter().map(CellValue::to_sheet_value).collect()),
        );
        values
    }
}
