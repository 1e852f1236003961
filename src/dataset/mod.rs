//! Raw tabular data model
//!
//! A [`Dataset`] is an ordered list of named [`Column`]s holding raw [`Value`]s
//! exactly as they were read. Nothing here interprets types; that is the job of
//! the schema module.

mod loader;

pub use loader::{DatasetLoader, LoadedDataset};

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AutoMlError, Result};
use crate::thresholds::NULL_TOKENS;

/// A single raw cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    /// Build a value from a raw text cell, mapping null tokens to `Null`
    pub fn from_raw(raw: &str) -> Self {
        if is_null_token(raw) {
            Value::Null
        } else {
            Value::Text(raw.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(n) => n.is_nan(),
            Value::Text(s) => is_null_token(s),
            Value::Bool(_) => false,
        }
    }

    /// Numeric reading of the value: numbers as-is, text that parses as a finite float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Canonical key used for distinct counting and category vocabularies
    pub fn key(&self) -> Option<ValueKey> {
        if self.is_null() {
            return None;
        }
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(ValueKey::Bool(*b)),
            // -0.0 and 0.0 count as one value
            Value::Number(n) => Some(ValueKey::Number((*n + 0.0).to_bits())),
            Value::Text(s) => Some(ValueKey::Text(s.clone())),
        }
    }

    /// Display form used in reports and category vocabularies
    pub fn as_label(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Approximate in-memory footprint of the cell
    pub fn estimated_bytes(&self) -> usize {
        match self {
            Value::Null | Value::Number(_) => 8,
            Value::Bool(_) => 1,
            Value::Text(s) => s.len() + 24,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Hashable, ordered identity of a non-null value
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKey {
    Bool(bool),
    Number(u64),
    Text(String),
}

pub(crate) fn is_null_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// A named column of raw values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Non-null values in row order
    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_null())
    }

    /// Number of distinct non-null values
    pub fn unique_count(&self) -> usize {
        self.values
            .iter()
            .filter_map(Value::key)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// An immutable, rectangular table of raw values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset, checking that every column has the same length and a unique name
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = BTreeSet::new();
        for column in &columns {
            if column.len() != n_rows {
                return Err(AutoMlError::InvalidFormat(format!(
                    "column '{}' has {} values, expected {}",
                    column.name,
                    column.len(),
                    n_rows
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(AutoMlError::InvalidFormat(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Convenience constructor from (name, values) pairs
    pub fn from_columns<N, I>(columns: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Value>)>,
    {
        Self::new(
            columns
                .into_iter()
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0 || self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Fail with `EmptyDataset` when there are no rows or no columns
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(AutoMlError::EmptyDataset("no columns".to_string()));
        }
        if self.n_rows == 0 {
            return Err(AutoMlError::EmptyDataset("no rows".to_string()));
        }
        Ok(())
    }

    /// Number of rows that repeat an earlier row exactly
    pub fn duplicate_row_count(&self) -> usize {
        let mut seen = std::collections::HashSet::with_capacity(self.n_rows);
        (0..self.n_rows)
            .filter(|&i| {
                let row: Vec<Option<ValueKey>> =
                    self.columns.iter().map(|c| c.values[i].key()).collect();
                !seen.insert(row)
            })
            .count()
    }

    /// Approximate memory footprint of all cells
    pub fn estimated_memory_bytes(&self) -> usize {
        self.columns
            .iter()
            .flat_map(|c| c.values.iter())
            .map(Value::estimated_bytes)
            .sum()
    }
}
