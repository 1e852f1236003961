//! Column type inference
//!
//! Each column is classified once into a [`ColumnType`]; everything downstream
//! matches on that variant rather than probing raw values again.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Column, Dataset, Value, ValueKey};
use crate::error::{AutoMlError, Result};
use crate::thresholds::{
    BOOLEAN_LEXICON, DATETIME_FORMATS, DATETIME_PARSE_RATIO, HIGH_CARDINALITY_RATIO,
    NUMERIC_PARSE_RATIO, SAMPLE_VALUES_LIMIT, SCHEMA_SAMPLE_SIZE,
};

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numerical,
    Categorical,
    Datetime,
    Boolean,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numerical => write!(f, "numerical"),
            ColumnType::Categorical => write!(f, "categorical"),
            ColumnType::Datetime => write!(f, "datetime"),
            ColumnType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Inferred description of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub inferred_type: ColumnType,
    /// Distinct non-null values
    pub unique_count: usize,
    pub null_count: usize,
    /// null_count / row_count, before any imputation
    pub null_percentage: f64,
    pub is_high_cardinality: bool,
    /// unique_count <= 1
    pub is_constant: bool,
    /// Every value is null
    pub is_empty: bool,
    /// First few non-null values, as text
    pub sample_values: Vec<String>,
}

/// Ordered column schemas for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub row_count: usize,
    pub columns: Vec<ColumnSchema>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column or fail with `UnknownColumn`
    pub fn require(&self, name: &str) -> Result<&ColumnSchema> {
        self.get(name)
            .ok_or_else(|| AutoMlError::UnknownColumn(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names_of(&self, ty: ColumnType) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.inferred_type == ty)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Classifies columns from their raw values
#[derive(Debug, Clone, Default)]
pub struct SchemaInferencer;

impl SchemaInferencer {
    pub fn new() -> Self {
        Self
    }

    /// Infer the schema of every column, in dataset order
    pub fn infer(&self, dataset: &Dataset) -> Result<Schema> {
        dataset.ensure_not_empty()?;
        let row_count = dataset.n_rows();

        let columns: Vec<ColumnSchema> = dataset
            .columns()
            .par_iter()
            .map(|column| self.infer_column(column, row_count))
            .collect();

        info!(
            rows = row_count,
            columns = columns.len(),
            numerical = columns.iter().filter(|c| c.inferred_type == ColumnType::Numerical).count(),
            "Schema inferred"
        );

        Ok(Schema { row_count, columns })
    }

    fn infer_column(&self, column: &Column, row_count: usize) -> ColumnSchema {
        let inferred_type = infer_type(column);
        let null_count = column.null_count();
        let unique_count = distinct_count(column, inferred_type);
        let is_empty = null_count == row_count;
        let is_high_cardinality = inferred_type != ColumnType::Numerical
            && row_count > 0
            && unique_count as f64 / row_count as f64 > HIGH_CARDINALITY_RATIO;

        ColumnSchema {
            name: column.name.clone(),
            inferred_type,
            unique_count,
            null_count,
            null_percentage: if row_count == 0 {
                0.0
            } else {
                null_count as f64 / row_count as f64
            },
            is_high_cardinality,
            is_constant: unique_count <= 1,
            is_empty,
            sample_values: column
                .non_null()
                .take(SAMPLE_VALUES_LIMIT)
                .map(|v| v.to_string())
                .collect(),
        }
    }
}

/// Decide the type of one column: numerical, then datetime, then boolean, else categorical
pub fn infer_type(column: &Column) -> ColumnType {
    let sample: Vec<&Value> = column.non_null().take(SCHEMA_SAMPLE_SIZE).collect();
    if sample.is_empty() {
        return ColumnType::Categorical;
    }
    if sample.iter().all(|v| matches!(v, Value::Bool(_))) {
        return ColumnType::Boolean;
    }

    let n = sample.len() as f64;
    let numeric = sample.iter().filter(|v| v.as_f64().is_some()).count() as f64;
    if numeric / n > NUMERIC_PARSE_RATIO {
        return ColumnType::Numerical;
    }

    let datetimes = sample.iter().filter(|v| parse_datetime(v).is_some()).count() as f64;
    if datetimes / n > DATETIME_PARSE_RATIO {
        return ColumnType::Datetime;
    }

    if is_boolean_column(column) {
        return ColumnType::Boolean;
    }
    ColumnType::Categorical
}

/// Two distinct non-null values, both in the boolean lexicon, one true and one false
fn is_boolean_column(column: &Column) -> bool {
    let mut spellings = BTreeSet::new();
    let mut truths = BTreeSet::new();
    for value in column.non_null() {
        match parse_bool(value) {
            Some(b) => {
                truths.insert(b);
                spellings.insert(value.to_string().trim().to_ascii_lowercase());
            }
            None => return false,
        }
        if spellings.len() > 2 {
            return false;
        }
    }
    spellings.len() == 2 && truths.len() == 2
}

/// Boolean reading of a value via the lexicon
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Text(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            BOOLEAN_LEXICON.iter().find_map(|(t, f)| {
                if lowered == *t {
                    Some(true)
                } else if lowered == *f {
                    Some(false)
                } else {
                    None
                }
            })
        }
        _ => None,
    }
}

/// Parse a value with the known datetime formats, interpreting it as UTC
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let Value::Text(raw) = value else {
        return None;
    };
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in DATETIME_FORMATS {
        if format.contains("%H") {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return Some(naive.and_utc());
            }
        } else if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Distinct non-null values; numerical columns compare parsed values
fn distinct_count(column: &Column, ty: ColumnType) -> usize {
    match ty {
        ColumnType::Numerical => column
            .non_null()
            .map(|v| match v.as_f64() {
                Some(n) => ValueKey::Number((n + 0.0).to_bits()),
                None => ValueKey::Text(v.to_string()),
            })
            .collect::<BTreeSet<_>>()
            .len(),
        ColumnType::Boolean => column
            .non_null()
            .filter_map(parse_bool)
            .collect::<BTreeSet<_>>()
            .len(),
        _ => column.unique_count(),
    }
}
