//! Per-column statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, ValueKey};
use crate::schema::{parse_bool, parse_datetime, ColumnSchema, ColumnType};
use crate::thresholds::{
    OUTLIER_INDEX_LIMIT, OUTLIER_IQR_MULTIPLIER, OUTLIER_MIN_VALUES, TOP_VALUES_LIMIT,
};

/// Statistics of a numerical column. Values that do not parse as numbers count as missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1); `None` with fewer than two values
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Biased third standardized moment
    pub skewness: Option<f64>,
    pub outlier_count: usize,
    /// Row indices of outliers, capped
    pub outlier_indices: Vec<usize>,
}

/// One entry of a frequency table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    /// Most frequent values, by count descending then value ascending
    pub top_values: Vec<ValueCount>,
    pub most_frequent: String,
    pub most_frequent_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanStats {
    pub true_count: usize,
    pub false_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimeStats {
    /// RFC 3339, UTC
    pub min: String,
    pub max: String,
    pub parsed_count: usize,
}

/// Type-specific part of a column profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnDetails {
    Numerical(NumericStats),
    Categorical(CategoricalStats),
    Boolean(BooleanStats),
    Datetime(DatetimeStats),
    /// No usable values
    Empty,
}

/// Profile of a single column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: ColumnType,
    pub count: usize,
    pub null_count: usize,
    pub null_percentage: f64,
    pub unique_count: usize,
    pub sample_values: Vec<String>,
    pub details: ColumnDetails,
}

/// Build the profile of one column according to its inferred type
pub fn profile_column(column: &Column, schema: &ColumnSchema) -> ColumnProfile {
    let details = match schema.inferred_type {
        ColumnType::Numerical => numeric_values(column)
            .map(|values| ColumnDetails::Numerical(numeric_stats(&values)))
            .unwrap_or(ColumnDetails::Empty),
        ColumnType::Categorical => categorical_stats(column)
            .map(ColumnDetails::Categorical)
            .unwrap_or(ColumnDetails::Empty),
        ColumnType::Boolean => {
            let (mut true_count, mut false_count) = (0, 0);
            for b in column.values.iter().filter_map(parse_bool) {
                if b {
                    true_count += 1;
                } else {
                    false_count += 1;
                }
            }
            ColumnDetails::Boolean(BooleanStats {
                true_count,
                false_count,
            })
        }
        ColumnType::Datetime => datetime_stats(column)
            .map(ColumnDetails::Datetime)
            .unwrap_or(ColumnDetails::Empty),
    };

    ColumnProfile {
        name: column.name.clone(),
        inferred_type: schema.inferred_type,
        count: column.len() - schema.null_count,
        null_count: schema.null_count,
        null_percentage: schema.null_percentage,
        unique_count: schema.unique_count,
        sample_values: schema.sample_values.clone(),
        details,
    }
}

/// (row index, value) pairs of every parseable number, or `None` when there are none
pub fn numeric_values(column: &Column) -> Option<Vec<(usize, f64)>> {
    let values: Vec<(usize, f64)> = column
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_f64().map(|n| (i, n)))
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Summary statistics over non-empty (row, value) pairs
pub fn numeric_stats(indexed: &[(usize, f64)]) -> NumericStats {
    let values: Vec<f64> = indexed.iter().map(|(_, v)| *v).collect();
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);

    let mean = mean(&values);
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);

    let (outlier_count, outlier_indices) = if values.len() >= OUTLIER_MIN_VALUES {
        let iqr = q3 - q1;
        let lower = q1 - OUTLIER_IQR_MULTIPLIER * iqr;
        let upper = q3 + OUTLIER_IQR_MULTIPLIER * iqr;
        let rows: Vec<usize> = indexed
            .iter()
            .filter(|(_, v)| *v < lower || *v > upper)
            .map(|(i, _)| *i)
            .collect();
        let count = rows.len();
        (count, rows.into_iter().take(OUTLIER_INDEX_LIMIT).collect())
    } else {
        (0, Vec::new())
    };

    NumericStats {
        mean,
        std: sample_std(&values, mean),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        q1,
        median,
        q3,
        skewness: skewness(&values, mean),
        outlier_count,
        outlier_indices,
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation
pub fn sample_std(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile with linear interpolation between closest ranks; `sorted` must be ascending
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

/// m3 / m2^1.5 over population moments
pub fn skewness(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let n = values.len() as f64;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / n;
    if m2 <= (f64::EPSILON * mean.abs().max(1.0)).powi(2) {
        return None;
    }
    Some(m3 / m2.powf(1.5))
}

fn categorical_stats(column: &Column) -> Option<CategoricalStats> {
    let mut counts: BTreeMap<ValueKey, (String, usize)> = BTreeMap::new();
    for value in column.non_null() {
        if let Some(key) = value.key() {
            counts
                .entry(key)
                .or_insert_with(|| (value.to_string(), 0))
                .1 += 1;
        }
    }
    let mut table: Vec<ValueCount> = counts
        .into_values()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    table.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    table.truncate(TOP_VALUES_LIMIT);

    let first = table.first()?.clone();
    Some(CategoricalStats {
        top_values: table,
        most_frequent: first.value,
        most_frequent_count: first.count,
    })
}

fn datetime_stats(column: &Column) -> Option<DatetimeStats> {
    let parsed: Vec<_> = column.values.iter().filter_map(parse_datetime).collect();
    let min = parsed.iter().min()?;
    let max = parsed.iter().max()?;
    Some(DatetimeStats {
        min: min.to_rfc3339(),
        max: max.to_rfc3339(),
        parsed_count: parsed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    fn indexed(values: &[f64]) -> Vec<(usize, f64)> {
        values.iter().copied().enumerate().collect()
    }

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_numeric_stats() {
        let stats = numeric_stats(&indexed(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]));
        assert!((stats.mean - 5.0).abs() < 1e-12);
        // sample std of this classic set is sqrt(32/7)
        assert!((stats.std.unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!(stats.skewness.unwrap() > 0.0);
    }

    #[test]
    fn test_outliers_are_row_indices() {
        let mut values = vec![10.0; 20];
        values[3] = 11.0;
        values[7] = 1000.0;
        let stats = numeric_stats(&indexed(&values));
        assert_eq!(stats.outlier_count, 2);
        assert_eq!(stats.outlier_indices, vec![3, 7]);
    }

    #[test]
    fn test_constant_has_no_skew() {
        let stats = numeric_stats(&indexed(&[3.0, 3.0, 3.0, 3.0]));
        assert_eq!(stats.skewness, None);
        assert_eq!(stats.std, Some(0.0));
        assert_eq!(stats.outlier_count, 0);
    }

    #[test]
    fn test_categorical_top_values() {
        let column = Column::new(
            "city",
            vec!["b".into(), "a".into(), "b".into(), Value::Null, "a".into(), "c".into()],
        );
        let stats = categorical_stats(&column).unwrap();
        assert_eq!(stats.most_frequent, "a");
        assert_eq!(stats.most_frequent_count, 2);
        assert_eq!(stats.top_values.len(), 3);
        assert_eq!(stats.top_values[2].value, "c");
    }

    #[test]
    fn test_datetime_range() {
        let column = Column::new("d", vec!["2024-03-01".into(), "2023-01-15".into(), Value::Null]);
        let stats = datetime_stats(&column).unwrap();
        assert!(stats.min.starts_with("2023-01-15"));
        assert!(stats.max.starts_with("2024-03-01"));
        assert_eq!(stats.parsed_count, 2);
    }
}
