//! Target leakage heuristics
//!
//! A feature is flagged when its absolute Pearson correlation with the target is
//! implausibly high, or when its values are identical to the target's. This only
//! suggests leakage; a flagged feature may be a legitimate strong predictor.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Dataset, ValueKey};
use crate::schema::{parse_bool, ColumnType, Schema};
use crate::thresholds::{LEAKAGE_HIGH_THRESHOLD, LEAKAGE_MEDIUM_THRESHOLD};

use super::correlation::pearson;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakageSeverity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakageReason {
    /// |r| with the target above a leakage threshold
    Correlation,
    /// Same value as the target in every row
    IdenticalToTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageFlag {
    pub feature: String,
    pub correlation: Option<f64>,
    pub severity: LeakageSeverity,
    pub reason: LeakageReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageReport {
    pub target: String,
    /// False when the target cannot be read as a number (not numerical, boolean or binary)
    pub checked: bool,
    pub flags: Vec<LeakageFlag>,
}

/// Numeric reading of a column for leakage and correlation purposes
///
/// Numerical columns parse their values, boolean columns map to 0/1, and any other
/// column with exactly two distinct values maps the smaller label to 0.
pub fn encode_numeric(column: &Column, ty: ColumnType) -> Option<Vec<Option<f64>>> {
    match ty {
        ColumnType::Numerical => Some(column.values.iter().map(|v| v.as_f64()).collect()),
        ColumnType::Boolean => Some(
            column
                .values
                .iter()
                .map(|v| parse_bool(v).map(|b| if b { 1.0 } else { 0.0 }))
                .collect(),
        ),
        ColumnType::Categorical | ColumnType::Datetime => {
            let labels: BTreeSet<String> = column.non_null().map(|v| v.to_string()).collect();
            if labels.len() != 2 {
                return None;
            }
            let zero = labels.iter().next()?.clone();
            Some(
                column
                    .values
                    .iter()
                    .map(|v| v.as_label().map(|l| if l == zero { 0.0 } else { 1.0 }))
                    .collect(),
            )
        }
    }
}

/// Flag features that look like they leak the target
pub fn detect_leakage(dataset: &Dataset, schema: &Schema, target: &str) -> LeakageReport {
    let mut report = LeakageReport {
        target: target.to_string(),
        checked: false,
        flags: Vec::new(),
    };
    let (Some(target_column), Some(target_schema)) = (dataset.column(target), schema.get(target))
    else {
        return report;
    };
    let Some(encoded_target) = encode_numeric(target_column, target_schema.inferred_type) else {
        return report;
    };
    report.checked = true;

    let target_keys: Vec<Option<ValueKey>> = target_column.values.iter().map(|v| v.key()).collect();

    for (column, column_schema) in dataset.columns().iter().zip(&schema.columns) {
        if column.name == target || column_schema.is_empty {
            continue;
        }

        let identical = column
            .values
            .iter()
            .map(|v| v.key())
            .eq(target_keys.iter().cloned());

        let correlation = match column_schema.inferred_type {
            ColumnType::Numerical | ColumnType::Boolean => {
                encode_numeric(column, column_schema.inferred_type)
                    .and_then(|encoded| pearson(&encoded, &encoded_target))
            }
            _ => None,
        };

        let flag = if identical {
            Some((LeakageSeverity::High, LeakageReason::IdenticalToTarget))
        } else {
            correlation.and_then(|r| severity_for(r.abs()).map(|s| (s, LeakageReason::Correlation)))
        };

        if let Some((severity, reason)) = flag {
            report.flags.push(LeakageFlag {
                feature: column.name.clone(),
                correlation,
                severity,
                reason,
            });
        }
    }

    report.flags.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| {
                let ra = a.correlation.map(f64::abs).unwrap_or(1.0);
                let rb = b.correlation.map(f64::abs).unwrap_or(1.0);
                rb.total_cmp(&ra)
            })
            .then_with(|| a.feature.cmp(&b.feature))
    });
    report
}

pub fn severity_for(abs_r: f64) -> Option<LeakageSeverity> {
    if abs_r > LEAKAGE_HIGH_THRESHOLD {
        Some(LeakageSeverity::High)
    } else if abs_r > LEAKAGE_MEDIUM_THRESHOLD {
        Some(LeakageSeverity::Medium)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Value;

    #[test]
    fn test_severity_tiers() {
        assert_eq!(severity_for(1.0), Some(LeakageSeverity::High));
        assert_eq!(severity_for(0.96), Some(LeakageSeverity::High));
        assert_eq!(severity_for(0.9), Some(LeakageSeverity::Medium));
        assert_eq!(severity_for(0.85), None);
        assert_eq!(severity_for(0.2), None);
    }

    #[test]
    fn test_binarizable_categorical() {
        let column = Column::new("c", vec!["yes".into(), "no".into(), Value::Null, "yes".into()]);
        let encoded = encode_numeric(&column, ColumnType::Categorical).unwrap();
        assert_eq!(encoded, vec![Some(1.0), Some(0.0), None, Some(1.0)]);

        let three = Column::new("c", vec!["a".into(), "b".into(), "c".into()]);
        assert!(encode_numeric(&three, ColumnType::Categorical).is_none());
    }
}
