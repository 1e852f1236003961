//! Data quality scoring
//!
//! overall = w_c * completeness + w_u * uniqueness + w_k * consistency, where
//! completeness is 1 - mean null fraction, uniqueness is 1 - duplicate row ratio
//! and consistency is 1 - the fraction of constant or empty columns.

use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::thresholds::{
    QUALITY_HIGH_SCORE, QUALITY_MODERATE_SCORE, QUALITY_WEIGHT_COMPLETENESS,
    QUALITY_WEIGHT_CONSISTENCY, QUALITY_WEIGHT_UNIQUENESS,
};

/// Null fraction above which a column is reported as mostly missing
const HIGH_MISSINGNESS: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    High,
    Moderate,
    Low,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= QUALITY_HIGH_SCORE {
            QualityLevel::High
        } else if score >= QUALITY_MODERATE_SCORE {
            QualityLevel::Moderate
        } else {
            QualityLevel::Low
        }
    }
}

/// Quality warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityWarning {
    HighMissingness { column: String, ratio: f64 },
    HighCardinality { column: String, unique_count: usize, total_count: usize },
    ConstantColumn { column: String },
    EmptyColumn { column: String },
    DuplicateRows { count: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    /// Weighted score in [0, 1]
    pub overall_score: f64,
    pub level: QualityLevel,
    pub completeness: f64,
    pub uniqueness: f64,
    pub consistency: f64,
    pub warnings: Vec<QualityWarning>,
}

/// Data quality scorer
pub struct DataQualityScorer;

impl DataQualityScorer {
    pub fn score(schema: &Schema, duplicate_rows: usize) -> DataQualityReport {
        let n_cols = schema.columns.len();
        let n_rows = schema.row_count;
        let mut warnings = Vec::new();

        let completeness = if n_cols == 0 {
            1.0
        } else {
            1.0 - schema.columns.iter().map(|c| c.null_percentage).sum::<f64>() / n_cols as f64
        };
        let uniqueness = if n_rows == 0 {
            1.0
        } else {
            1.0 - duplicate_rows as f64 / n_rows as f64
        };

        let mut degenerate = 0;
        for column in &schema.columns {
            if column.is_empty {
                degenerate += 1;
                warnings.push(QualityWarning::EmptyColumn {
                    column: column.name.clone(),
                });
                continue;
            }
            if column.is_constant {
                degenerate += 1;
                warnings.push(QualityWarning::ConstantColumn {
                    column: column.name.clone(),
                });
            }
            if column.null_percentage > HIGH_MISSINGNESS {
                warnings.push(QualityWarning::HighMissingness {
                    column: column.name.clone(),
                    ratio: column.null_percentage,
                });
            }
            if column.is_high_cardinality {
                warnings.push(QualityWarning::HighCardinality {
                    column: column.name.clone(),
                    unique_count: column.unique_count,
                    total_count: n_rows,
                });
            }
        }
        if duplicate_rows > 0 {
            warnings.push(QualityWarning::DuplicateRows {
                count: duplicate_rows,
                total: n_rows,
            });
        }

        let consistency = if n_cols == 0 {
            1.0
        } else {
            1.0 - degenerate as f64 / n_cols as f64
        };

        let overall_score = (QUALITY_WEIGHT_COMPLETENESS * completeness
            + QUALITY_WEIGHT_UNIQUENESS * uniqueness
            + QUALITY_WEIGHT_CONSISTENCY * consistency)
            .clamp(0.0, 1.0);

        DataQualityReport {
            overall_score,
            level: QualityLevel::from_score(overall_score),
            completeness,
            uniqueness,
            consistency,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ColumnType};

    fn column(name: &str, null_percentage: f64, unique_count: usize) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            inferred_type: ColumnType::Numerical,
            unique_count,
            null_count: (null_percentage * 10.0) as usize,
            null_percentage,
            is_high_cardinality: false,
            is_constant: unique_count <= 1,
            is_empty: null_percentage == 1.0,
            sample_values: vec![],
        }
    }

    #[test]
    fn test_perfect_data() {
        let schema = Schema {
            row_count: 10,
            columns: vec![column("a", 0.0, 10), column("b", 0.0, 5)],
        };
        let report = DataQualityScorer::score(&schema, 0);
        assert!((report.overall_score - 1.0).abs() < 1e-12);
        assert_eq!(report.level, QualityLevel::High);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_weighted_components() {
        let schema = Schema {
            row_count: 10,
            columns: vec![column("a", 0.5, 4), column("b", 1.0, 0)],
        };
        let report = DataQualityScorer::score(&schema, 2);
        assert!((report.completeness - 0.25).abs() < 1e-12);
        assert!((report.uniqueness - 0.8).abs() < 1e-12);
        assert!((report.consistency - 0.5).abs() < 1e-12);
        let expected = (0.25 + 0.8 + 0.5) / 3.0;
        assert!((report.overall_score - expected).abs() < 1e-12);
        assert_eq!(report.level, QualityLevel::Low);
    }

    #[test]
    fn test_levels() {
        assert_eq!(QualityLevel::from_score(0.8), QualityLevel::High);
        assert_eq!(QualityLevel::from_score(0.6), QualityLevel::Moderate);
        assert_eq!(QualityLevel::from_score(0.59), QualityLevel::Low);
    }
}
