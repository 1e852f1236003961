//! Algorithm recommendation from dataset characteristics
//!
//! Used when a train request names no algorithm. Every supported algorithm is
//! scored on dataset size, dimensionality, expected accuracy, interpretability,
//! training time and tolerance to missing values and outliers; the highest score
//! wins and ties go to the earlier entry of [`Algorithm::ALL`].

use serde::{Deserialize, Serialize};

use super::{Algorithm, ProblemType};
use crate::dataset::Dataset;
use crate::profiling::stats::{numeric_stats, numeric_values};
use crate::schema::{ColumnType, Schema};
use crate::thresholds::{
    HIGH_DIMENSIONAL_FEATURES, LOW_DIMENSIONAL_FEATURES, MEDIUM_DATASET_ROWS,
    RECOMMEND_MISSING_RATIO, RECOMMEND_OUTLIER_RATIO, SMALL_DATASET_ROWS,
};

/// Dataset size band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBand {
    Small,
    Medium,
    Large,
}

impl SizeBand {
    pub fn of(rows: usize) -> Self {
        if rows < SMALL_DATASET_ROWS {
            SizeBand::Small
        } else if rows < MEDIUM_DATASET_ROWS {
            SizeBand::Medium
        } else {
            SizeBand::Large
        }
    }
}

/// What the recommender looks at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetTraits {
    pub rows: usize,
    /// Columns other than the target
    pub features: usize,
    /// Mean null fraction of the feature columns
    pub missing_ratio: f64,
    /// IQR outliers over all numerical feature values
    pub outlier_ratio: f64,
}

impl DatasetTraits {
    pub fn new(rows: usize, features: usize) -> Self {
        Self {
            rows,
            features,
            missing_ratio: 0.0,
            outlier_ratio: 0.0,
        }
    }

    pub fn with_missing_ratio(mut self, ratio: f64) -> Self {
        self.missing_ratio = ratio;
        self
    }

    pub fn with_outlier_ratio(mut self, ratio: f64) -> Self {
        self.outlier_ratio = ratio;
        self
    }

    /// Measure a dataset, leaving the target column out
    pub fn measure(dataset: &Dataset, schema: &Schema, target: &str) -> Self {
        let mut features = 0usize;
        let mut missing = 0.0;
        let mut numeric_total = 0usize;
        let mut outliers = 0usize;

        for (column, column_schema) in dataset.columns().iter().zip(&schema.columns) {
            if column.name == target {
                continue;
            }
            features += 1;
            missing += column_schema.null_percentage;
            if column_schema.inferred_type == ColumnType::Numerical {
                if let Some(values) = numeric_values(column) {
                    numeric_total += values.len();
                    outliers += numeric_stats(&values).outlier_count;
                }
            }
        }

        Self {
            rows: dataset.n_rows(),
            features,
            missing_ratio: if features == 0 { 0.0 } else { missing / features as f64 },
            outlier_ratio: if numeric_total == 0 {
                0.0
            } else {
                outliers as f64 / numeric_total as f64
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TrainingTime {
    Fast,
    Medium,
    Slow,
}

/// Static traits of an algorithm
struct Profile {
    suited_size: Option<SizeBand>,
    high_dimensional: bool,
    high_performance: bool,
    complexity: Complexity,
    /// 1 (opaque) to 10 (fully transparent)
    interpretability: u8,
    training_time: TrainingTime,
    tolerates_missing_and_outliers: bool,
}

fn profile(algorithm: Algorithm) -> Profile {
    match algorithm {
        Algorithm::LogisticRegression => Profile {
            suited_size: Some(SizeBand::Small),
            high_dimensional: false,
            high_performance: false,
            complexity: Complexity::Low,
            interpretability: 9,
            training_time: TrainingTime::Fast,
            tolerates_missing_and_outliers: false,
        },
        Algorithm::RandomForest => Profile {
            suited_size: Some(SizeBand::Medium),
            high_dimensional: false,
            high_performance: false,
            complexity: Complexity::Medium,
            interpretability: 3,
            training_time: TrainingTime::Medium,
            tolerates_missing_and_outliers: true,
        },
        Algorithm::Xgboost => Profile {
            suited_size: Some(SizeBand::Large),
            high_dimensional: false,
            high_performance: true,
            complexity: Complexity::High,
            interpretability: 2,
            training_time: TrainingTime::Slow,
            tolerates_missing_and_outliers: true,
        },
        Algorithm::Svm => Profile {
            suited_size: Some(SizeBand::Small),
            high_dimensional: true,
            high_performance: false,
            complexity: Complexity::Medium,
            interpretability: 4,
            training_time: TrainingTime::Slow,
            tolerates_missing_and_outliers: false,
        },
    }
}

/// Scored candidate algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmRecommendation {
    pub algorithm: Algorithm,
    /// 0 to 100
    pub score: u32,
    pub reasons: Vec<String>,
}

fn score(algorithm: Algorithm, traits: &DatasetTraits) -> AlgorithmRecommendation {
    let profile = profile(algorithm);
    let mut score = 0u32;
    let mut reasons = Vec::new();

    let band = SizeBand::of(traits.rows);
    if profile.suited_size == Some(band) {
        score += 25;
        reasons.push(format!("well suited to {band:?} datasets").to_lowercase());
    } else if band == SizeBand::Small && profile.complexity == Complexity::Low {
        score += 15;
        reasons.push("simple model for a small dataset".to_string());
    } else if band == SizeBand::Large && profile.complexity == Complexity::High {
        score += 15;
        reasons.push("complex model can use a large dataset".to_string());
    }

    if traits.features > HIGH_DIMENSIONAL_FEATURES && profile.high_dimensional {
        score += 20;
        reasons.push("handles high-dimensional data".to_string());
    } else if traits.features < LOW_DIMENSIONAL_FEATURES && profile.complexity == Complexity::Low {
        score += 10;
        reasons.push("fits low-dimensional data".to_string());
    }

    if profile.high_performance {
        score += 20;
        reasons.push("high accuracy potential".to_string());
    }
    if profile.interpretability >= 5 {
        score += 10;
    }
    if profile.training_time <= TrainingTime::Medium {
        score += match profile.training_time {
            TrainingTime::Fast => 12,
            _ => 15,
        };
        reasons.push("trains quickly".to_string());
    }

    if profile.tolerates_missing_and_outliers {
        if traits.missing_ratio > RECOMMEND_MISSING_RATIO {
            score += 10;
            reasons.push("tolerates missing values".to_string());
        }
        if traits.outlier_ratio > RECOMMEND_OUTLIER_RATIO {
            score += 10;
            reasons.push("robust to outliers".to_string());
        }
    }

    AlgorithmRecommendation {
        algorithm,
        score: score.min(100),
        reasons,
    }
}

/// Every algorithm supporting `problem_type`, best first
pub fn rank_algorithms(traits: &DatasetTraits, problem_type: ProblemType) -> Vec<AlgorithmRecommendation> {
    let mut ranked: Vec<AlgorithmRecommendation> = Algorithm::ALL
        .iter()
        .filter(|a| a.supports(problem_type))
        .map(|&a| score(a, traits))
        .collect();
    // Stable sort keeps `Algorithm::ALL` order among equal scores
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Best-scoring algorithm for `problem_type`
pub fn recommend_algorithm(traits: &DatasetTraits, problem_type: ProblemType) -> AlgorithmRecommendation {
    rank_algorithms(traits, problem_type)
        .into_iter()
        .next()
        .unwrap_or_else(|| score(Algorithm::RandomForest, traits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaInferencer;
    use crate::dataset::Value;

    fn pick(traits: DatasetTraits, problem_type: ProblemType) -> Algorithm {
        recommend_algorithm(&traits, problem_type).algorithm
    }

    #[test]
    fn test_size_bands() {
        assert_eq!(SizeBand::of(999), SizeBand::Small);
        assert_eq!(SizeBand::of(1000), SizeBand::Medium);
        assert_eq!(SizeBand::of(10_000), SizeBand::Large);
    }

    #[test]
    fn test_small_classification_prefers_logistic_regression() {
        let ranked = rank_algorithms(&DatasetTraits::new(200, 5), ProblemType::Classification);
        assert_eq!(ranked[0].algorithm, Algorithm::LogisticRegression);
        assert_eq!(ranked[0].score, 57);
        assert_eq!(ranked.len(), 4);
    }

    #[test]
    fn test_medium_data_prefers_random_forest() {
        let traits = DatasetTraits::new(5000, 20);
        assert_eq!(pick(traits, ProblemType::Classification), Algorithm::RandomForest);
        assert_eq!(pick(traits, ProblemType::Regression), Algorithm::RandomForest);
    }

    #[test]
    fn test_large_data_prefers_boosting() {
        let traits = DatasetTraits::new(50_000, 20);
        assert_eq!(pick(traits, ProblemType::Classification), Algorithm::Xgboost);
    }

    #[test]
    fn test_small_regression_never_picks_logistic_regression() {
        let ranked = rank_algorithms(&DatasetTraits::new(200, 3), ProblemType::Regression);
        assert!(ranked.iter().all(|r| r.algorithm != Algorithm::LogisticRegression));
        assert_eq!(ranked[0].algorithm, Algorithm::Svm);
    }

    #[test]
    fn test_missing_values_favor_tree_ensembles() {
        let traits = DatasetTraits::new(200, 3).with_missing_ratio(0.3);
        assert_eq!(pick(traits, ProblemType::Regression), Algorithm::Xgboost);
        let traits = DatasetTraits::new(200, 3).with_outlier_ratio(0.3);
        assert_eq!(pick(traits, ProblemType::Regression), Algorithm::Xgboost);
    }

    #[test]
    fn test_measure_leaves_target_out() {
        let ds = Dataset::from_columns(vec![
            ("a", (0..20).map(|i| if i < 10 { Value::Null } else { Value::from(i as f64) }).collect()),
            ("b", (0..20).map(|i| Value::from(i as f64)).collect::<Vec<_>>()),
            ("y", (0..20).map(|_| Value::Null).collect()),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let traits = DatasetTraits::measure(&ds, &schema, "y");
        assert_eq!(traits.rows, 20);
        assert_eq!(traits.features, 2);
        assert!((traits.missing_ratio - 0.25).abs() < 1e-12);
        assert_eq!(traits.outlier_ratio, 0.0);
    }
}
