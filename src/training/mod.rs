//! Model training module
//!
//! Provides problem-type inference, algorithm selection and the supported estimators:
//! - Random Forests (classification and regression)
//! - Logistic regression (classification)
//! - XGBoost-style second-order gradient boosting
//! - Support Vector Machines (SMO classifier, epsilon-SVR)

mod engine;
pub mod decision_tree;
pub mod linear_models;
pub mod random_forest;
pub mod recommend;
pub mod svm;
pub mod xgboost;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use engine::{FittedEstimator, TrainEngine, TrainRequest};
pub use linear_models::LogisticRegression;
pub use random_forest::RandomForest;
pub use recommend::{rank_algorithms, recommend_algorithm, AlgorithmRecommendation, DatasetTraits};
pub use svm::{KernelType, SVMClassifier, SVMConfig, SVMRegressor};
pub use xgboost::{XGBoostClassifier, XGBoostConfig, XGBoostRegressor};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::Column;
use crate::error::{AutoMlError, EstimatorError};
use crate::evaluation::{EvaluationMetrics, FeatureImportance};
use crate::schema::{ColumnSchema, ColumnType};
use crate::thresholds::CLASSIFICATION_MAX_DISTINCT;

/// Result type for estimator internals
pub type EstimatorResult<T> = std::result::Result<T, EstimatorError>;

/// Kind of prediction task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::Classification => write!(f, "classification"),
            ProblemType::Regression => write!(f, "regression"),
        }
    }
}

/// Supported algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RandomForest,
    LogisticRegression,
    Xgboost,
    Svm,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RandomForest,
        Algorithm::LogisticRegression,
        Algorithm::Xgboost,
        Algorithm::Svm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RandomForest => "random_forest",
            Algorithm::LogisticRegression => "logistic_regression",
            Algorithm::Xgboost => "xgboost",
            Algorithm::Svm => "svm",
        }
    }

    /// Whether this algorithm can fit the given problem type
    pub fn supports(&self, problem_type: ProblemType) -> bool {
        !matches!(
            (self, problem_type),
            (Algorithm::LogisticRegression, ProblemType::Regression)
        )
    }

    /// Fail with `IncompatibleAlgorithm` rather than substituting another algorithm
    pub fn ensure_supports(&self, problem_type: ProblemType) -> crate::error::Result<()> {
        if self.supports(problem_type) {
            Ok(())
        } else {
            Err(AutoMlError::IncompatibleAlgorithm {
                algorithm: self.to_string(),
                problem_type: problem_type.to_string(),
            })
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = AutoMlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "random_forest" | "rf" => Ok(Algorithm::RandomForest),
            "logistic_regression" | "logistic" => Ok(Algorithm::LogisticRegression),
            "xgboost" | "xgb" => Ok(Algorithm::Xgboost),
            "svm" => Ok(Algorithm::Svm),
            _ => Err(AutoMlError::invalid_parameter(
                "algorithm",
                s,
                "expected one of random_forest, logistic_regression, xgboost, svm",
            )),
        }
    }
}

/// Classification unless the target is numerical with many distinct or non-integer values
pub fn infer_problem_type(column: &Column, schema: &ColumnSchema) -> ProblemType {
    match schema.inferred_type {
        ColumnType::Numerical => {
            let mut values = column.values.iter().filter_map(|v| v.as_f64());
            let has_fraction = values.any(|v| v.fract() != 0.0);
            if has_fraction || schema.unique_count > CLASSIFICATION_MAX_DISTINCT {
                ProblemType::Regression
            } else {
                ProblemType::Classification
            }
        }
        ColumnType::Boolean | ColumnType::Categorical | ColumnType::Datetime => {
            ProblemType::Classification
        }
    }
}

/// Bookkeeping captured while training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    pub train_samples: usize,
    pub test_samples: usize,
    /// Raw input columns used as features
    pub features_before_encoding: usize,
    /// Columns of the feature matrix
    pub features_after_encoding: usize,
    pub dropped_target_rows: usize,
    pub dropped_columns: Vec<String>,
    pub stratified: bool,
    pub duration_ms: u64,
    pub trained_at: DateTime<Utc>,
}

/// A fitted model plus everything needed to describe it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub model_id: String,
    pub problem_type: ProblemType,
    pub algorithm: Algorithm,
    pub target_column: String,
    /// Post-transform feature names, in matrix column order
    pub feature_names: Vec<String>,
    /// Class labels by label index (classification only)
    pub class_labels: Vec<String>,
    pub estimator: FittedEstimator,
    pub seed: u64,
    pub evaluation_metrics: EvaluationMetrics,
    pub feature_importance: FeatureImportance,
    pub training_info: TrainingInfo,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Value};
    use crate::schema::SchemaInferencer;

    fn problem_type_of(values: Vec<Value>) -> ProblemType {
        let ds = Dataset::from_columns(vec![("y", values)]).unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        infer_problem_type(&ds.columns()[0], &schema.columns[0])
    }

    #[test]
    fn test_binary_integers_are_classification() {
        let values = (0..100).map(|i| Value::from((i % 2) as f64)).collect();
        assert_eq!(problem_type_of(values), ProblemType::Classification);
    }

    #[test]
    fn test_many_distinct_integers_are_regression() {
        let values = (0..100).map(|i| Value::from(i as f64)).collect();
        assert_eq!(problem_type_of(values), ProblemType::Regression);
    }

    #[test]
    fn test_fractional_values_are_regression() {
        let values = (0..100).map(|i| Value::from(if i % 2 == 0 { 0.5 } else { 1.0 })).collect();
        assert_eq!(problem_type_of(values), ProblemType::Regression);
    }

    #[test]
    fn test_text_target_is_classification() {
        let values = (0..30).map(|i| Value::from(["a", "b", "c"][i % 3])).collect();
        assert_eq!(problem_type_of(values), ProblemType::Classification);
    }

    #[test]
    fn test_algorithm_parsing_and_compat() {
        assert_eq!("random_forest".parse::<Algorithm>().unwrap(), Algorithm::RandomForest);
        assert_eq!("XGBoost".parse::<Algorithm>().unwrap(), Algorithm::Xgboost);
        assert!("knn".parse::<Algorithm>().is_err());
        assert!(!Algorithm::LogisticRegression.supports(ProblemType::Regression));
        assert!(matches!(
            Algorithm::LogisticRegression.ensure_supports(ProblemType::Regression),
            Err(AutoMlError::IncompatibleAlgorithm { .. })
        ));
        for algorithm in Algorithm::ALL {
            assert!(algorithm.supports(ProblemType::Classification));
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
    }

    #[test]
    fn test_algorithm_serde() {
        let json = serde_json::to_string(&Algorithm::LogisticRegression).unwrap();
        assert_eq!(json, "\"logistic_regression\"");
    }
}
