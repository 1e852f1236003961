//! Model evaluation
//!
//! Metrics are computed on the held-out split only. Feature importance is
//! reported as `NotAvailable` when the estimator has no native notion of it.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{AutoMlError, Result};
use crate::training::ProblemType;

/// How precision/recall/F1 were aggregated over classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Scores of the positive class (label index 1)
    Binary,
    /// Unweighted mean over classes
    Macro,
}

/// Rows are true label indices, columns are predicted label indices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>, labels: &[String]) -> Self {
        let k = labels.len();
        let mut matrix = vec![vec![0usize; k]; k];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (t, p) = (t as usize, p as usize);
            if t < k && p < k {
                matrix[t][p] += 1;
            }
        }
        Self {
            labels: labels.to_vec(),
            matrix,
        }
    }

    /// (precision, recall, f1) of one class; 0 when undefined
    fn class_scores(&self, class: usize) -> (f64, f64, f64) {
        let tp = self.matrix[class][class] as f64;
        let predicted: usize = self.matrix.iter().map(|row| row[class]).sum();
        let actual: usize = self.matrix[class].iter().sum();

        let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
        let recall = if actual > 0 { tp / actual as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        (precision, recall, f1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub averaging: Averaging,
    pub confusion_matrix: ConfusionMatrix,
    pub n_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_samples: usize,
}

/// Metrics for the held-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "problem_type", rename_all = "snake_case")]
pub enum EvaluationMetrics {
    Classification(ClassificationMetrics),
    Regression(RegressionMetrics),
}

impl EvaluationMetrics {
    /// Headline metric: accuracy for classification, R² for regression
    pub fn primary(&self) -> (&'static str, f64) {
        match self {
            EvaluationMetrics::Classification(m) => ("accuracy", m.accuracy),
            EvaluationMetrics::Regression(m) => ("r2", m.r2),
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            EvaluationMetrics::Classification(m) => m.n_samples,
            EvaluationMetrics::Regression(m) => m.n_samples,
        }
    }
}

/// Computes metrics from true and predicted targets
pub struct Evaluator;

impl Evaluator {
    /// Evaluate predictions; class labels are only used for classification
    pub fn evaluate(
        problem_type: ProblemType,
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        class_labels: &[String],
    ) -> Result<EvaluationMetrics> {
        if y_true.is_empty() {
            return Err(AutoMlError::EmptyTestSet);
        }
        if y_true.len() != y_pred.len() {
            return Err(AutoMlError::invalid_parameter(
                "y_pred",
                y_pred.len(),
                format!("expected {} predictions", y_true.len()),
            ));
        }
        Ok(match problem_type {
            ProblemType::Classification => EvaluationMetrics::Classification(
                Self::compute_classification(y_true, y_pred, class_labels),
            ),
            ProblemType::Regression => {
                EvaluationMetrics::Regression(Self::compute_regression(y_true, y_pred))
            }
        })
    }

    pub fn compute_classification(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        class_labels: &[String],
    ) -> ClassificationMetrics {
        let n = y_true.len();
        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();

        let confusion_matrix = ConfusionMatrix::compute(y_true, y_pred, class_labels);
        let k = class_labels.len();

        let (precision, recall, f1_score, averaging) = if k == 2 {
            let (p, r, f) = confusion_matrix.class_scores(1);
            (p, r, f, Averaging::Binary)
        } else {
            let scores: Vec<(f64, f64, f64)> =
                (0..k).map(|c| confusion_matrix.class_scores(c)).collect();
            let denom = k.max(1) as f64;
            (
                scores.iter().map(|s| s.0).sum::<f64>() / denom,
                scores.iter().map(|s| s.1).sum::<f64>() / denom,
                scores.iter().map(|s| s.2).sum::<f64>() / denom,
                Averaging::Macro,
            )
        };

        ClassificationMetrics {
            accuracy: correct as f64 / n as f64,
            precision,
            recall,
            f1_score,
            averaging,
            confusion_matrix,
            n_samples: n,
        }
    }

    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> RegressionMetrics {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        // Constant truth: perfect predictions score 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        RegressionMetrics {
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScore {
    pub feature: String,
    pub importance: f64,
}

/// Per-feature importance, or an explicit statement that there is none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FeatureImportance {
    /// Normalized to sum to 1, sorted by importance then name
    Available { scores: Vec<FeatureScore> },
    NotAvailable { reason: String },
}

impl FeatureImportance {
    pub fn not_available(reason: impl Into<String>) -> Self {
        FeatureImportance::NotAvailable {
            reason: reason.into(),
        }
    }

    pub fn from_raw(feature_names: &[String], raw: &Array1<f64>) -> Self {
        let total: f64 = raw.iter().map(|v| v.abs()).sum();
        let mut scores: Vec<FeatureScore> = feature_names
            .iter()
            .zip(raw.iter())
            .map(|(name, &v)| FeatureScore {
                feature: name.clone(),
                importance: if total > 0.0 { v.abs() / total } else { 0.0 },
            })
            .collect();
        scores.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        FeatureImportance::Available { scores }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, FeatureImportance::Available { .. })
    }

    /// Up to `n` most important features
    pub fn top(&self, n: usize) -> &[FeatureScore] {
        match self {
            FeatureImportance::Available { scores } => &scores[..n.min(scores.len())],
            FeatureImportance::NotAvailable { .. } => &[],
        }
    }
}
