//! Prediction service
//!
//! Replays an artifact's fitted pipeline on new rows and invokes its model.
//! Columns are checked up front; a batch with any row missing a required
//! column fails as a whole and yields no predictions.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::ModelArtifact;
use crate::error::{AutoMlError, Result};
use crate::preprocessing::{Record, TargetTransform};
use crate::schema::ColumnType;
use crate::training::ProblemType;

/// Predicted class label or regression value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictedValue {
    Number(f64),
    Label(String),
}

impl std::fmt::Display for PredictedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PredictedValue::Number(n) => write!(f, "{n}"),
            PredictedValue::Label(s) => write!(f, "{s}"),
        }
    }
}

/// Outcome for one input row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: PredictedValue,
    /// Highest class probability; classification with native probabilities only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Class label to probability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
    /// 5th to 95th percentile spread of the ensemble; random forest regression only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_width: Option<f64>,
}

/// Runs predictions against loaded artifacts
#[derive(Debug, Clone, Default)]
pub struct PredictionService;

impl PredictionService {
    pub fn new() -> Self {
        Self
    }

    pub fn predict(&self, artifact: &ModelArtifact, rows: &[Record]) -> Result<Vec<PredictionResult>> {
        let start = Instant::now();
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let model = &artifact.model;
        let x = artifact.pipeline.transform_records(rows)?;
        debug!(rows = x.nrows(), features = x.ncols(), "Rows transformed");

        let failed = |source| AutoMlError::PredictionFailed {
            model_id: model.model_id.clone(),
            rows: x.nrows(),
            features: x.ncols(),
            source,
        };
        let raw = model.estimator.predict(&x).map_err(failed)?;

        let results: Vec<PredictionResult> = match model.problem_type {
            ProblemType::Classification => {
                let proba = model.estimator.predict_proba(&x).map_err(failed)?;
                let numeric_labels = matches!(
                    artifact.pipeline.target,
                    TargetTransform::Classification {
                        source_type: ColumnType::Numerical,
                        ..
                    }
                );
                raw.iter()
                    .enumerate()
                    .map(|(i, &class)| -> Result<PredictionResult> {
                        let label = model
                            .class_labels
                            .get(class as usize)
                            .cloned()
                            .ok_or(AutoMlError::ModelNotFitted)?;
                        let prediction = match label.parse::<f64>() {
                            Ok(n) if numeric_labels => PredictedValue::Number(n),
                            _ => PredictedValue::Label(label),
                        };
                        let probabilities = proba.as_ref().map(|p| {
                            model
                                .class_labels
                                .iter()
                                .cloned()
                                .zip(p.row(i).iter().copied())
                                .collect::<BTreeMap<_, _>>()
                        });
                        let confidence = proba
                            .as_ref()
                            .map(|p| p.row(i).iter().copied().fold(0.0, f64::max));
                        Ok(PredictionResult {
                            prediction,
                            confidence,
                            probabilities,
                            interval_width: None,
                        })
                    })
                    .collect::<Result<_>>()?
            }
            ProblemType::Regression => {
                let widths = model.estimator.interval_width(&x).map_err(failed)?;
                raw.iter()
                    .enumerate()
                    .map(|(i, &value)| PredictionResult {
                        prediction: PredictedValue::Number(value),
                        confidence: None,
                        probabilities: None,
                        interval_width: widths.as_ref().map(|w| w[i]),
                    })
                    .collect()
            }
        };

        info!(
            model_id = %model.model_id,
            rows = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prediction batch served"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Value};
    use crate::schema::SchemaInferencer;
    use crate::training::{Algorithm, TrainEngine, TrainRequest};

    fn artifact(algorithm: Algorithm, target: &str) -> ModelArtifact {
        let n = 50;
        let ds = Dataset::from_columns(vec![
            ("x", (0..n).map(|i| Value::from(i as f64)).collect::<Vec<_>>()),
            ("kind", (0..n).map(|i| Value::from(if i < 25 { "low" } else { "high" })).collect()),
            ("grade", (0..n).map(|i| Value::from(if i < 25 { 0.0 } else { 1.0 })).collect()),
            ("value", (0..n).map(|i| Value::from(i as f64 * 0.5 + 0.1)).collect()),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let (pipeline, model) = TrainEngine::default()
            .with_n_estimators(10)
            .train(
                &ds,
                &schema,
                &TrainRequest::new(target).with_algorithm(algorithm),
                "model_predict",
            )
            .unwrap();
        ModelArtifact::new(pipeline, model, None, None)
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_classification_probabilities() {
        let artifact = artifact(Algorithm::RandomForest, "kind");
        let rows = vec![record(&[
            ("x", 3.0.into()),
            ("grade", 0.0.into()),
            ("value", 1.6.into()),
            ("unused", "ignored".into()),
        ])];
        let results = PredictionService::new().predict(&artifact, &rows).unwrap();
        let result = &results[0];
        assert_eq!(result.prediction, PredictedValue::Label("low".to_string()));
        let probabilities = result.probabilities.as_ref().unwrap();
        assert!((probabilities.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(result.confidence, probabilities.values().copied().reduce(f64::max));
    }

    #[test]
    fn test_numeric_class_labels_stay_numeric() {
        let artifact = artifact(Algorithm::LogisticRegression, "grade");
        let rows = vec![record(&[("x", 49.0.into()), ("kind", "high".into()), ("value", 24.6.into())])];
        let results = PredictionService::new().predict(&artifact, &rows).unwrap();
        assert_eq!(results[0].prediction, PredictedValue::Number(1.0));
    }

    #[test]
    fn test_svm_has_no_confidence() {
        let artifact = artifact(Algorithm::Svm, "kind");
        let rows = vec![record(&[("x", 40.0.into()), ("grade", 1.0.into()), ("value", 20.1.into())])];
        let results = PredictionService::new().predict(&artifact, &rows).unwrap();
        assert!(results[0].confidence.is_none());
        assert!(results[0].probabilities.is_none());
    }

    #[test]
    fn test_regression_interval_width() {
        let artifact = artifact(Algorithm::RandomForest, "value");
        let rows = vec![record(&[("x", 10.0.into()), ("kind", "low".into()), ("grade", 0.0.into())])];
        let results = PredictionService::new().predict(&artifact, &rows).unwrap();
        assert!(matches!(results[0].prediction, PredictedValue::Number(_)));
        assert!(results[0].interval_width.unwrap() >= 0.0);
        assert!(results[0].confidence.is_none());
    }

    #[test]
    fn test_missing_feature_rejects_batch() {
        let artifact = artifact(Algorithm::RandomForest, "kind");
        let rows = vec![
            record(&[("x", 3.0.into()), ("grade", 0.0.into()), ("value", 1.6.into())]),
            record(&[("x", 3.0.into())]),
        ];
        let err = PredictionService::new().predict(&artifact, &rows).unwrap_err();
        match err {
            AutoMlError::MissingFeature { row, columns } => {
                assert_eq!(row, 1);
                assert_eq!(columns, vec!["grade", "value"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
