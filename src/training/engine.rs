//! Training engine implementation

use std::time::Instant;

use chrono::Utc;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::linear_models::LogisticRegression;
use super::random_forest::RandomForest;
use super::svm::{SVMClassifier, SVMConfig, SVMRegressor};
use super::xgboost::{XGBoostClassifier, XGBoostConfig, XGBoostRegressor};
use super::recommend::{recommend_algorithm, DatasetTraits};
use super::{infer_problem_type, Algorithm, EstimatorResult, ProblemType, TrainedModel, TrainingInfo};
use crate::config::{validate_test_fraction, AutoMlConfig};
use crate::dataset::Dataset;
use crate::error::{AutoMlError, EstimatorError, Result};
use crate::evaluation::{Evaluator, FeatureImportance};
use crate::preprocessing::{FittedPipeline, PreprocessingPipeline};
use crate::schema::Schema;

/// Parameters of one training run; unset fields fall back to the engine defaults
///
/// Without an algorithm here or in the engine configuration, one is recommended
/// from the dataset's size, width and problem type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub target_column: String,
    pub algorithm: Option<Algorithm>,
    pub test_fraction: Option<f64>,
    pub seed: Option<u64>,
}

impl TrainRequest {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            algorithm: None,
            test_fraction: None,
            seed: None,
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Fitted estimator state, one variant per algorithm and problem type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum FittedEstimator {
    RandomForestClassifier(RandomForest),
    RandomForestRegressor(RandomForest),
    LogisticRegression(LogisticRegression),
    XGBoostClassifier(XGBoostClassifier),
    XGBoostRegressor(XGBoostRegressor),
    SVMClassifier(SVMClassifier),
    SVMRegressor(SVMRegressor),
}

impl FittedEstimator {
    /// Fit the estimator for `algorithm` on encoded targets
    pub fn fit(
        algorithm: Algorithm,
        problem_type: ProblemType,
        n_classes: usize,
        n_estimators: usize,
        seed: u64,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> EstimatorResult<Self> {
        let classification = problem_type == ProblemType::Classification;
        let model = match algorithm {
            Algorithm::RandomForest if classification => {
                let mut rf = RandomForest::new_classifier(n_estimators)
                    .with_random_state(seed)
                    .with_n_classes(n_classes);
                rf.fit(x, y)?;
                FittedEstimator::RandomForestClassifier(rf)
            }
            Algorithm::RandomForest => {
                let mut rf = RandomForest::new_regressor(n_estimators).with_random_state(seed);
                rf.fit(x, y)?;
                FittedEstimator::RandomForestRegressor(rf)
            }
            Algorithm::LogisticRegression => {
                let mut lr = LogisticRegression::new().with_n_classes(n_classes);
                lr.fit(x, y)?;
                FittedEstimator::LogisticRegression(lr)
            }
            Algorithm::Xgboost => {
                let config = XGBoostConfig {
                    n_estimators,
                    random_state: seed,
                    ..Default::default()
                };
                if classification {
                    let mut model = XGBoostClassifier::new(config).with_n_classes(n_classes);
                    model.fit(x, y)?;
                    FittedEstimator::XGBoostClassifier(model)
                } else {
                    let mut model = XGBoostRegressor::new(config);
                    model.fit(x, y)?;
                    FittedEstimator::XGBoostRegressor(model)
                }
            }
            Algorithm::Svm => {
                let config = SVMConfig {
                    kernel: SVMConfig::rbf_for(x.ncols()),
                    random_state: seed,
                    ..Default::default()
                };
                if classification {
                    let mut model = SVMClassifier::new(config).with_n_classes(n_classes);
                    model.fit(x, y)?;
                    FittedEstimator::SVMClassifier(model)
                } else {
                    let mut model = SVMRegressor::new(config);
                    model.fit(x, y)?;
                    FittedEstimator::SVMRegressor(model)
                }
            }
        };
        Ok(model)
    }

    /// Class indices for classifiers, values for regressors
    pub fn predict(&self, x: &Array2<f64>) -> EstimatorResult<Array1<f64>> {
        match self {
            FittedEstimator::RandomForestClassifier(m) | FittedEstimator::RandomForestRegressor(m) => {
                m.predict(x)
            }
            FittedEstimator::LogisticRegression(m) => m.predict(x),
            FittedEstimator::XGBoostClassifier(m) => m.predict(x),
            FittedEstimator::XGBoostRegressor(m) => m.predict(x),
            FittedEstimator::SVMClassifier(m) => m.predict(x),
            FittedEstimator::SVMRegressor(m) => m.predict(x),
        }
    }

    /// Native class probabilities, `None` when the estimator has none
    pub fn predict_proba(&self, x: &Array2<f64>) -> EstimatorResult<Option<Array2<f64>>> {
        match self {
            FittedEstimator::RandomForestClassifier(m) => m.predict_proba(x).map(Some),
            FittedEstimator::LogisticRegression(m) => m.predict_proba(x).map(Some),
            FittedEstimator::XGBoostClassifier(m) => m.predict_proba(x).map(Some),
            _ => Ok(None),
        }
    }

    /// Prediction interval width per row, `None` when unsupported
    pub fn interval_width(&self, x: &Array2<f64>) -> EstimatorResult<Option<Array1<f64>>> {
        match self {
            FittedEstimator::RandomForestRegressor(m) => m.prediction_interval_width(x).map(Some),
            _ => Ok(None),
        }
    }

    /// Raw importances: impurity decrease, total gain or mean |coefficient|
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            FittedEstimator::RandomForestClassifier(m) | FittedEstimator::RandomForestRegressor(m) => {
                m.feature_importances().cloned()
            }
            FittedEstimator::LogisticRegression(m) => m.feature_importances(),
            FittedEstimator::XGBoostClassifier(m) => m.feature_importances(),
            FittedEstimator::XGBoostRegressor(m) => m.feature_importances(),
            FittedEstimator::SVMClassifier(_) | FittedEstimator::SVMRegressor(_) => None,
        }
    }
}

/// Runs the preprocessing, fitting and evaluation steps of one training request
#[derive(Debug, Clone)]
pub struct TrainEngine {
    default_algorithm: Option<Algorithm>,
    default_test_fraction: f64,
    default_seed: u64,
    n_estimators: usize,
    preprocessing: PreprocessingPipeline,
}

impl Default for TrainEngine {
    fn default() -> Self {
        Self::new(&AutoMlConfig::in_memory())
    }
}

impl TrainEngine {
    pub fn new(config: &AutoMlConfig) -> Self {
        Self {
            default_algorithm: config.default_algorithm,
            default_test_fraction: config.default_test_fraction,
            default_seed: config.default_seed,
            n_estimators: config.n_estimators,
            preprocessing: PreprocessingPipeline::new().with_scaling(config.scale_numeric),
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Train and evaluate a model under `model_id`
    pub fn train(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        request: &TrainRequest,
        model_id: impl Into<String>,
    ) -> Result<(FittedPipeline, TrainedModel)> {
        let start = Instant::now();
        let target = request.target_column.as_str();
        let test_fraction = request.test_fraction.unwrap_or(self.default_test_fraction);
        let seed = request.seed.unwrap_or(self.default_seed);
        validate_test_fraction(test_fraction)?;

        let target_schema = schema.require(target)?;
        let target_column = dataset
            .column(target)
            .ok_or_else(|| AutoMlError::UnknownColumn(target.to_string()))?;
        let problem_type = infer_problem_type(target_column, target_schema);
        let algorithm = match request.algorithm.or(self.default_algorithm) {
            Some(algorithm) => algorithm,
            None => {
                let traits = DatasetTraits::measure(dataset, schema, target);
                let recommendation = recommend_algorithm(&traits, problem_type);
                info!(
                    algorithm = %recommendation.algorithm,
                    score = recommendation.score,
                    rows = traits.rows,
                    features = traits.features,
                    reasons = ?recommendation.reasons,
                    "Algorithm recommended"
                );
                recommendation.algorithm
            }
        };
        algorithm.ensure_supports(problem_type)?;

        info!(
            target,
            %algorithm,
            %problem_type,
            seed,
            test_fraction,
            rows = dataset.n_rows(),
            "Training started"
        );

        let prepared = self.preprocessing.prepare(
            dataset,
            schema,
            target,
            problem_type,
            test_fraction,
            seed,
        )?;
        let pipeline = prepared.pipeline;
        let class_labels = pipeline.target.class_labels().to_vec();

        let fit_start = Instant::now();
        let estimator = FittedEstimator::fit(
            algorithm,
            problem_type,
            class_labels.len(),
            self.n_estimators,
            seed,
            &prepared.x_train,
            &prepared.y_train,
        )
        .map_err(|source| self.training_failed(algorithm, &prepared.x_train, seed, source))?;
        let fit_ms = fit_start.elapsed().as_millis() as u64;

        let y_pred = estimator
            .predict(&prepared.x_test)
            .map_err(|source| self.training_failed(algorithm, &prepared.x_test, seed, source))?;
        let evaluation_metrics =
            Evaluator::evaluate(problem_type, &prepared.y_test, &y_pred, &class_labels)?;

        let feature_importance = match estimator.feature_importances() {
            Some(raw) => FeatureImportance::from_raw(&pipeline.feature_names, &raw),
            None => FeatureImportance::not_available(format!(
                "{algorithm} does not expose feature importance"
            )),
        };

        let training_info = TrainingInfo {
            train_samples: prepared.train_rows.len(),
            test_samples: prepared.test_rows.len(),
            features_before_encoding: pipeline.transforms.len(),
            features_after_encoding: pipeline.n_features(),
            dropped_target_rows: prepared.dropped_target_rows,
            dropped_columns: pipeline
                .dropped_columns
                .iter()
                .map(|d| d.name.clone())
                .collect(),
            stratified: prepared.stratified,
            duration_ms: start.elapsed().as_millis() as u64,
            trained_at: Utc::now(),
        };

        let model = TrainedModel {
            model_id: model_id.into(),
            problem_type,
            algorithm,
            target_column: target.to_string(),
            feature_names: pipeline.feature_names.clone(),
            class_labels,
            estimator,
            seed,
            evaluation_metrics,
            feature_importance,
            training_info,
        };

        let (metric, score) = model.evaluation_metrics.primary();
        info!(
            model_id = %model.model_id,
            %algorithm,
            %problem_type,
            seed,
            fit_ms,
            total_ms = model.training_info.duration_ms,
            metric,
            score,
            "Training finished"
        );

        Ok((pipeline, model))
    }

    fn training_failed(
        &self,
        algorithm: Algorithm,
        x: &Array2<f64>,
        seed: u64,
        source: EstimatorError,
    ) -> AutoMlError {
        AutoMlError::TrainingFailed {
            algorithm: algorithm.to_string(),
            rows: x.nrows(),
            features: x.ncols(),
            seed,
            source,
        }
    }
}
