//! `AutoMl` facade
//!
//! Transport-agnostic entry point tying the session store, profiler, trainer,
//! model registry, prediction service and summary builder together.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifact::{generate_model_id, DatasetSnapshot, ModelArtifact, ModelRegistry};
use crate::config::AutoMlConfig;
use crate::dataset::{DatasetLoader, LoadedDataset};
use crate::error::{AutoMlError, Result};
use crate::evaluation::{EvaluationMetrics, FeatureImportance};
use crate::prediction::{PredictionResult, PredictionService};
use crate::preprocessing::Record;
use crate::profiling::{ProfileReport, Profiler};
use crate::schema::{Schema, SchemaInferencer};
use crate::session::{Session, SessionStore};
use crate::summary::{ModelSummary, SummaryBuilder, TextGenerator};
use crate::training::{Algorithm, ProblemType, TrainEngine, TrainRequest, TrainingInfo};

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub session_id: String,
    pub row_count: usize,
    pub column_count: usize,
    pub schema: Schema,
    pub warnings: Vec<String>,
}

/// Result of a successful training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model_id: String,
    /// Requested, configured or recommended
    pub algorithm: Algorithm,
    pub problem_type: ProblemType,
    pub evaluation_metrics: EvaluationMetrics,
    pub feature_importance: FeatureImportance,
    pub training_info: TrainingInfo,
}

/// Background training job status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running { started_at: DateTime<Utc> },
    Completed { outcome: TrainOutcome },
    Failed { error: String },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

pub struct AutoMl {
    config: AutoMlConfig,
    loader: DatasetLoader,
    inferencer: SchemaInferencer,
    profiler: Profiler,
    engine: TrainEngine,
    predictor: PredictionService,
    summaries: SummaryBuilder,
    sessions: SessionStore,
    registry: ModelRegistry,
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl std::fmt::Debug for AutoMl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoMl")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("jobs", &self.jobs.read().len())
            .finish()
    }
}

impl AutoMl {
    pub fn new(config: AutoMlConfig) -> Result<Self> {
        config.validate()?;
        let registry = match &config.models_dir {
            Some(dir) => ModelRegistry::open(dir)?,
            None => ModelRegistry::in_memory(),
        };
        info!(
            models_dir = ?config.models_dir,
            max_upload_bytes = config.max_upload_bytes,
            "AutoMl initialized"
        );
        Ok(Self {
            loader: DatasetLoader::new(config.max_upload_bytes),
            inferencer: SchemaInferencer::new(),
            profiler: Profiler::new(),
            engine: TrainEngine::new(&config),
            predictor: PredictionService::new(),
            summaries: SummaryBuilder::new(config.text_generation_timeout),
            sessions: SessionStore::new(),
            registry,
            jobs: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.summaries = self.summaries.with_generator(generator);
        self
    }

    pub fn config(&self) -> &AutoMlConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Parse delimited text into a new session
    pub fn upload(&self, bytes: &[u8]) -> Result<UploadResult> {
        let loaded = self.loader.load_bytes(bytes).inspect_err(|e| {
            warn!(error = %e, bytes = bytes.len(), "Upload rejected");
        })?;
        self.open_session(loaded)
    }

    pub fn upload_path(&self, path: impl AsRef<Path>) -> Result<UploadResult> {
        let loaded = self.loader.load_path(path.as_ref()).inspect_err(|e| {
            warn!(error = %e, path = %path.as_ref().display(), "Upload rejected");
        })?;
        self.open_session(loaded)
    }

    fn open_session(&self, loaded: LoadedDataset) -> Result<UploadResult> {
        let schema = self.inferencer.infer(&loaded.dataset)?;
        let session = self
            .sessions
            .create(loaded.dataset, schema, loaded.warnings);
        info!(
            session_id = %session.id,
            rows = session.dataset.n_rows(),
            columns = session.dataset.n_cols(),
            "Upload accepted"
        );
        Ok(UploadResult {
            session_id: session.id.clone(),
            row_count: session.dataset.n_rows(),
            column_count: session.dataset.n_cols(),
            schema: session.schema.clone(),
            warnings: session.warnings.clone(),
        })
    }

    pub fn session(&self, session_id: &str) -> Result<Arc<Session>> {
        self.sessions.get(session_id)
    }

    pub fn profile(&self, session_id: &str, target: Option<&str>) -> Result<ProfileReport> {
        let session = self.sessions.get(session_id)?;
        self.profiler.profile(&session.dataset, &session.schema, target)
    }

    /// Train, evaluate and register a model on a session's dataset
    pub fn train(&self, session_id: &str, request: &TrainRequest) -> Result<TrainOutcome> {
        let session = self.sessions.get(session_id)?;
        let model_id = generate_model_id(&session.id);
        let (pipeline, model) =
            self.engine
                .train(&session.dataset, &session.schema, request, model_id)?;

        let report = self.profiler.profile(&session.dataset, &session.schema, None)?;
        let artifact = ModelArtifact::new(
            pipeline,
            model,
            Some(session.id.clone()),
            Some(DatasetSnapshot::from_report(&report)),
        );
        let artifact = self.registry.insert(artifact)?;
        let model = &artifact.model;
        Ok(TrainOutcome {
            model_id: model.model_id.clone(),
            algorithm: model.algorithm,
            problem_type: model.problem_type,
            evaluation_metrics: model.evaluation_metrics.clone(),
            feature_importance: model.feature_importance.clone(),
            training_info: model.training_info.clone(),
        })
    }

    pub fn predict(&self, model_id: &str, rows: &[Record]) -> Result<Vec<PredictionResult>> {
        let artifact = self.registry.get(model_id)?;
        self.predictor.predict(&artifact, rows)
    }

    pub async fn model_summary(&self, model_id: &str) -> Result<ModelSummary> {
        let artifact = self.registry.get(model_id)?;
        Ok(self.summaries.summarize(&artifact).await)
    }

    /// Start training on a blocking worker and return a job id to poll
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_training(self: &Arc<Self>, session_id: &str, request: TrainRequest) -> Result<String> {
        self.sessions.get(session_id)?;
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            AutoMlError::invalid_parameter("runtime", "none", format!("no tokio runtime: {e}"))
        })?;

        let job_id = Uuid::new_v4().to_string();
        self.jobs.write().insert(job_id.clone(), JobStatus::Pending);

        let service = Arc::clone(self);
        let session = session_id.to_string();
        let id = job_id.clone();
        handle.spawn_blocking(move || {
            service.set_job(&id, JobStatus::Running { started_at: Utc::now() });
            let status = match service.train(&session, &request) {
                Ok(outcome) => {
                    info!(job_id = %id, model_id = %outcome.model_id, "Training job completed");
                    JobStatus::Completed { outcome }
                }
                Err(e) => {
                    error!(job_id = %id, error = %e, "Training job failed");
                    JobStatus::Failed { error: e.to_string() }
                }
            };
            service.set_job(&id, status);
        });

        info!(job_id = %job_id, session_id, "Training job queued");
        Ok(job_id)
    }

    pub fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().get(job_id).cloned()
    }

    /// Like [`job_status`](Self::job_status), but a finished job is removed once returned
    pub fn take_job_status(&self, job_id: &str) -> Option<JobStatus> {
        let mut jobs = self.jobs.write();
        if jobs.get(job_id)?.is_finished() {
            jobs.remove(job_id)
        } else {
            jobs.get(job_id).cloned()
        }
    }

    /// Tracked jobs, finished or not
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }

    fn set_job(&self, job_id: &str, status: JobStatus) {
        self.jobs.write().insert(job_id.to_string(), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv() -> Vec<u8> {
        let mut text = String::from("age,income,city,bought\n");
        for i in 0..60 {
            let age = 20 + i % 40;
            let income = 1000 + (i * 37) % 500;
            let city = ["paris", "berlin", "rome"][i % 3];
            let bought = if age > 40 { "yes" } else { "no" };
            text.push_str(&format!("{age},{income},{city},{bought}\n"));
        }
        text.into_bytes()
    }

    fn service() -> AutoMl {
        AutoMl::new(AutoMlConfig::in_memory().with_n_estimators(10)).unwrap()
    }

    #[test]
    fn test_upload_profile_train_predict() {
        let automl = service();
        let upload = automl.upload(&csv()).unwrap();
        assert_eq!(upload.row_count, 60);
        assert_eq!(upload.column_count, 4);

        let report = automl.profile(&upload.session_id, Some("bought")).unwrap();
        assert!(report.leakage.unwrap().checked);

        let outcome = automl
            .train(&upload.session_id, &TrainRequest::new("bought"))
            .unwrap();
        assert!(outcome.model_id.starts_with("model_"));

        let row: Record = [
            ("age".to_string(), "55".into()),
            ("income".to_string(), "1200".into()),
            ("city".to_string(), "rome".into()),
        ]
        .into_iter()
        .collect();
        let predictions = automl.predict(&outcome.model_id, &[row]).unwrap();
        assert_eq!(predictions.len(), 1);
        assert!(predictions[0].confidence.is_some());
    }

    #[test]
    fn test_unknown_ids() {
        let automl = service();
        assert!(matches!(
            automl.profile("nope", None),
            Err(AutoMlError::SessionNotFound(_))
        ));
        assert!(matches!(
            automl.predict("model_nope", &[]),
            Err(AutoMlError::ModelNotFound(_))
        ));
        assert!(automl.job_status("nope").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_background_training_completes() {
        let automl = Arc::new(service());
        let upload = automl.upload(&csv()).unwrap();
        let job_id = automl
            .spawn_training(&upload.session_id, TrainRequest::new("bought"))
            .unwrap();

        let mut status = automl.job_status(&job_id).unwrap();
        for _ in 0..600 {
            if status.is_finished() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            status = automl.job_status(&job_id).unwrap();
        }
        match status {
            JobStatus::Completed { outcome } => {
                let summary = automl.model_summary(&outcome.model_id).await.unwrap();
                assert_eq!(summary.target_column, "bought");
                assert!(summary.dataset.is_some());
            }
            other => panic!("job did not complete: {other:?}"),
        }

        assert!(automl.take_job_status(&job_id).unwrap().is_finished());
        assert!(automl.job_status(&job_id).is_none());
        assert_eq!(automl.job_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unfinished_job_is_kept_when_taken() {
        let automl = Arc::new(service());
        let upload = automl.upload(&csv()).unwrap();
        let job_id = automl
            .spawn_training(&upload.session_id, TrainRequest::new("bought"))
            .unwrap();

        let mut finished = false;
        for _ in 0..600 {
            match automl.take_job_status(&job_id) {
                Some(status) if status.is_finished() => {
                    finished = true;
                    break;
                }
                Some(_) => assert_eq!(automl.job_count(), 1),
                None => panic!("unfinished job was dropped"),
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        assert!(finished);
        assert!(automl.take_job_status(&job_id).is_none());
    }
}
