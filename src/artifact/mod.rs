//! Model artifacts and the model registry
//!
//! An artifact bundles the fitted pipeline, the trained model and metadata
//! under one model id. On disk it is a JSON envelope
//! `{format_version, checksum, payload}` where `checksum` is the SHA-256 of the
//! serialized payload; loading recomputes and compares it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AutoMlError, Result};
use crate::preprocessing::FittedPipeline;
use crate::profiling::{DatasetStats, ProfileReport, QualityLevel};
use crate::training::TrainedModel;

/// Envelope format written by this version
pub const FORMAT_VERSION: u32 = 2;

/// Aggregated statistics of the training dataset, kept for summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub stats: DatasetStats,
    pub quality_score: f64,
    pub quality_level: QualityLevel,
    pub completeness: f64,
    pub notable_correlations: usize,
    pub strong_correlations: usize,
}

impl DatasetSnapshot {
    pub fn from_report(report: &ProfileReport) -> Self {
        Self {
            stats: report.dataset.clone(),
            quality_score: report.quality.overall_score,
            quality_level: report.quality.level,
            completeness: report.quality.completeness,
            notable_correlations: report.notable_correlations.len(),
            strong_correlations: report.strong_correlations().count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_id: String,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub dataset: Option<DatasetSnapshot>,
}

/// Everything needed to serve and describe one trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub pipeline: FittedPipeline,
    pub model: TrainedModel,
}

impl ModelArtifact {
    pub fn new(
        pipeline: FittedPipeline,
        model: TrainedModel,
        session_id: Option<String>,
        dataset: Option<DatasetSnapshot>,
    ) -> Self {
        Self {
            metadata: ArtifactMetadata {
                model_id: model.model_id.clone(),
                session_id,
                created_at: Utc::now(),
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                dataset,
            },
            pipeline,
            model,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model.model_id
    }

    /// Serialize into a checksummed envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_value(self)?;
        let checksum = compute_sha256(&serde_json::to_vec(&payload)?);
        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            checksum,
            payload,
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Parse an envelope, verifying version and checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(AutoMlError::Serialization(format!(
                "unsupported artifact format version {}",
                envelope.format_version
            )));
        }
        let actual = compute_sha256(&serde_json::to_vec(&envelope.payload)?);
        if actual != envelope.checksum {
            let model_id = envelope
                .payload
                .pointer("/model/model_id")
                .and_then(|v| v.as_str())
                .unwrap_or("<unknown>");
            return Err(AutoMlError::IntegrityError(model_id.to_string()));
        }
        Ok(serde_json::from_value(envelope.payload)?)
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    checksum: String,
    payload: serde_json::Value,
}

/// Hex SHA-256 digest
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// `model_<first 8 chars of the session id>_<8 hex chars>`
pub fn generate_model_id(session_id: &str) -> String {
    let prefix: String = session_id.chars().filter(|c| c.is_ascii_alphanumeric()).take(8).collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("model_{}_{}", prefix, &suffix[..8])
}

/// Append-once registry of model artifacts, optionally backed by a directory
///
/// Entries are shared as `Arc<ModelArtifact>` and never replaced once inserted.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelArtifact>>>,
    root: Option<PathBuf>,
}

impl ModelRegistry {
    /// Registry without disk persistence
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Registry persisting artifacts as `<root>/<model_id>.json`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            models: RwLock::new(HashMap::new()),
            root: Some(root),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Insert a new artifact; an id that already exists fails with `DuplicateIdentifier`
    pub fn insert(&self, artifact: ModelArtifact) -> Result<Arc<ModelArtifact>> {
        let model_id = artifact.model_id().to_string();
        check_model_id(&model_id)?;

        let mut models = self.models.write();
        let path = self.path_for(&model_id);
        if models.contains_key(&model_id) || path.as_ref().is_some_and(|p| p.exists()) {
            return Err(AutoMlError::DuplicateIdentifier(model_id));
        }

        if let Some(path) = &path {
            let bytes = artifact.to_bytes()?;
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, &bytes)?;
            fs::rename(&tmp, path)?;
            info!(model_id = %model_id, path = %path.display(), bytes = bytes.len(), "Artifact persisted");
        }

        let artifact = Arc::new(artifact);
        models.insert(model_id, Arc::clone(&artifact));
        Ok(artifact)
    }

    /// Look up an artifact, loading it from disk on first use
    pub fn get(&self, model_id: &str) -> Result<Arc<ModelArtifact>> {
        if let Some(artifact) = self.models.read().get(model_id) {
            return Ok(Arc::clone(artifact));
        }
        check_model_id(model_id)?;

        let path = self
            .path_for(model_id)
            .filter(|p| p.exists())
            .ok_or_else(|| AutoMlError::ModelNotFound(model_id.to_string()))?;
        let artifact = ModelArtifact::from_bytes(&fs::read(&path)?)?;
        if artifact.model_id() != model_id {
            return Err(AutoMlError::IntegrityError(model_id.to_string()));
        }
        info!(model_id, path = %path.display(), "Artifact loaded");

        // A concurrent load may have won; keep whichever entry came first
        let mut models = self.models.write();
        let entry = models
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(artifact));
        Ok(Arc::clone(entry))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.read().contains_key(model_id)
            || self.path_for(model_id).is_some_and(|p| p.exists())
    }

    /// Known model ids, sorted
    pub fn ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.models.read().keys().cloned().collect();
        if let Some(root) = &self.root {
            for entry in fs::read_dir(root)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        ids.dedup();
        debug!(count = ids.len(), "Listed model ids");
        Ok(ids)
    }

    fn path_for(&self, model_id: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(format!("{model_id}.json")))
    }
}

fn check_model_id(model_id: &str) -> Result<()> {
    let valid = !model_id.is_empty()
        && model_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AutoMlError::ModelNotFound(model_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Value};
    use crate::schema::SchemaInferencer;
    use crate::training::{TrainEngine, TrainRequest};

    fn artifact(model_id: &str) -> ModelArtifact {
        let n = 40;
        let ds = Dataset::from_columns(vec![
            ("x", (0..n).map(|i| Value::from(i as f64)).collect::<Vec<_>>()),
            ("y", (0..n).map(|i| Value::from(if i < 20 { "lo" } else { "hi" })).collect()),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let (pipeline, model) = TrainEngine::default()
            .with_n_estimators(5)
            .train(&ds, &schema, &TrainRequest::new("y"), model_id)
            .unwrap();
        ModelArtifact::new(pipeline, model, Some("session".to_string()), None)
    }

    #[test]
    fn test_model_id_format() {
        let id = generate_model_id("3f2a9c1e-aaaa-bbbb");
        assert!(id.starts_with("model_3f2a9c1e_"));
        assert_eq!(id.len(), "model_".len() + 8 + 1 + 8);
    }

    #[test]
    fn test_envelope_detects_tampering() {
        let bytes = artifact("model_a").to_bytes().unwrap();
        assert!(ModelArtifact::from_bytes(&bytes).is_ok());

        let text = String::from_utf8(bytes).unwrap();
        let tampered = text.replacen("\"target_column\":\"y\"", "\"target_column\":\"z\"", 1);
        assert_ne!(text, tampered);
        assert!(matches!(
            ModelArtifact::from_bytes(tampered.as_bytes()),
            Err(AutoMlError::IntegrityError(_))
        ));
    }

    #[test]
    fn test_registry_is_append_once() {
        let registry = ModelRegistry::in_memory();
        registry.insert(artifact("model_a")).unwrap();
        assert!(matches!(
            registry.insert(artifact("model_a")),
            Err(AutoMlError::DuplicateIdentifier(_))
        ));
        assert!(matches!(registry.get("model_b"), Err(AutoMlError::ModelNotFound(_))));
        assert!(matches!(registry.get("../etc"), Err(AutoMlError::ModelNotFound(_))));
    }

    #[test]
    fn test_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let original = artifact("model_disk");
        ModelRegistry::open(dir.path()).unwrap().insert(original.clone()).unwrap();

        let reopened = ModelRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.ids().unwrap(), vec!["model_disk"]);
        let loaded = reopened.get("model_disk").unwrap();
        assert_eq!(
            serde_json::to_string(&*loaded).unwrap(),
            serde_json::to_string(&original).unwrap()
        );
    }
}
