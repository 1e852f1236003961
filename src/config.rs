//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutoMlError, Result};
use crate::training::Algorithm;

/// Configuration for the AutoML facade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoMlConfig {
    /// Uploads larger than this are rejected with `FileTooLarge`
    pub max_upload_bytes: usize,

    /// Directory for persisted artifacts; `None` keeps models in memory only
    pub models_dir: Option<PathBuf>,

    /// Held-out fraction used when a train request does not supply one
    pub default_test_fraction: f64,

    /// Seed used when a train request does not supply one
    pub default_seed: u64,

    /// Algorithm used when a train request does not name one; `None` recommends one per dataset
    pub default_algorithm: Option<Algorithm>,

    /// Trees for random forest, boosting rounds for xgboost
    pub n_estimators: usize,

    /// How long the summary waits for the text generator
    pub text_generation_timeout: Duration,

    /// Standard-scale numerical and datetime features
    pub scale_numeric: bool,
}

impl Default for AutoMlConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: std::env::var("INSIGHT_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50 * 1024 * 1024), // 50MB
            models_dir: Some(
                std::env::var("INSIGHT_MODELS_DIR")
                    .unwrap_or_else(|_| "./data/models".to_string())
                    .into(),
            ),
            default_test_fraction: 0.2,
            default_seed: 42,
            default_algorithm: None,
            n_estimators: std::env::var("INSIGHT_N_ESTIMATORS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            text_generation_timeout: Duration::from_secs(
                std::env::var("INSIGHT_LLM_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            scale_numeric: true,
        }
    }
}

impl AutoMlConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::default().with_models_dir(None::<PathBuf>)
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_models_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.models_dir = dir.map(Into::into);
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.default_test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.default_seed = seed;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.default_algorithm = Some(algorithm);
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_text_generation_timeout(mut self, timeout: Duration) -> Self {
        self.text_generation_timeout = timeout;
        self
    }

    pub fn with_scale_numeric(mut self, scale: bool) -> Self {
        self.scale_numeric = scale;
        self
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(AutoMlError::invalid_parameter(
                "max_upload_bytes",
                self.max_upload_bytes,
                "must be positive",
            ));
        }
        validate_test_fraction(self.default_test_fraction)?;
        if self.n_estimators == 0 {
            return Err(AutoMlError::invalid_parameter(
                "n_estimators",
                self.n_estimators,
                "must be at least 1",
            ));
        }
        if self.text_generation_timeout.is_zero() {
            return Err(AutoMlError::invalid_parameter(
                "text_generation_timeout",
                format!("{:?}", self.text_generation_timeout),
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Test fraction must lie strictly between 0 and 1
pub fn validate_test_fraction(fraction: f64) -> Result<()> {
    if fraction.is_finite() && fraction > 0.0 && fraction < 1.0 {
        Ok(())
    } else {
        Err(AutoMlError::invalid_parameter(
            "test_fraction",
            fraction,
            "must lie in (0, 1)",
        ))
    }
}
