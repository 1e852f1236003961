//! Insight AutoML - Dataset profiling and reproducible model training
//!
//! This crate takes a delimited text file from upload to served predictions:
//! - Schema inference with semantic column types
//! - Statistical profiling, correlation, leakage and data quality checks
//! - Deterministic preprocessing, training and evaluation
//! - Checksummed model artifacts and a prediction service
//! - Model summaries with an optional external text generator
//!
//! # Modules
//!
//! ## Data
//! - [`dataset`] - Raw cells, columns and the CSV loader
//! - [`schema`] - Column type inference
//! - [`profiling`] - Column statistics, correlation, leakage, quality, target suggestions
//!
//! ## Modeling
//! - [`preprocessing`] - Imputation, encoding, scaling and the train/test split
//! - [`training`] - Estimators and the training engine
//! - [`evaluation`] - Held-out metrics and feature importance
//!
//! ## Serving
//! - [`artifact`] - Model artifacts and the model registry
//! - [`prediction`] - Prediction on new rows
//! - [`summary`] - Model summaries and insights
//! - [`session`] - Uploaded dataset sessions
//! - [`service`] - The [`AutoMl`] facade tying everything together
//! - [`cli`] - Command-line interface

// Core error handling and settings
pub mod config;
pub mod error;
pub mod thresholds;

// Data
pub mod dataset;
pub mod profiling;
pub mod schema;

// Modeling
pub mod evaluation;
pub mod preprocessing;
pub mod training;

// Serving
pub mod artifact;
pub mod prediction;
pub mod service;
pub mod session;
pub mod summary;

pub mod cli;

pub use config::AutoMlConfig;
pub use error::{AutoMlError, Result};
pub use service::{AutoMl, JobStatus, TrainOutcome, UploadResult};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AutoMlError, ErrorKind, Result};

    // Data
    pub use crate::dataset::{Dataset, DatasetLoader, Value};
    pub use crate::schema::{ColumnType, Schema, SchemaInferencer};
    pub use crate::profiling::{ProfileReport, Profiler, TargetRecommendation};

    // Modeling
    pub use crate::preprocessing::{FittedPipeline, Record};
    pub use crate::training::{Algorithm, ProblemType, TrainEngine, TrainRequest, TrainedModel};
    pub use crate::evaluation::{EvaluationMetrics, FeatureImportance};

    // Serving
    pub use crate::artifact::{ModelArtifact, ModelRegistry};
    pub use crate::prediction::{PredictedValue, PredictionResult, PredictionService};
    pub use crate::summary::{ModelSummary, SummaryBuilder, TextGenerationError, TextGenerator};
    pub use crate::service::{AutoMl, JobStatus};
    pub use crate::config::AutoMlConfig;
}
