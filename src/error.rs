//! Error types for the profiling and AutoML pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AutoMlError>;

/// Coarse classification of failures, used by callers to map errors onto a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad file, unknown column, size limits, bad parameters
    InputValidation,
    /// Degenerate target, insufficient rows, no usable features, empty test split
    DataShape,
    /// Estimator failures, wrapped with context
    Training,
    /// Prediction-time schema mismatches and estimator failures
    Prediction,
    /// Unknown session or model identifier
    NotFound,
    /// IO, serialization and integrity problems
    Internal,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum AutoMlError {
    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Target column '{column}' has a single distinct value")]
    DegenerateTarget { column: String },

    #[error("Insufficient data: {rows} usable rows, at least {minimum} required")]
    InsufficientData { rows: usize, minimum: usize },

    #[error("Algorithm '{algorithm}' does not support {problem_type}")]
    IncompatibleAlgorithm {
        algorithm: String,
        problem_type: String,
    },

    #[error("Training {algorithm} failed on {rows} rows x {features} features (seed {seed}): {source}")]
    TrainingFailed {
        algorithm: String,
        rows: usize,
        features: usize,
        seed: u64,
        #[source]
        source: EstimatorError,
    },

    #[error("Prediction with model '{model_id}' failed on {rows} rows x {features} features: {source}")]
    PredictionFailed {
        model_id: String,
        rows: usize,
        features: usize,
        #[source]
        source: EstimatorError,
    },

    #[error("No usable feature columns remain after dropping {dropped} of them")]
    NoUsableFeatures { dropped: usize },

    #[error("Cannot evaluate on an empty test split")]
    EmptyTestSet,

    #[error("Row {row} is missing required feature columns: {}", .columns.join(", "))]
    MissingFeature { row: usize, columns: Vec<String> },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Identifier already registered: {0}")]
    DuplicateIdentifier(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Artifact integrity check failed for {0}")]
    IntegrityError(String),
}

impl AutoMlError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutoMlError::EmptyDataset(_)
            | AutoMlError::UnknownColumn(_)
            | AutoMlError::InvalidFormat(_)
            | AutoMlError::FileTooLarge { .. }
            | AutoMlError::IncompatibleAlgorithm { .. }
            | AutoMlError::InvalidParameter { .. } => ErrorKind::InputValidation,
            AutoMlError::DegenerateTarget { .. }
            | AutoMlError::InsufficientData { .. }
            | AutoMlError::NoUsableFeatures { .. }
            | AutoMlError::EmptyTestSet => ErrorKind::DataShape,
            AutoMlError::TrainingFailed { .. } => ErrorKind::Training,
            AutoMlError::MissingFeature { .. } | AutoMlError::PredictionFailed { .. } => {
                ErrorKind::Prediction
            }
            AutoMlError::SessionNotFound(_) | AutoMlError::ModelNotFound(_) => ErrorKind::NotFound,
            AutoMlError::DuplicateIdentifier(_)
            | AutoMlError::ModelNotFitted
            | AutoMlError::Io(_)
            | AutoMlError::Serialization(_)
            | AutoMlError::IntegrityError(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_parameter(
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        AutoMlError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures raised inside an estimator while fitting or predicting
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimatorError {
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Non-finite values after {iterations} iterations")]
    Diverged { iterations: usize },

    #[error("Need at least {required} samples, got {actual}")]
    TooFewSamples { required: usize, actual: usize },

    #[error("Too many samples for kernel matrix: {actual} > {limit}")]
    TooManySamples { actual: usize, limit: usize },

    #[error("Need at least 2 classes, got {0}")]
    TooFewClasses(usize),

    #[error("Estimator is not fitted")]
    NotFitted,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<polars::error::PolarsError> for AutoMlError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoMlError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for AutoMlError {
    fn from(err: serde_json::Error) -> Self {
        AutoMlError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoMlError::UnknownColumn("price".to_string());
        assert_eq!(err.to_string(), "Unknown column: price");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoMlError = io_err.into();
        assert!(matches!(err, AutoMlError::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_training_failed_keeps_source() {
        use std::error::Error as _;
        let err = AutoMlError::TrainingFailed {
            algorithm: "svm".to_string(),
            rows: 20_000,
            features: 4,
            seed: 7,
            source: EstimatorError::TooManySamples { actual: 20_000, limit: 10_000 },
        };
        assert_eq!(err.kind(), ErrorKind::Training);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("seed 7"));
    }

    #[test]
    fn test_prediction_failed_is_a_prediction_error() {
        use std::error::Error as _;
        let err = AutoMlError::PredictionFailed {
            model_id: "model_1".to_string(),
            rows: 3,
            features: 5,
            source: EstimatorError::ShapeError {
                expected: "5 features".to_string(),
                actual: "4 features".to_string(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::Prediction);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("model_1"));
    }

    #[test]
    fn test_no_usable_features_is_a_data_shape_error() {
        let err = AutoMlError::NoUsableFeatures { dropped: 2 };
        assert_eq!(err.kind(), ErrorKind::DataShape);
    }

    #[test]
    fn test_missing_feature_lists_columns() {
        let err = AutoMlError::MissingFeature {
            row: 2,
            columns: vec!["age".to_string(), "city".to_string()],
        };
        assert_eq!(err.to_string(), "Row 2 is missing required feature columns: age, city");
        assert_eq!(err.kind(), ErrorKind::Prediction);
    }
}
