//! Dataset profiling
//!
//! Builds a [`ProfileReport`] from a dataset and its inferred schema:
//! per-column statistics, a Pearson correlation matrix over numerical columns,
//! target leakage flags, a data quality score and target suggestions.
//! Profiling is read-only and deterministic; the same inputs always give an
//! identical report.

pub mod correlation;
pub mod leakage;
pub mod quality;
pub mod stats;
pub mod targets;

pub use correlation::{correlation_matrix, notable_pairs, pearson, CorrelationMatrix, CorrelationPair};
pub use leakage::{detect_leakage, LeakageFlag, LeakageReason, LeakageReport, LeakageSeverity};
pub use quality::{DataQualityReport, DataQualityScorer, QualityLevel, QualityWarning};
pub use stats::{ColumnDetails, ColumnProfile, NumericStats};
pub use targets::{recommend_targets, TargetRecommendation};

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::Dataset;
use crate::error::Result;
use crate::schema::{ColumnType, Schema};

/// Dataset-level statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub row_count: usize,
    pub column_count: usize,
    pub memory_bytes: usize,
    pub missing_values_total: usize,
    /// Missing cells over all cells
    pub missing_percentage: f64,
    pub duplicate_rows: usize,
    pub numerical_columns: usize,
    pub categorical_columns: usize,
    pub boolean_columns: usize,
    pub datetime_columns: usize,
}

/// Full profile of one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileReport {
    pub dataset: DatasetStats,
    pub columns: Vec<ColumnProfile>,
    pub correlation: CorrelationMatrix,
    pub notable_correlations: Vec<CorrelationPair>,
    /// Present only when a target column was given
    pub leakage: Option<LeakageReport>,
    pub quality: DataQualityReport,
    pub target_recommendations: Vec<TargetRecommendation>,
}

impl ProfileReport {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Notable pairs above the strong-correlation threshold
    pub fn strong_correlations(&self) -> impl Iterator<Item = &CorrelationPair> {
        self.notable_correlations
            .iter()
            .filter(|p| p.correlation.abs() > crate::thresholds::STRONG_CORRELATION_THRESHOLD)
    }
}

/// Computes profile reports
#[derive(Debug, Clone, Default)]
pub struct Profiler;

impl Profiler {
    pub fn new() -> Self {
        Self
    }

    /// Profile `dataset`, checking leakage against `target` when given
    pub fn profile(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        target: Option<&str>,
    ) -> Result<ProfileReport> {
        let start = Instant::now();
        dataset.ensure_not_empty()?;
        if let Some(target) = target {
            schema.require(target)?;
        }

        let columns: Vec<ColumnProfile> = dataset
            .columns()
            .par_iter()
            .zip(schema.columns.par_iter())
            .map(|(column, column_schema)| stats::profile_column(column, column_schema))
            .collect();

        let numeric_inputs: Vec<(String, Vec<Option<f64>>)> = dataset
            .columns()
            .iter()
            .zip(&schema.columns)
            .filter(|(_, s)| s.inferred_type == ColumnType::Numerical)
            .map(|(c, _)| (c.name.clone(), c.values.iter().map(|v| v.as_f64()).collect()))
            .collect();
        let correlation = correlation_matrix(&numeric_inputs);
        let notable_correlations = notable_pairs(&correlation);

        let leakage = target.map(|t| detect_leakage(dataset, schema, t));
        let duplicate_rows = dataset.duplicate_row_count();
        let quality = DataQualityScorer::score(schema, duplicate_rows);
        let dataset_stats = dataset_stats(dataset, schema, duplicate_rows);
        let target_recommendations = recommend_targets(dataset, schema);

        info!(
            rows = dataset_stats.row_count,
            columns = dataset_stats.column_count,
            quality = quality.overall_score,
            leakage_flags = leakage.as_ref().map(|l| l.flags.len()).unwrap_or(0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Profile generated"
        );

        Ok(ProfileReport {
            dataset: dataset_stats,
            columns,
            correlation,
            notable_correlations,
            leakage,
            quality,
            target_recommendations,
        })
    }
}

fn dataset_stats(dataset: &Dataset, schema: &Schema, duplicate_rows: usize) -> DatasetStats {
    let missing_values_total: usize = schema.columns.iter().map(|c| c.null_count).sum();
    let cells = dataset.n_rows() * dataset.n_cols();
    let count = |ty: ColumnType| schema.columns.iter().filter(|c| c.inferred_type == ty).count();
    DatasetStats {
        row_count: dataset.n_rows(),
        column_count: dataset.n_cols(),
        memory_bytes: dataset.estimated_memory_bytes(),
        missing_values_total,
        missing_percentage: if cells == 0 {
            0.0
        } else {
            missing_values_total as f64 / cells as f64
        },
        duplicate_rows,
        numerical_columns: count(ColumnType::Numerical),
        categorical_columns: count(ColumnType::Categorical),
        boolean_columns: count(ColumnType::Boolean),
        datetime_columns: count(ColumnType::Datetime),
    }
}
