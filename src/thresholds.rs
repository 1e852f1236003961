//! Heuristic constants shared by schema inference, profiling, preprocessing and training.
//!
//! Every cutoff the pipeline applies lives here so that behavior is defined once
//! and tests can assert against the same values the code uses.

/// Non-null values inspected per column when deciding its type (first N in row order)
pub const SCHEMA_SAMPLE_SIZE: usize = 1000;

/// Fraction of sampled values that must parse as numbers for a numerical column
pub const NUMERIC_PARSE_RATIO: f64 = 0.9;

/// Fraction of sampled values that must parse with a known format for a datetime column
pub const DATETIME_PARSE_RATIO: f64 = 0.9;

/// unique_count / row_count above which a non-numerical column is high-cardinality
pub const HIGH_CARDINALITY_RATIO: f64 = 0.9;

/// Accepted textual spellings of booleans, as (true, false) pairs (compared lowercase)
pub const BOOLEAN_LEXICON: &[(&str, &str)] = &[("true", "false"), ("yes", "no"), ("y", "n"), ("t", "f")];

/// Tokens the loader treats as missing (compared case-insensitively after trimming)
pub const NULL_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

/// Datetime formats tried in order; all values are interpreted as UTC
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

/// Size of the categorical frequency table
pub const TOP_VALUES_LIMIT: usize = 10;

/// Sample values returned per column at upload
pub const SAMPLE_VALUES_LIMIT: usize = 5;

/// IQR fence multiplier for outlier detection
pub const OUTLIER_IQR_MULTIPLIER: f64 = 1.5;

/// Minimum non-null values before outliers are looked for
pub const OUTLIER_MIN_VALUES: usize = 4;

/// Maximum outlier row indices reported per column
pub const OUTLIER_INDEX_LIMIT: usize = 50;

/// |r| with the target above which leakage severity is high
pub const LEAKAGE_HIGH_THRESHOLD: f64 = 0.95;

/// |r| with the target above which leakage severity is medium
pub const LEAKAGE_MEDIUM_THRESHOLD: f64 = 0.85;

/// |r| above which a column pair is reported as a notable correlation
pub const NOTABLE_CORRELATION_THRESHOLD: f64 = 0.3;

/// |r| above which a column pair counts as strongly correlated in summaries
pub const STRONG_CORRELATION_THRESHOLD: f64 = 0.7;

/// Weight of completeness (1 - mean null fraction) in the quality score
pub const QUALITY_WEIGHT_COMPLETENESS: f64 = 1.0 / 3.0;

/// Weight of uniqueness (1 - duplicate row ratio) in the quality score
pub const QUALITY_WEIGHT_UNIQUENESS: f64 = 1.0 / 3.0;

/// Weight of consistency (1 - constant-or-empty column ratio) in the quality score
pub const QUALITY_WEIGHT_CONSISTENCY: f64 = 1.0 / 3.0;

/// Quality score at or above which data quality is "high"
pub const QUALITY_HIGH_SCORE: f64 = 0.8;

/// Quality score at or above which data quality is "moderate"
pub const QUALITY_MODERATE_SCORE: f64 = 0.6;

/// Categorical columns with at most this many categories are one-hot encoded
pub const ONE_HOT_MAX_CATEGORIES: usize = 10;

/// Mean null fraction of numerical feature columns above which they are median-imputed
pub const MEDIAN_IMPUTATION_MISSING_RATIO: f64 = 0.2;

/// Outlier fraction above which a numerical column counts as outlier-heavy
pub const OUTLIER_HEAVY_COLUMN_RATIO: f64 = 0.05;

/// Share of outlier-heavy numerical columns above which robust scaling replaces standard scaling
pub const ROBUST_SCALING_COLUMN_SHARE: f64 = 0.5;

/// Rows below which a dataset is small for algorithm recommendation
pub const SMALL_DATASET_ROWS: usize = 1000;

/// Rows below which a dataset is medium-sized for algorithm recommendation
pub const MEDIUM_DATASET_ROWS: usize = 10_000;

/// Feature count above which a dataset is high-dimensional
pub const HIGH_DIMENSIONAL_FEATURES: usize = 50;

/// Feature count below which a dataset is low-dimensional
pub const LOW_DIMENSIONAL_FEATURES: usize = 10;

/// Missing cell fraction above which missing-tolerant algorithms are favored
pub const RECOMMEND_MISSING_RATIO: f64 = 0.2;

/// Outlier fraction above which outlier-tolerant algorithms are favored
pub const RECOMMEND_OUTLIER_RATIO: f64 = 0.1;

/// Rows (with a non-null target) required before training is attempted
pub const MIN_TRAINING_ROWS: usize = 10;

/// A numerical target with more distinct values than this is treated as regression
pub const CLASSIFICATION_MAX_DISTINCT: usize = 20;

/// Column count above which upload validation warns
pub const WIDE_DATASET_COLUMNS: usize = 1000;

/// Features above which summaries recommend feature selection
pub const MANY_FEATURES: usize = 50;

/// Target candidates scoring at least this are reported as suitable
pub const TARGET_SUITABLE_SCORE: i32 = 20;

/// Categorical target candidates with more classes than this are penalized
pub const TARGET_MAX_CLASSES: usize = 20;

/// Numerical target candidates with at most this many values look like class labels
pub const TARGET_LOW_CARDINALITY: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leakage_tiers_are_ordered() {
        assert!(LEAKAGE_HIGH_THRESHOLD > LEAKAGE_MEDIUM_THRESHOLD);
        assert!(LEAKAGE_MEDIUM_THRESHOLD > STRONG_CORRELATION_THRESHOLD);
    }

    #[test]
    fn test_quality_weights_sum_to_one() {
        let total = QUALITY_WEIGHT_COMPLETENESS + QUALITY_WEIGHT_UNIQUENESS + QUALITY_WEIGHT_CONSISTENCY;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dataset_size_bands_are_ordered() {
        assert!(SMALL_DATASET_ROWS < MEDIUM_DATASET_ROWS);
        assert!(LOW_DIMENSIONAL_FEATURES < HIGH_DIMENSIONAL_FEATURES);
    }
}
