//! Fit-once preprocessing pipeline
//!
//! [`PreprocessingPipeline::prepare`] learns every transform parameter from the
//! training rows and returns an immutable [`FittedPipeline`]. The same
//! `FittedPipeline::transform_row` path turns both training rows and
//! prediction-time records into feature vectors.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Datelike, Timelike, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::encoder::{EncoderType, LabelEncoder, OneHotEncoder, OrdinalEncoder};
use super::imputer::{ImputeStrategy, ModeImputer, NumericImputer};
use super::scaler::{NumericScaler, ScalingMethod};
use super::split::{train_test_split, TrainTestSplit};
use crate::dataset::{Column, Dataset, Value};
use crate::error::{AutoMlError, Result};
use crate::profiling::stats::numeric_stats;
use crate::schema::{parse_bool, parse_datetime, ColumnSchema, ColumnType, Schema};
use crate::thresholds::{
    MEDIAN_IMPUTATION_MISSING_RATIO, MIN_TRAINING_ROWS, ONE_HOT_MAX_CATEGORIES,
    OUTLIER_HEAVY_COLUMN_RATIO, ROBUST_SCALING_COLUMN_SHARE,
};
use crate::training::ProblemType;

/// A prediction-time input row, keyed by column name
pub type Record = BTreeMap<String, Value>;

/// Why a column was left out of the feature set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Every value is null
    Empty,
    /// A single distinct value
    Constant,
    /// No usable values among the training rows
    NoTrainingValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedColumn {
    pub name: String,
    pub reason: DropReason,
}

/// Imputation and scaling applied to every numerical feature of one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericStrategy {
    pub imputation: ImputeStrategy,
    pub scaling: ScalingMethod,
}

impl Default for NumericStrategy {
    fn default() -> Self {
        Self {
            imputation: ImputeStrategy::Mean,
            scaling: ScalingMethod::Standard,
        }
    }
}

/// Calendar component extracted from a datetime column (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatetimePart {
    Year,
    Month,
    Day,
    /// Monday = 0
    Weekday,
    Hour,
    IsWeekend,
}

impl DatetimePart {
    pub const ALL: [DatetimePart; 6] = [
        DatetimePart::Year,
        DatetimePart::Month,
        DatetimePart::Day,
        DatetimePart::Weekday,
        DatetimePart::Hour,
        DatetimePart::IsWeekend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatetimePart::Year => "year",
            DatetimePart::Month => "month",
            DatetimePart::Day => "day",
            DatetimePart::Weekday => "weekday",
            DatetimePart::Hour => "hour",
            DatetimePart::IsWeekend => "is_weekend",
        }
    }

    pub fn extract(&self, dt: &DateTime<Utc>) -> f64 {
        let weekday = dt.weekday().num_days_from_monday();
        match self {
            DatetimePart::Year => dt.year() as f64,
            DatetimePart::Month => dt.month() as f64,
            DatetimePart::Day => dt.day() as f64,
            DatetimePart::Weekday => weekday as f64,
            DatetimePart::Hour => dt.hour() as f64,
            DatetimePart::IsWeekend => {
                if weekday >= 5 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Fitted imputation and scaling of one datetime component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatetimePartTransform {
    pub part: DatetimePart,
    pub imputer: NumericImputer,
    pub scaler: Option<NumericScaler>,
}

/// A fitted, column-scoped transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnTransform {
    Numeric {
        column: String,
        imputer: NumericImputer,
        scaler: Option<NumericScaler>,
    },
    /// One feature per calendar component
    Datetime {
        column: String,
        parts: Vec<DatetimePartTransform>,
    },
    Boolean {
        column: String,
        imputer: ModeImputer<bool>,
    },
    OneHot {
        column: String,
        imputer: ModeImputer<String>,
        encoder: OneHotEncoder,
    },
    Ordinal {
        column: String,
        imputer: ModeImputer<String>,
        encoder: OrdinalEncoder,
    },
}

impl ColumnTransform {
    pub fn column(&self) -> &str {
        match self {
            ColumnTransform::Numeric { column, .. }
            | ColumnTransform::Datetime { column, .. }
            | ColumnTransform::Boolean { column, .. }
            | ColumnTransform::OneHot { column, .. }
            | ColumnTransform::Ordinal { column, .. } => column,
        }
    }

    pub fn output_names(&self) -> Vec<String> {
        match self {
            ColumnTransform::OneHot { column, encoder, .. } => encoder.output_names(column),
            ColumnTransform::Datetime { column, parts } => parts
                .iter()
                .map(|p| format!("{column}_{}", p.part.as_str()))
                .collect(),
            other => vec![other.column().to_string()],
        }
    }

    /// Append this column's features for one raw value (`None` means absent)
    pub fn apply(&self, value: Option<&Value>, out: &mut Vec<f64>) {
        match self {
            ColumnTransform::Numeric {
                imputer, scaler, ..
            } => {
                let v = imputer.transform(value.and_then(read_number));
                out.push(scaler.as_ref().map_or(v, |s| s.transform(v)));
            }
            ColumnTransform::Datetime { parts, .. } => {
                let dt = value.and_then(parse_datetime);
                for p in parts {
                    let v = p.imputer.transform(dt.as_ref().map(|dt| p.part.extract(dt)));
                    out.push(p.scaler.as_ref().map_or(v, |s| s.transform(v)));
                }
            }
            ColumnTransform::Boolean { imputer, .. } => {
                let b = imputer.transform(value.and_then(read_bool));
                out.push(if b { 1.0 } else { 0.0 });
            }
            ColumnTransform::OneHot {
                imputer, encoder, ..
            } => {
                let label = imputer.transform(value.and_then(category_label));
                encoder.encode_into(&label, out);
            }
            ColumnTransform::Ordinal {
                imputer, encoder, ..
            } => {
                let label = imputer.transform(value.and_then(category_label));
                out.push(encoder.encode(&label));
            }
        }
    }
}

fn read_number(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Category text of a feature value; numeric-looking text is canonicalized so 3.5 and "3.50" agree
pub fn category_label(value: &Value) -> Option<String> {
    value
        .as_f64()
        .map(|n| (n + 0.0).to_string())
        .or_else(|| value.as_label())
}

fn read_bool(value: &Value) -> Option<bool> {
    parse_bool(value).or_else(|| match value.as_f64() {
        Some(n) if n == 1.0 => Some(true),
        Some(n) if n == 0.0 => Some(false),
        _ => None,
    })
}

/// Learned mapping of the target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetTransform {
    Classification {
        column: String,
        source_type: ColumnType,
        labels: LabelEncoder,
    },
    Regression {
        column: String,
    },
}

impl TargetTransform {
    pub fn column(&self) -> &str {
        match self {
            TargetTransform::Classification { column, .. } | TargetTransform::Regression { column } => {
                column
            }
        }
    }

    pub fn problem_type(&self) -> ProblemType {
        match self {
            TargetTransform::Classification { .. } => ProblemType::Classification,
            TargetTransform::Regression { .. } => ProblemType::Regression,
        }
    }

    pub fn class_labels(&self) -> &[String] {
        match self {
            TargetTransform::Classification { labels, .. } => &labels.classes,
            TargetTransform::Regression { .. } => &[],
        }
    }

    /// Encoded target, `None` when the value is missing or unusable
    pub fn encode(&self, value: &Value) -> Option<f64> {
        match self {
            TargetTransform::Classification {
                source_type,
                labels,
                ..
            } => class_label(value, *source_type)
                .and_then(|label| labels.encode(&label))
                .map(|i| i as f64),
            TargetTransform::Regression { .. } => value.as_f64(),
        }
    }
}

/// Canonical class label of a target value
pub fn class_label(value: &Value, source_type: ColumnType) -> Option<String> {
    match source_type {
        ColumnType::Numerical => value.as_f64().map(|n| (n + 0.0).to_string()),
        ColumnType::Boolean => read_bool(value).map(|b| b.to_string()),
        ColumnType::Categorical | ColumnType::Datetime => value.as_label(),
    }
}

/// The fitted transforms, immutable after training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    pub transforms: Vec<ColumnTransform>,
    /// Names of the produced features, in matrix column order
    pub feature_names: Vec<String>,
    pub dropped_columns: Vec<DroppedColumn>,
    pub numeric_strategy: NumericStrategy,
    pub target: TargetTransform,
}

impl FittedPipeline {
    /// Raw columns a prediction row must supply
    pub fn input_columns(&self) -> Vec<&str> {
        self.transforms.iter().map(ColumnTransform::column).collect()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature vector for one row, given each transform's raw input in order
    pub fn transform_row<'v>(&self, inputs: impl IntoIterator<Item = Option<&'v Value>>) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.feature_names.len());
        for (transform, value) in self.transforms.iter().zip(inputs) {
            transform.apply(value, &mut out);
        }
        out
    }

    /// Transform selected dataset rows into a feature matrix
    pub fn transform_dataset(&self, dataset: &Dataset, rows: &[usize]) -> Result<Array2<f64>> {
        let mut columns: Vec<&Column> = Vec::with_capacity(self.transforms.len());
        let mut missing = Vec::new();
        for transform in &self.transforms {
            match dataset.column(transform.column()) {
                Some(column) => columns.push(column),
                None => missing.push(transform.column().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(AutoMlError::MissingFeature { row: 0, columns: missing });
        }

        let n_features = self.n_features();
        let mut data = Vec::with_capacity(rows.len() * n_features);
        for &row in rows {
            data.extend(self.transform_row(columns.iter().map(|c| c.values.get(row))));
        }
        Array2::from_shape_vec((rows.len(), n_features), data)
            .map_err(|e| AutoMlError::InvalidFormat(e.to_string()))
    }

    /// Transform prediction records; any record lacking a required column fails the batch
    pub fn transform_records(&self, records: &[Record]) -> Result<Array2<f64>> {
        for (row, record) in records.iter().enumerate() {
            let missing: Vec<String> = self
                .transforms
                .iter()
                .map(ColumnTransform::column)
                .filter(|c| !record.contains_key(*c))
                .map(str::to_string)
                .collect();
            if !missing.is_empty() {
                return Err(AutoMlError::MissingFeature { row, columns: missing });
            }
        }

        let n_features = self.n_features();
        let mut data = Vec::with_capacity(records.len() * n_features);
        for record in records {
            data.extend(self.transform_row(self.transforms.iter().map(|t| record.get(t.column()))));
        }
        Array2::from_shape_vec((records.len(), n_features), data)
            .map_err(|e| AutoMlError::InvalidFormat(e.to_string()))
    }
}

/// Training data produced by fitting the pipeline
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub pipeline: FittedPipeline,
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
    /// Dataset row indices of each split
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
    pub stratified: bool,
    /// Rows dropped because the target was missing
    pub dropped_target_rows: usize,
}

/// Unfitted pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingPipeline {
    pub scale_numeric: bool,
    pub max_onehot_categories: usize,
}

impl Default for PreprocessingPipeline {
    fn default() -> Self {
        Self {
            scale_numeric: true,
            max_onehot_categories: ONE_HOT_MAX_CATEGORIES,
        }
    }
}

impl PreprocessingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scaling(mut self, scale_numeric: bool) -> Self {
        self.scale_numeric = scale_numeric;
        self
    }

    /// Validate the target, split the rows and fit every transform on the training side
    pub fn prepare(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        target: &str,
        problem_type: ProblemType,
        test_fraction: f64,
        seed: u64,
    ) -> Result<PreparedData> {
        let start = Instant::now();
        let target_schema = schema.require(target)?;
        let target_column = dataset
            .column(target)
            .ok_or_else(|| AutoMlError::UnknownColumn(target.to_string()))?;

        let target_transform = fit_target(target_column, target_schema, problem_type);

        // Keep rows whose target can be encoded
        let mut usable_rows = Vec::with_capacity(dataset.n_rows());
        let mut y_all = Vec::with_capacity(dataset.n_rows());
        for (row, value) in target_column.values.iter().enumerate() {
            if let Some(y) = target_transform.encode(value) {
                usable_rows.push(row);
                y_all.push(y);
            }
        }
        let dropped_target_rows = dataset.n_rows() - usable_rows.len();
        if dropped_target_rows > 0 {
            info!(target, dropped = dropped_target_rows, "Dropped rows with missing target");
        }

        if usable_rows.len() < MIN_TRAINING_ROWS {
            return Err(AutoMlError::InsufficientData {
                rows: usable_rows.len(),
                minimum: MIN_TRAINING_ROWS,
            });
        }
        let distinct_targets: BTreeSet<u64> = y_all.iter().map(|y| (y + 0.0).to_bits()).collect();
        if distinct_targets.len() < 2 {
            return Err(AutoMlError::DegenerateTarget {
                column: target.to_string(),
            });
        }

        let class_indices: Option<Vec<usize>> = match problem_type {
            ProblemType::Classification => Some(y_all.iter().map(|&y| y as usize).collect()),
            ProblemType::Regression => None,
        };
        let TrainTestSplit {
            train,
            test,
            stratified,
        } = train_test_split(usable_rows.len(), class_indices.as_deref(), test_fraction, seed)?;

        let train_rows: Vec<usize> = train.iter().map(|&i| usable_rows[i]).collect();
        let test_rows: Vec<usize> = test.iter().map(|&i| usable_rows[i]).collect();

        let pipeline = self.fit_features(dataset, schema, target, &train_rows, target_transform);
        if pipeline.n_features() == 0 {
            return Err(AutoMlError::NoUsableFeatures {
                dropped: pipeline.dropped_columns.len(),
            });
        }

        let x_train = pipeline.transform_dataset(dataset, &train_rows)?;
        let x_test = pipeline.transform_dataset(dataset, &test_rows)?;
        let y_train = Array1::from_iter(train.iter().map(|&i| y_all[i]));
        let y_test = Array1::from_iter(test.iter().map(|&i| y_all[i]));

        debug!(
            train_rows = train_rows.len(),
            test_rows = test_rows.len(),
            features = pipeline.n_features(),
            dropped_columns = pipeline.dropped_columns.len(),
            imputation = ?pipeline.numeric_strategy.imputation,
            scaling = ?pipeline.numeric_strategy.scaling,
            stratified,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessing fitted"
        );

        Ok(PreparedData {
            pipeline,
            x_train,
            y_train,
            x_test,
            y_test,
            train_rows,
            test_rows,
            stratified,
            dropped_target_rows,
        })
    }

    /// Fit feature transforms on the given training rows
    pub fn fit_features(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        target: &str,
        train_rows: &[usize],
        target_transform: TargetTransform,
    ) -> FittedPipeline {
        let mut transforms = Vec::new();
        let mut dropped_columns = Vec::new();
        let strategy = numeric_strategy(dataset, schema, target, train_rows);

        for (column, column_schema) in dataset.columns().iter().zip(&schema.columns) {
            if column.name == target {
                continue;
            }
            if column_schema.is_empty {
                dropped_columns.push(DroppedColumn {
                    name: column.name.clone(),
                    reason: DropReason::Empty,
                });
                continue;
            }
            if column_schema.is_constant {
                dropped_columns.push(DroppedColumn {
                    name: column.name.clone(),
                    reason: DropReason::Constant,
                });
                continue;
            }
            match self.fit_column(column, column_schema, train_rows, strategy) {
                Some(transform) => transforms.push(transform),
                None => dropped_columns.push(DroppedColumn {
                    name: column.name.clone(),
                    reason: DropReason::NoTrainingValues,
                }),
            }
        }

        let feature_names = transforms.iter().flat_map(ColumnTransform::output_names).collect();
        FittedPipeline {
            transforms,
            feature_names,
            dropped_columns,
            numeric_strategy: strategy,
            target: target_transform,
        }
    }

    fn fit_column(
        &self,
        column: &Column,
        schema: &ColumnSchema,
        train_rows: &[usize],
        strategy: NumericStrategy,
    ) -> Option<ColumnTransform> {
        let train_values = train_rows.iter().map(|&r| &column.values[r]);
        let name = column.name.clone();

        match schema.inferred_type {
            ColumnType::Numerical => {
                let readings: Vec<Option<f64>> = train_values.map(read_number).collect();
                let (imputer, scaler) = self.fit_numeric(&readings, strategy)?;
                Some(ColumnTransform::Numeric {
                    column: name,
                    imputer,
                    scaler,
                })
            }
            ColumnType::Datetime => {
                let parsed: Vec<Option<DateTime<Utc>>> = train_values.map(parse_datetime).collect();
                let parts = DatetimePart::ALL
                    .iter()
                    .map(|&part| {
                        let readings: Vec<Option<f64>> = parsed
                            .iter()
                            .map(|dt| dt.as_ref().map(|dt| part.extract(dt)))
                            .collect();
                        let (imputer, scaler) = self.fit_numeric(&readings, strategy)?;
                        Some(DatetimePartTransform {
                            part,
                            imputer,
                            scaler,
                        })
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(ColumnTransform::Datetime { column: name, parts })
            }
            ColumnType::Boolean => {
                let readings: Vec<Option<bool>> = train_values.map(read_bool).collect();
                let imputer = ModeImputer::fit(&readings)?;
                Some(ColumnTransform::Boolean {
                    column: name,
                    imputer,
                })
            }
            ColumnType::Categorical => {
                let readings: Vec<Option<String>> = train_values.map(category_label).collect();
                let imputer = ModeImputer::fit(&readings)?;
                let vocabulary = readings.iter().flatten().map(String::as_str);
                let n_categories = readings.iter().flatten().collect::<BTreeSet<_>>().len();
                Some(match self.encoder_for(n_categories) {
                    EncoderType::OneHot => ColumnTransform::OneHot {
                        column: name,
                        imputer,
                        encoder: OneHotEncoder::fit(vocabulary),
                    },
                    EncoderType::Ordinal => ColumnTransform::Ordinal {
                        column: name,
                        imputer,
                        encoder: OrdinalEncoder::fit(vocabulary),
                    },
                })
            }
        }
    }

    fn fit_numeric(
        &self,
        readings: &[Option<f64>],
        strategy: NumericStrategy,
    ) -> Option<(NumericImputer, Option<NumericScaler>)> {
        let imputer = NumericImputer::fit(strategy.imputation, readings)?;
        let scaler = self.scale_numeric.then(|| {
            let imputed: Vec<f64> = readings.iter().map(|v| imputer.transform(*v)).collect();
            NumericScaler::fit(strategy.scaling, &imputed)
        });
        Some((imputer, scaler))
    }

    /// One-hot up to the category cutoff, ordinal beyond it
    pub fn encoder_for(&self, n_categories: usize) -> EncoderType {
        if n_categories <= self.max_onehot_categories {
            EncoderType::OneHot
        } else {
            EncoderType::Ordinal
        }
    }
}

/// Pick imputation and scaling from the training rows of the numerical feature columns
///
/// Median imputation when their mean null fraction exceeds the cutoff, robust scaling
/// when more than half of them are outlier-heavy.
pub fn numeric_strategy(
    dataset: &Dataset,
    schema: &Schema,
    target: &str,
    train_rows: &[usize],
) -> NumericStrategy {
    let mut n_columns = 0usize;
    let mut missing_total = 0.0;
    let mut outlier_heavy = 0usize;

    for (column, column_schema) in dataset.columns().iter().zip(&schema.columns) {
        if column.name == target
            || column_schema.inferred_type != ColumnType::Numerical
            || column_schema.is_empty
            || column_schema.is_constant
            || train_rows.is_empty()
        {
            continue;
        }
        let present: Vec<(usize, f64)> = train_rows
            .iter()
            .filter_map(|&r| column.values[r].as_f64().map(|v| (r, v)))
            .collect();
        n_columns += 1;
        missing_total += 1.0 - present.len() as f64 / train_rows.len() as f64;
        if !present.is_empty() {
            let outliers = numeric_stats(&present).outlier_count;
            if outliers as f64 / present.len() as f64 > OUTLIER_HEAVY_COLUMN_RATIO {
                outlier_heavy += 1;
            }
        }
    }

    if n_columns == 0 {
        return NumericStrategy::default();
    }
    let imputation = if missing_total / n_columns as f64 > MEDIAN_IMPUTATION_MISSING_RATIO {
        ImputeStrategy::Median
    } else {
        ImputeStrategy::Mean
    };
    let scaling = if outlier_heavy as f64 > n_columns as f64 * ROBUST_SCALING_COLUMN_SHARE {
        ScalingMethod::Robust
    } else {
        ScalingMethod::Standard
    };
    NumericStrategy {
        imputation,
        scaling,
    }
}

fn fit_target(column: &Column, schema: &ColumnSchema, problem_type: ProblemType) -> TargetTransform {
    match problem_type {
        ProblemType::Regression => TargetTransform::Regression {
            column: column.name.clone(),
        },
        ProblemType::Classification => {
            let source_type = schema.inferred_type;
            let labels: BTreeSet<String> = column
                .values
                .iter()
                .filter_map(|v| class_label(v, source_type))
                .collect();
            let mut classes: Vec<String> = labels.into_iter().collect();
            if source_type == ColumnType::Numerical {
                classes.sort_by(|a, b| {
                    let (x, y) = (a.parse::<f64>().unwrap_or(0.0), b.parse::<f64>().unwrap_or(0.0));
                    x.total_cmp(&y)
                });
            }
            TargetTransform::Classification {
                column: column.name.clone(),
                source_type,
                labels: LabelEncoder::from_sorted(classes),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaInferencer;

    fn dataset(n: usize) -> Dataset {
        let age: Vec<Value> = (0..n)
            .map(|i| if i % 10 == 3 { Value::Null } else { Value::from((20 + i % 30) as f64) })
            .collect();
        let city: Vec<Value> = (0..n)
            .map(|i| Value::from(["paris", "berlin", "rome"][i % 3]))
            .collect();
        let flag: Vec<Value> = (0..n).map(|i| Value::from(if i % 2 == 0 { "yes" } else { "no" })).collect();
        let constant: Vec<Value> = (0..n).map(|_| Value::from("same")).collect();
        let label: Vec<Value> = (0..n).map(|i| Value::from(if i % 4 == 0 { 1.0 } else { 0.0 })).collect();
        Dataset::from_columns(vec![
            ("age", age),
            ("city", city),
            ("flag", flag),
            ("constant", constant),
            ("label", label),
        ])
        .unwrap()
    }

    fn prepare(ds: &Dataset) -> Result<PreparedData> {
        let schema = SchemaInferencer::new().infer(ds)?;
        PreprocessingPipeline::new().prepare(ds, &schema, "label", ProblemType::Classification, 0.2, 42)
    }

    #[test]
    fn test_prepare_shapes() {
        let ds = dataset(40);
        let prepared = prepare(&ds).unwrap();
        assert_eq!(prepared.x_train.nrows() + prepared.x_test.nrows(), 40);
        assert_eq!(prepared.x_test.nrows(), 8);
        // age + 3 city one-hot + flag
        assert_eq!(
            prepared.pipeline.feature_names,
            vec!["age", "city_berlin", "city_paris", "city_rome", "flag"]
        );
        assert_eq!(prepared.pipeline.dropped_columns.len(), 1);
        assert_eq!(prepared.pipeline.dropped_columns[0].reason, DropReason::Constant);
        assert!(prepared.x_train.iter().all(|v| v.is_finite()));
        assert_eq!(prepared.pipeline.target.class_labels(), &["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_training_and_record_paths_agree() {
        let ds = dataset(40);
        let prepared = prepare(&ds).unwrap();
        let row = prepared.test_rows[0];
        let record: Record = ds
            .columns()
            .iter()
            .map(|c| (c.name.clone(), c.values[row].clone()))
            .collect();
        let from_record = prepared.pipeline.transform_records(&[record]).unwrap();
        assert_eq!(from_record.row(0), prepared.x_test.row(0));
    }

    #[test]
    fn test_missing_feature_in_record() {
        let ds = dataset(40);
        let prepared = prepare(&ds).unwrap();
        let mut record: Record = BTreeMap::new();
        record.insert("age".to_string(), Value::from(30.0));
        let err = prepared.pipeline.transform_records(&[record]).unwrap_err();
        match err {
            AutoMlError::MissingFeature { row, columns } => {
                assert_eq!(row, 0);
                assert_eq!(columns, vec!["city", "flag"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unseen_category_and_nulls_are_handled() {
        let ds = dataset(40);
        let prepared = prepare(&ds).unwrap();
        let mut record: Record = BTreeMap::new();
        record.insert("age".to_string(), Value::Null);
        record.insert("city".to_string(), Value::from("tokyo"));
        record.insert("flag".to_string(), Value::Null);
        record.insert("extra".to_string(), Value::from(1.0));
        let x = prepared.pipeline.transform_records(&[record]).unwrap();
        assert_eq!(x.ncols(), 5);
        // Mean-imputed then scaled is exactly zero
        assert!(x[[0, 0]].abs() < 1e-9);
        assert_eq!(&x.row(0).to_vec()[1..4], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_insufficient_rows() {
        let ds = dataset(5);
        assert!(matches!(
            prepare(&ds),
            Err(AutoMlError::InsufficientData { rows: 5, .. })
        ));
    }

    #[test]
    fn test_degenerate_target() {
        let ds = Dataset::from_columns(vec![
            ("x", (0..20).map(|i| Value::from(i as f64)).collect()),
            ("y", (0..20).map(|_| Value::from("a")).collect()),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let err = PreprocessingPipeline::new()
            .prepare(&ds, &schema, "y", ProblemType::Classification, 0.2, 1)
            .unwrap_err();
        assert!(matches!(err, AutoMlError::DegenerateTarget { .. }));
    }

    #[test]
    fn test_null_targets_dropped() {
        let mut label: Vec<Value> = (0..30).map(|i| Value::from((i % 2) as f64)).collect();
        label[0] = Value::Null;
        label[5] = Value::Null;
        let ds = Dataset::from_columns(vec![
            ("x", (0..30).map(|i| Value::from(i as f64)).collect()),
            ("label", label),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let prepared = PreprocessingPipeline::new()
            .prepare(&ds, &schema, "label", ProblemType::Classification, 0.2, 3)
            .unwrap();
        assert_eq!(prepared.dropped_target_rows, 2);
        assert_eq!(prepared.x_train.nrows() + prepared.x_test.nrows(), 28);
    }

    fn fit_all(ds: &Dataset, pipeline: PreprocessingPipeline) -> FittedPipeline {
        let schema = SchemaInferencer::new().infer(ds).unwrap();
        let rows: Vec<usize> = (0..ds.n_rows()).collect();
        let target = TargetTransform::Regression {
            column: "label".to_string(),
        };
        pipeline.fit_features(ds, &schema, "label", &rows, target)
    }

    fn labels(n: usize) -> Vec<Value> {
        (0..n).map(|i| Value::from((i % 2) as f64)).collect()
    }

    #[test]
    fn test_no_usable_features() {
        let ds = Dataset::from_columns(vec![
            ("c", (0..30).map(|_| Value::from(1.0)).collect()),
            ("y", (0..30).map(|i| Value::from(["a", "b"][i % 2])).collect()),
        ])
        .unwrap();
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let err = PreprocessingPipeline::new()
            .prepare(&ds, &schema, "y", ProblemType::Classification, 0.2, 42)
            .unwrap_err();
        assert!(matches!(err, AutoMlError::NoUsableFeatures { dropped: 1 }));
    }

    #[test]
    fn test_default_numeric_strategy() {
        let ds = dataset(40);
        let prepared = prepare(&ds).unwrap();
        assert_eq!(prepared.pipeline.numeric_strategy, NumericStrategy::default());
    }

    #[test]
    fn test_sparse_numeric_columns_use_median() {
        let a: Vec<Value> = (0..40)
            .map(|i| if i % 2 == 0 { Value::Null } else { Value::from(i as f64) })
            .collect();
        let ds = Dataset::from_columns(vec![("a", a), ("label", labels(40))]).unwrap();
        let pipeline = fit_all(&ds, PreprocessingPipeline::new().with_scaling(false));
        assert_eq!(pipeline.numeric_strategy.imputation, ImputeStrategy::Median);

        let mut record: Record = BTreeMap::new();
        record.insert("a".to_string(), Value::Null);
        let x = pipeline.transform_records(&[record]).unwrap();
        assert_eq!(x[[0, 0]], 20.0);
    }

    #[test]
    fn test_outlier_heavy_columns_use_robust_scaling() {
        let b: Vec<Value> = (0..40)
            .map(|i| Value::from(if i % 10 == 0 { 1000.0 } else { (i % 5) as f64 }))
            .collect();
        let ds = Dataset::from_columns(vec![("b", b), ("label", labels(40))]).unwrap();
        let pipeline = fit_all(&ds, PreprocessingPipeline::new());
        assert_eq!(pipeline.numeric_strategy.scaling, ScalingMethod::Robust);

        let records: Vec<Record> = [2.5, 5.5]
            .iter()
            .map(|&v| BTreeMap::from([("b".to_string(), Value::from(v))]))
            .collect();
        let x = pipeline.transform_records(&records).unwrap();
        assert!(x[[0, 0]].abs() < 1e-12);
        assert!((x[[1, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_datetime_calendar_parts() {
        let when: Vec<Value> = (0..30)
            .map(|i| Value::from(format!("2024-01-{:02} {:02}:00:00", 1 + i % 28, i % 24)))
            .collect();
        let ds = Dataset::from_columns(vec![("when", when), ("label", labels(30))]).unwrap();
        let pipeline = fit_all(&ds, PreprocessingPipeline::new().with_scaling(false));
        assert_eq!(
            pipeline.feature_names,
            vec![
                "when_year",
                "when_month",
                "when_day",
                "when_weekday",
                "when_hour",
                "when_is_weekend"
            ]
        );

        // 2024-01-06 is a Saturday
        let record = BTreeMap::from([("when".to_string(), Value::from("2024-01-06 10:30:00"))]);
        let x = pipeline.transform_records(&[record]).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![2024.0, 1.0, 6.0, 5.0, 10.0, 1.0]);
    }

    #[test]
    fn test_numeric_looking_categories_match_numbers() {
        let size: Vec<Value> = (0..30)
            .map(|i| Value::from(["3.50", "small", "large"][i % 3]))
            .collect();
        let ds = Dataset::from_columns(vec![("size", size), ("label", labels(30))]).unwrap();
        let pipeline = fit_all(&ds, PreprocessingPipeline::new());
        assert_eq!(pipeline.feature_names, vec!["size_3.5", "size_large", "size_small"]);

        let records: Vec<Record> = [Value::from(3.5), Value::from("3.500"), Value::from("small")]
            .into_iter()
            .map(|v| BTreeMap::from([("size".to_string(), v)]))
            .collect();
        let x = pipeline.transform_records(&records).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(x.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(x.row(2).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label(&Value::from(" 3.50 ")), Some("3.5".to_string()));
        assert_eq!(category_label(&Value::from(-0.0)), Some("0".to_string()));
        assert_eq!(category_label(&Value::from("paris")), Some("paris".to_string()));
        assert_eq!(category_label(&Value::Null), None);
    }

    #[test]
    fn test_encoder_cutoff() {
        let pipeline = PreprocessingPipeline::new();
        assert_eq!(pipeline.encoder_for(ONE_HOT_MAX_CATEGORIES), EncoderType::OneHot);
        assert_eq!(pipeline.encoder_for(ONE_HOT_MAX_CATEGORIES + 1), EncoderType::Ordinal);
    }
}
