//! Data preprocessing module
//!
//! Provides the fit-on-train, apply-everywhere transforms used by training and prediction:
//! - Missing value imputation (mean or median, most frequent)
//! - Standard or robust scaling of numerical features
//! - Calendar components of datetime features
//! - Categorical encoding (one-hot up to a cutoff, ordinal beyond it)
//! - Target label encoding
//! - Stratified train/test splitting

mod encoder;
mod imputer;
mod pipeline;
mod scaler;
mod split;

pub use encoder::{EncoderType, LabelEncoder, OneHotEncoder, OrdinalEncoder};
pub use imputer::{ImputeStrategy, MeanImputer, MedianImputer, ModeImputer, NumericImputer};
pub use pipeline::{
    category_label, class_label, numeric_strategy, ColumnTransform, DatetimePart,
    DatetimePartTransform, DropReason, DroppedColumn, FittedPipeline, NumericStrategy,
    PreparedData, PreprocessingPipeline, Record, TargetTransform,
};
pub use scaler::{NumericScaler, RobustScaler, ScalingMethod, StandardScaler};
pub use split::{train_test_split, TrainTestSplit};
