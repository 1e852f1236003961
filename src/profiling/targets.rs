//! Target column suitability scoring
//!
//! Every column gets a score in [0, 100] built from its name and value
//! distribution. The score ranks candidates for the user; it does not restrict
//! which column may be trained on.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::schema::{ColumnType, Schema};
use crate::thresholds::{
    HIGH_CARDINALITY_RATIO, TARGET_LOW_CARDINALITY, TARGET_MAX_CLASSES, TARGET_SUITABLE_SCORE,
};
use crate::training::{infer_problem_type, ProblemType};

const CLASSIFICATION_KEYWORDS: &[&str] = &[
    "target", "label", "class", "category", "type", "status", "outcome", "result", "decision",
    "churn", "fraud", "spam", "sentiment", "approved", "success", "failure", "win",
];

const REGRESSION_KEYWORDS: &[&str] = &[
    "price", "cost", "amount", "value", "score", "rating", "revenue", "sales", "profit", "income",
    "salary", "weight", "height", "temperature", "distance", "duration", "quantity", "rate",
];

const IDENTIFIER_TOKENS: &[&str] = &["id", "index", "key", "identifier", "uuid", "guid", "timestamp"];

const METADATA_NAMES: &[&str] = &["created_at", "updated_at", "date_created", "date_modified"];

/// Suitability of one column as a prediction target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecommendation {
    pub column: String,
    pub score: u32,
    pub is_suitable: bool,
    /// Problem type training would infer for this column
    pub problem_type: Option<ProblemType>,
    /// Heuristic confidence in [0, 1]
    pub confidence: f64,
    pub reasons: Vec<String>,
}

/// Score every column, best candidates first (ties keep dataset order)
pub fn recommend_targets(dataset: &Dataset, schema: &Schema) -> Vec<TargetRecommendation> {
    let mut recommendations: Vec<TargetRecommendation> = dataset
        .columns()
        .iter()
        .zip(&schema.columns)
        .map(|(column, column_schema)| {
            let mut assessment = Assessment::default();
            let tokens = name_tokens(&column.name);

            if let Some(kind) = keyword_hint(&tokens) {
                assessment.add(30, format!("Column name suggests a {kind} target"));
                assessment.confidence += 0.3;
            }

            let lower = column.name.to_lowercase();
            if tokens.iter().any(|t| IDENTIFIER_TOKENS.contains(&t.as_str()))
                || METADATA_NAMES.iter().any(|m| lower.contains(m))
            {
                return assessment.unsuitable(
                    &column.name,
                    "Column looks like an identifier or metadata",
                );
            }
            if column_schema.is_empty {
                return assessment.unsuitable(&column.name, "Column has no values");
            }
            if column_schema.is_constant {
                return Assessment::default()
                    .unsuitable(&column.name, "Column has a constant value");
            }

            let unique = column_schema.unique_count;
            let unique_ratio = unique as f64 / schema.row_count.max(1) as f64;
            match column_schema.inferred_type {
                ColumnType::Numerical if unique_ratio > HIGH_CARDINALITY_RATIO => {
                    assessment.add(25, "High-cardinality numeric values suit regression");
                    assessment.confidence += 0.25;
                }
                ColumnType::Numerical if unique <= TARGET_LOW_CARDINALITY => {
                    assessment.add(20, "Few distinct numeric values could be class labels");
                    assessment.confidence += 0.2;
                }
                ColumnType::Numerical => {
                    assessment.add(15, "Numeric values of medium cardinality suit regression");
                    assessment.confidence += 0.15;
                }
                ColumnType::Categorical if unique <= TARGET_MAX_CLASSES => {
                    assessment.add(20, "Categorical with a manageable number of classes");
                    assessment.confidence += 0.2;
                }
                ColumnType::Categorical => {
                    assessment.add(-10, "Too many categories for classification");
                }
                ColumnType::Boolean | ColumnType::Datetime => {}
            }

            if unique == 2 {
                assessment.add(15, "Binary values are ideal for classification");
                assessment.confidence += 0.15;
            }

            if column_schema.null_percentage > 0.5 {
                assessment.add(-30, "Too many missing values for a target");
            } else if column_schema.null_percentage > 0.1 {
                assessment.add(-10, "Some target values are missing");
            }

            let is_suitable = assessment.score >= TARGET_SUITABLE_SCORE;
            TargetRecommendation {
                column: column.name.clone(),
                score: assessment.score.clamp(0, 100) as u32,
                is_suitable,
                problem_type: Some(infer_problem_type(column, column_schema)),
                confidence: assessment.confidence.min(1.0),
                reasons: assessment.reasons,
            }
        })
        .collect();

    recommendations.sort_by(|a, b| b.score.cmp(&a.score));
    recommendations
}

#[derive(Default)]
struct Assessment {
    score: i32,
    confidence: f64,
    reasons: Vec<String>,
}

impl Assessment {
    fn add(&mut self, points: i32, reason: impl Into<String>) {
        self.score += points;
        self.reasons.push(reason.into());
    }

    fn unsuitable(mut self, column: &str, reason: &str) -> TargetRecommendation {
        self.reasons.push(reason.to_string());
        TargetRecommendation {
            column: column.to_string(),
            score: 0,
            is_suitable: false,
            problem_type: None,
            confidence: 0.0,
            reasons: self.reasons,
        }
    }
}

/// Lowercase name split on non-alphanumerics and camelCase boundaries
fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn keyword_hint(tokens: &[String]) -> Option<ProblemType> {
    let matches = |keywords: &[&str]| {
        tokens.iter().any(|t| {
            let singular = t.strip_suffix('s').unwrap_or(t);
            keywords.contains(&t.as_str()) || keywords.contains(&singular)
        })
    };
    if matches(CLASSIFICATION_KEYWORDS) {
        Some(ProblemType::Classification)
    } else if matches(REGRESSION_KEYWORDS) {
        Some(ProblemType::Regression)
    } else {
        None
    }
}
