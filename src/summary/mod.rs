//! Model summaries
//!
//! A summary is built from the artifact's aggregated statistics only, never
//! from raw rows. The narrative comes from an optional [`TextGenerator`]; when
//! none is configured, or it fails or times out, a deterministic template
//! narrative is used instead and the summary is still returned.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::artifact::{DatasetSnapshot, ModelArtifact};
use crate::evaluation::{EvaluationMetrics, FeatureScore};
use crate::training::{Algorithm, ProblemType, TrainingInfo};
use crate::thresholds::MANY_FEATURES;

const TOP_FEATURES: usize = 5;

#[derive(Error, Debug)]
pub enum TextGenerationError {
    #[error("Text generation unavailable: {0}")]
    Unavailable(String),

    #[error("Text generation failed: {0}")]
    Failed(String),
}

/// External text-in/text-out collaborator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenerationError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub model_insights: Vec<String>,
    pub data_insights: Vec<String>,
    pub performance_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Where the narrative text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "detail", rename_all = "snake_case")]
pub enum NarrativeSource {
    Generated,
    /// Template narrative; `detail` says why generation was not used
    Template(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_id: String,
    pub algorithm: Algorithm,
    pub problem_type: ProblemType,
    pub target_column: String,
    pub feature_count: usize,
    pub dataset: Option<DatasetSnapshot>,
    pub training_info: TrainingInfo,
    pub evaluation_metrics: EvaluationMetrics,
    pub top_features: Vec<FeatureScore>,
    pub insights: Insights,
    pub narrative: String,
    pub narrative_source: NarrativeSource,
}

/// Builds model summaries, delegating narration to an optional generator
#[derive(Clone)]
pub struct SummaryBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl std::fmt::Debug for SummaryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryBuilder")
            .field("has_generator", &self.generator.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SummaryBuilder {
    pub fn new(timeout: Duration) -> Self {
        Self {
            generator: None,
            timeout,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub async fn summarize(&self, artifact: &ModelArtifact) -> ModelSummary {
        let insights = build_insights(artifact);
        let (narrative, narrative_source) = match &self.generator {
            None => (
                template_narrative(artifact, &insights),
                NarrativeSource::Template("no text generator configured".to_string()),
            ),
            Some(generator) => {
                let prompt = build_prompt(artifact, &insights);
                match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        debug!(model_id = %artifact.model_id(), "Generated narrative");
                        (text.trim().to_string(), NarrativeSource::Generated)
                    }
                    Ok(Ok(_)) => self.degraded(artifact, &insights, "empty response".to_string()),
                    Ok(Err(e)) => self.degraded(artifact, &insights, e.to_string()),
                    Err(_) => self.degraded(
                        artifact,
                        &insights,
                        format!("timed out after {:?}", self.timeout),
                    ),
                }
            }
        };

        let model = &artifact.model;
        ModelSummary {
            model_id: model.model_id.clone(),
            algorithm: model.algorithm,
            problem_type: model.problem_type,
            target_column: model.target_column.clone(),
            feature_count: model.feature_names.len(),
            dataset: artifact.metadata.dataset.clone(),
            training_info: model.training_info.clone(),
            evaluation_metrics: model.evaluation_metrics.clone(),
            top_features: model.feature_importance.top(TOP_FEATURES).to_vec(),
            insights,
            narrative,
            narrative_source,
        }
    }

    fn degraded(
        &self,
        artifact: &ModelArtifact,
        insights: &Insights,
        reason: String,
    ) -> (String, NarrativeSource) {
        warn!(model_id = %artifact.model_id(), reason = %reason, "Text generation degraded, using template narrative");
        (
            template_narrative(artifact, insights),
            NarrativeSource::Template(reason),
        )
    }
}

/// Model, data, performance insights and recommendations
pub fn build_insights(artifact: &ModelArtifact) -> Insights {
    let model = &artifact.model;
    let mut insights = Insights::default();
    let feature_count = model.feature_names.len();

    insights.model_insights.push(format!(
        "Trained a {} model for {}",
        model.algorithm, model.problem_type
    ));
    insights
        .model_insights
        .push(format!("Model uses {feature_count} features for prediction"));
    if !model.training_info.dropped_columns.is_empty() {
        insights.model_insights.push(format!(
            "Excluded {} unusable columns: {}",
            model.training_info.dropped_columns.len(),
            model.training_info.dropped_columns.join(", ")
        ));
    }

    if let Some(dataset) = &artifact.metadata.dataset {
        let stats = &dataset.stats;
        insights.data_insights.push(format!(
            "Dataset contains {} rows and {} columns",
            stats.row_count, stats.column_count
        ));
        if stats.missing_values_total > 0 {
            insights.data_insights.push(format!(
                "Dataset has {:.1}% missing values",
                stats.missing_percentage * 100.0
            ));
        }
        if stats.duplicate_rows > 0 {
            insights
                .data_insights
                .push(format!("Found {} duplicate rows", stats.duplicate_rows));
        }
        if dataset.strong_correlations > 0 {
            insights.data_insights.push(format!(
                "Found {} strong feature correlations",
                dataset.strong_correlations
            ));
        }
    }

    match &model.evaluation_metrics {
        EvaluationMetrics::Classification(m) => {
            let grade = match m.accuracy {
                a if a >= 0.9 => "excellent",
                a if a >= 0.75 => "good",
                _ => "modest",
            };
            insights.performance_insights.push(format!(
                "Accuracy of {:.1}% on {} held-out rows is {grade}",
                m.accuracy * 100.0,
                m.n_samples
            ));
            insights
                .performance_insights
                .push(format!("F1 score is {:.3}", m.f1_score));
        }
        EvaluationMetrics::Regression(m) => {
            let grade = match m.r2 {
                r if r >= 0.8 => "strong",
                r if r >= 0.5 => "moderate",
                _ => "weak",
            };
            insights.performance_insights.push(format!(
                "R² of {:.3} indicates {grade} explanatory power",
                m.r2
            ));
            insights
                .performance_insights
                .push(format!("RMSE is {:.3}, MAE is {:.3}", m.rmse, m.mae));
        }
    }
    if let Some(top) = model.feature_importance.top(1).first() {
        insights.performance_insights.push(format!(
            "'{}' is the most important feature ({:.1}% of total importance)",
            top.feature,
            top.importance * 100.0
        ));
    }

    insights.recommendations.push(
        match model.algorithm {
            Algorithm::RandomForest => {
                "Random forests resist overfitting and give stable feature importances"
            }
            Algorithm::LogisticRegression => {
                "Logistic regression gives interpretable coefficients and fast predictions"
            }
            Algorithm::Xgboost => "Gradient boosting is often accurate but benefits from tuning",
            Algorithm::Svm => "SVMs expose no feature importance; try a tree model for explanations",
        }
        .to_string(),
    );
    if feature_count > MANY_FEATURES {
        insights
            .recommendations
            .push("Consider feature selection to reduce model complexity".to_string());
    }
    if artifact
        .metadata
        .dataset
        .as_ref()
        .is_some_and(|d| d.stats.missing_values_total > 0)
    {
        insights
            .recommendations
            .push("Investigate patterns in the missing data".to_string());
    }
    insights
}

fn metrics_text(metrics: &EvaluationMetrics) -> String {
    match metrics {
        EvaluationMetrics::Classification(m) => {
            format!("accuracy {:.1}%, F1 {:.3}", m.accuracy * 100.0, m.f1_score)
        }
        EvaluationMetrics::Regression(m) => format!("R² {:.3}, RMSE {:.3}", m.r2, m.rmse),
    }
}

fn display_name(algorithm: Algorithm) -> &'static str {
    match algorithm {
        Algorithm::RandomForest => "Random Forest",
        Algorithm::LogisticRegression => "Logistic Regression",
        Algorithm::Xgboost => "XGBoost",
        Algorithm::Svm => "SVM",
    }
}

/// Deterministic narrative built from the same aggregates as the prompt
pub fn template_narrative(artifact: &ModelArtifact, insights: &Insights) -> String {
    let model = &artifact.model;
    let mut parts = vec![format!(
        "This {} model was trained for {} to predict the '{}' column using {} features.",
        display_name(model.algorithm),
        model.problem_type,
        model.target_column,
        model.feature_names.len()
    )];
    parts.push(format!(
        "On {} held-out rows it achieved {}.",
        model.training_info.test_samples,
        metrics_text(&model.evaluation_metrics)
    ));
    if let Some(dataset) = &artifact.metadata.dataset {
        let level = match dataset.quality_level {
            crate::profiling::QualityLevel::High => "high",
            crate::profiling::QualityLevel::Moderate => "moderate",
            crate::profiling::QualityLevel::Low => "low",
        };
        parts.push(format!(
            "The training dataset has {} rows and {} columns with {} data quality (score {:.2}).",
            dataset.stats.row_count, dataset.stats.column_count, level, dataset.quality_score
        ));
    }
    if !insights.data_insights.is_empty() {
        let findings: Vec<&str> = insights.data_insights.iter().take(2).map(String::as_str).collect();
        parts.push(format!("Key findings: {}.", findings.join("; ")));
    }
    if !insights.recommendations.is_empty() {
        let recs: Vec<&str> = insights.recommendations.iter().take(2).map(String::as_str).collect();
        parts.push(format!("Recommendations: {}.", recs.join("; ")));
    }
    parts.join(" ")
}

/// Prompt for the text generator; aggregated statistics only
pub fn build_prompt(artifact: &ModelArtifact, insights: &Insights) -> String {
    let model = &artifact.model;
    let mut prompt = String::from(
        "Summarize this machine learning model for a business audience in under 200 words.\n\n",
    );
    prompt.push_str(&format!(
        "Algorithm: {}\nProblem type: {}\nTarget: {}\nFeatures used: {}\nTraining rows: {}\nTest rows: {}\nPerformance: {}\n",
        display_name(model.algorithm),
        model.problem_type,
        model.target_column,
        model.feature_names.len(),
        model.training_info.train_samples,
        model.training_info.test_samples,
        metrics_text(&model.evaluation_metrics)
    ));
    if let Some(dataset) = &artifact.metadata.dataset {
        prompt.push_str(&format!(
            "Dataset: {} rows, {} columns, {:.1}% complete\n",
            dataset.stats.row_count,
            dataset.stats.column_count,
            dataset.completeness * 100.0
        ));
    }
    for line in insights
        .data_insights
        .iter()
        .chain(&insights.performance_insights)
    {
        prompt.push_str("- ");
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt
}
