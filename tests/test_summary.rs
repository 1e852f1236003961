//! Integration test: model summaries with and without a text generator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use insight_automl::summary::{NarrativeSource, TextGenerationError, TextGenerator};
use insight_automl::training::TrainRequest;
use insight_automl::{AutoMl, AutoMlConfig};

struct Fixed(&'static str);

#[async_trait]
impl TextGenerator for Fixed {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenerationError> {
        Ok(self.0.to_string())
    }
}

struct Failing;

#[async_trait]
impl TextGenerator for Failing {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenerationError> {
        Err(TextGenerationError::Unavailable("connection refused".to_string()))
    }
}

struct Slow;

#[async_trait]
impl TextGenerator for Slow {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenerationError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("too late".to_string())
    }
}

/// Records the prompt it was given
struct Capture(parking_lot::Mutex<Option<String>>);

#[async_trait]
impl TextGenerator for Capture {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenerationError> {
        *self.0.lock() = Some(prompt.to_string());
        Ok("captured".to_string())
    }
}

fn csv() -> Vec<u8> {
    let mut text = String::from("tenure,plan,monthly_spend,churn\n");
    for i in 0..80 {
        let tenure = i % 36;
        let plan = ["basic", "plus", "pro"][i % 3];
        let spend = 20 + (i * 13) % 60;
        let churn = if tenure < 12 { "leave" } else { "stay" };
        text.push_str(&format!("{tenure},{plan},{spend},{churn}\n"));
    }
    text.into_bytes()
}

fn trained(generator: Arc<dyn TextGenerator>) -> (AutoMl, String) {
    let config = AutoMlConfig::in_memory()
        .with_n_estimators(10)
        .with_text_generation_timeout(Duration::from_millis(100));
    let automl = AutoMl::new(config).unwrap().with_text_generator(generator);
    let upload = automl.upload(&csv()).unwrap();
    let outcome = automl
        .train(&upload.session_id, &TrainRequest::new("churn").with_seed(42))
        .unwrap();
    (automl, outcome.model_id)
}

#[tokio::test]
async fn test_generated_narrative_is_used() {
    let (automl, model_id) = trained(Arc::new(Fixed("  A churn model.  ")));
    let summary = automl.model_summary(&model_id).await.unwrap();
    assert_eq!(summary.narrative, "A churn model.");
    assert_eq!(summary.narrative_source, NarrativeSource::Generated);
    assert_eq!(summary.target_column, "churn");
    assert!(!summary.top_features.is_empty());
}

#[tokio::test]
async fn test_failing_generator_falls_back_to_template() {
    let (automl, model_id) = trained(Arc::new(Failing));
    let summary = automl.model_summary(&model_id).await.unwrap();
    assert!(matches!(summary.narrative_source, NarrativeSource::Template(_)));
    assert!(summary.narrative.contains("churn"));
}

#[tokio::test]
async fn test_slow_generator_times_out() {
    let (automl, model_id) = trained(Arc::new(Slow));
    let summary = automl.model_summary(&model_id).await.unwrap();
    match summary.narrative_source {
        NarrativeSource::Template(reason) => assert!(reason.contains("timed out")),
        other => panic!("expected template narrative, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_response_falls_back_to_template() {
    let (automl, model_id) = trained(Arc::new(Fixed("   ")));
    let summary = automl.model_summary(&model_id).await.unwrap();
    assert!(matches!(summary.narrative_source, NarrativeSource::Template(_)));
    assert!(!summary.narrative.trim().is_empty());
}

#[tokio::test]
async fn test_prompt_carries_aggregates_only() {
    let capture = Arc::new(Capture(parking_lot::Mutex::new(None)));
    let (automl, model_id) = trained(capture.clone());
    automl.model_summary(&model_id).await.unwrap();

    let prompt = capture.0.lock().clone().unwrap();
    assert!(prompt.contains("churn"));
    assert!(!prompt.contains("basic,"));
    assert!(!prompt.contains("leave"));
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let (automl, _) = trained(Arc::new(Failing));
    assert!(automl.model_summary("model_missing").await.is_err());
}
