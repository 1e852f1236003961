//! Integration test: persisted models and prediction

use insight_automl::dataset::Value;
use insight_automl::prediction::PredictedValue;
use insight_automl::preprocessing::Record;
use insight_automl::training::{Algorithm, TrainRequest};
use insight_automl::{AutoMl, AutoMlConfig, AutoMlError};

fn csv() -> Vec<u8> {
    let mut text = String::from("sqft,rooms,district,price\n");
    for i in 0..90 {
        let sqft = 40 + (i * 17) % 160;
        let rooms = 1 + i % 5;
        let district = ["north", "south", "east"][i % 3];
        let bonus = match district {
            "north" => 50.5,
            "south" => 10.25,
            _ => 0.0,
        };
        let price = sqft as f64 * 3.2 + rooms as f64 * 12.0 + bonus;
        text.push_str(&format!("{sqft},{rooms},{district},{price}\n"));
    }
    text.into_bytes()
}

fn row(sqft: f64, rooms: f64, district: &str) -> Record {
    [
        ("sqft".to_string(), Value::from(sqft)),
        ("rooms".to_string(), Value::from(rooms)),
        ("district".to_string(), Value::from(district)),
    ]
    .into_iter()
    .collect()
}

fn service(dir: &std::path::Path) -> AutoMl {
    let config = AutoMlConfig::in_memory()
        .with_n_estimators(15)
        .with_models_dir(Some(dir));
    AutoMl::new(config).unwrap()
}

#[test]
fn test_persisted_model_predicts_identically_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![row(120.0, 3.0, "north"), row(80.0, 2.0, "west")];

    let (model_id, before) = {
        let automl = service(dir.path());
        let upload = automl.upload(&csv()).unwrap();
        let outcome = automl
            .train(
                &upload.session_id,
                &TrainRequest::new("price")
                    .with_algorithm(Algorithm::RandomForest)
                    .with_seed(42),
            )
            .unwrap();
        let predictions = automl.predict(&outcome.model_id, &rows).unwrap();
        (outcome.model_id, predictions)
    };
    assert!(dir.path().join(format!("{model_id}.json")).exists());

    let reloaded = service(dir.path());
    let after = reloaded.predict(&model_id, &rows).unwrap();
    assert_eq!(before, after);
    assert!(matches!(after[0].prediction, PredictedValue::Number(_)));
    // Unseen category resolves instead of failing
    assert!(after[1].interval_width.is_some());
}

#[test]
fn test_missing_feature_returns_no_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let automl = service(dir.path());
    let upload = automl.upload(&csv()).unwrap();
    let outcome = automl
        .train(&upload.session_id, &TrainRequest::new("price").with_algorithm(Algorithm::Xgboost))
        .unwrap();

    let mut incomplete = row(100.0, 2.0, "east");
    incomplete.remove("rooms");
    let err = automl
        .predict(&outcome.model_id, &[row(90.0, 1.0, "south"), incomplete])
        .unwrap_err();
    match err {
        AutoMlError::MissingFeature { row, columns } => {
            assert_eq!(row, 1);
            assert_eq!(columns, vec!["rooms".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_null_feature_values_are_imputed() {
    let dir = tempfile::tempdir().unwrap();
    let automl = service(dir.path());
    let upload = automl.upload(&csv()).unwrap();
    let outcome = automl
        .train(&upload.session_id, &TrainRequest::new("price"))
        .unwrap();

    let mut sparse = row(100.0, 2.0, "east");
    sparse.insert("sqft".to_string(), Value::Null);
    let results = automl.predict(&outcome.model_id, &[sparse]).unwrap();
    assert_eq!(results.len(), 1);
}

#[test]
fn test_tampered_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let model_id = {
        let automl = service(dir.path());
        let upload = automl.upload(&csv()).unwrap();
        automl
            .train(&upload.session_id, &TrainRequest::new("price"))
            .unwrap()
            .model_id
    };

    let path = dir.path().join(format!("{model_id}.json"));
    let text = std::fs::read_to_string(&path).unwrap();
    let tampered = text.replacen("\"target_column\":\"price\"", "\"target_column\":\"rooms\"", 1);
    assert_ne!(text, tampered);
    std::fs::write(&path, tampered).unwrap();

    let err = service(dir.path()).predict(&model_id, &[row(1.0, 1.0, "north")]).unwrap_err();
    assert!(matches!(err, AutoMlError::IntegrityError(_)));
}

#[test]
fn test_unknown_model_id() {
    let dir = tempfile::tempdir().unwrap();
    let err = service(dir.path()).predict("model_nothing", &[]).unwrap_err();
    assert!(matches!(err, AutoMlError::ModelNotFound(_)));
}
