//! Integration test: CSV loading and schema inference

use insight_automl::dataset::DatasetLoader;
use insight_automl::schema::{ColumnType, SchemaInferencer};
use insight_automl::AutoMlError;

fn load(text: &str) -> insight_automl::dataset::Dataset {
    DatasetLoader::new(1024 * 1024)
        .load_bytes(text.as_bytes())
        .unwrap()
        .dataset
}

#[test]
fn test_age_column_with_nulls() {
    let mut text = String::from("age,city\n");
    for i in 0..100 {
        let age = if i % 20 == 0 {
            String::new()
        } else {
            (18 + i % 48).to_string()
        };
        text.push_str(&format!("{age},city_{}\n", i % 7));
    }
    let ds = load(&text);
    let schema = SchemaInferencer::new().infer(&ds).unwrap();

    let age = schema.get("age").unwrap();
    assert_eq!(age.inferred_type, ColumnType::Numerical);
    assert_eq!(age.null_count, 5);
    assert!((age.null_percentage - 0.05).abs() < 1e-12);
    assert!(!age.is_constant);

    let city = schema.get("city").unwrap();
    assert_eq!(city.inferred_type, ColumnType::Categorical);
    assert_eq!(city.unique_count, 7);
}

#[test]
fn test_boolean_and_datetime_columns() {
    let mut text = String::from("active,joined,score\n");
    for i in 0..30 {
        let active = if i % 3 == 0 { "yes" } else { "no" };
        text.push_str(&format!("{active},2024-01-{:02},{}.5\n", i % 28 + 1, i));
    }
    let schema = SchemaInferencer::new().infer(&load(&text)).unwrap();
    assert_eq!(schema.get("active").unwrap().inferred_type, ColumnType::Boolean);
    assert_eq!(schema.get("joined").unwrap().inferred_type, ColumnType::Datetime);
    assert_eq!(schema.get("score").unwrap().inferred_type, ColumnType::Numerical);
}

#[test]
fn test_all_null_column_is_constant_categorical() {
    let mut text = String::from("x,empty\n");
    for i in 0..12 {
        text.push_str(&format!("{i},\n"));
    }
    let schema = SchemaInferencer::new().infer(&load(&text)).unwrap();
    let empty = schema.get("empty").unwrap();
    assert_eq!(empty.inferred_type, ColumnType::Categorical);
    assert_eq!(empty.unique_count, 0);
    assert!(empty.is_constant);
    assert_eq!(empty.null_percentage, 1.0);
}

#[test]
fn test_upload_size_limit() {
    let loader = DatasetLoader::new(8);
    let result = loader.load_bytes(b"a,b\n1,2\n3,4\n");
    assert!(matches!(result, Err(AutoMlError::FileTooLarge { .. })));
}

#[test]
fn test_header_only_is_empty_dataset() {
    let ds = load("a,b\n");
    assert_eq!(ds.n_rows(), 0);
    assert!(matches!(
        SchemaInferencer::new().infer(&ds),
        Err(AutoMlError::EmptyDataset(_))
    ));
}
