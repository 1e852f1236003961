//! Integration test: profiling properties and leakage detection

use insight_automl::dataset::{Dataset, Value};
use insight_automl::profiling::{
    correlation_matrix, LeakageReason, LeakageSeverity, Profiler,
};
use insight_automl::schema::SchemaInferencer;
use proptest::prelude::*;

fn cell() -> impl Strategy<Value = Option<f64>> {
    prop_oneof![
        1 => Just(None),
        6 => (-1000i32..1000).prop_map(|v| Some(v as f64 / 4.0)),
    ]
}

fn numeric_dataset(columns: &[Vec<Option<f64>>]) -> Dataset {
    Dataset::from_columns(columns.iter().enumerate().map(|(i, values)| {
        (
            format!("c{i}"),
            values
                .iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect::<Vec<_>>(),
        )
    }))
    .unwrap()
}

proptest! {
    #[test]
    fn correlation_is_symmetric_and_bounded(
        columns in (2usize..5, 3usize..40).prop_flat_map(|(k, n)| {
            prop::collection::vec(prop::collection::vec(cell(), n), k)
        })
    ) {
        let named: Vec<(String, Vec<Option<f64>>)> = columns
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("c{i}"), v))
            .collect();
        let matrix = correlation_matrix(&named);
        prop_assert!(matrix.is_symmetric());
        for (i, row) in matrix.values.iter().enumerate() {
            prop_assert_eq!(row[i], Some(1.0));
            for r in row.iter().flatten() {
                prop_assert!((-1.0..=1.0).contains(r));
            }
        }
        prop_assert_eq!(
            matrix.columns.len() + matrix.excluded_columns.len(),
            named.len()
        );
    }

    #[test]
    fn profiling_is_idempotent(
        columns in (1usize..4, 2usize..30).prop_flat_map(|(k, n)| {
            prop::collection::vec(prop::collection::vec(cell(), n), k)
        })
    ) {
        let ds = numeric_dataset(&columns);
        let schema = SchemaInferencer::new().infer(&ds).unwrap();
        let first = Profiler::new().profile(&ds, &schema, None).unwrap();
        let second = Profiler::new().profile(&ds, &schema, None).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert!((0.0..=1.0).contains(&first.quality.overall_score));
        prop_assert!((0.0..=1.0).contains(&first.dataset.missing_percentage));
        for column in &first.columns {
            prop_assert!((0.0..=1.0).contains(&column.null_percentage));
            prop_assert!(column.null_count <= ds.n_rows());
        }
    }
}

#[test]
fn test_identical_feature_is_high_leakage() {
    let target: Vec<Value> = (0..50).map(|i| Value::from((i % 2) as f64)).collect();
    let noise: Vec<Value> = (0..50).map(|i| Value::from(((i * 7) % 11) as f64)).collect();
    let ds = Dataset::from_columns(vec![
        ("label", target.clone()),
        ("copy", target),
        ("noise", noise),
    ])
    .unwrap();
    let schema = SchemaInferencer::new().infer(&ds).unwrap();
    let report = Profiler::new().profile(&ds, &schema, Some("label")).unwrap();

    let leakage = report.leakage.unwrap();
    assert!(leakage.checked);
    let flag = leakage.flags.iter().find(|f| f.feature == "copy").unwrap();
    assert_eq!(flag.severity, LeakageSeverity::High);
    assert!(matches!(
        flag.reason,
        LeakageReason::Correlation | LeakageReason::IdenticalToTarget
    ));
    assert!(leakage.flags.iter().all(|f| f.feature != "noise"));
}

#[test]
fn test_unknown_target_is_rejected() {
    let ds = Dataset::from_columns(vec![("a", vec![Value::from(1.0), Value::from(2.0)])]).unwrap();
    let schema = SchemaInferencer::new().infer(&ds).unwrap();
    assert!(Profiler::new().profile(&ds, &schema, Some("missing")).is_err());
}

#[test]
fn test_target_recommendations_prefer_labels() {
    let n = 40;
    let ds = Dataset::from_columns(vec![
        ("customer_id", (0..n).map(|i| Value::from(format!("c{i}"))).collect::<Vec<_>>()),
        ("tenure", (0..n).map(|i| Value::from((i * 3 % 17) as f64)).collect()),
        ("churn", (0..n).map(|i| Value::from(if i % 3 == 0 { "stay" } else { "leave" })).collect()),
    ])
    .unwrap();
    let schema = SchemaInferencer::new().infer(&ds).unwrap();
    let report = Profiler::new().profile(&ds, &schema, None).unwrap();

    let top = &report.target_recommendations[0];
    assert_eq!(top.column, "churn");
    assert!(top.is_suitable);
    let id = report
        .target_recommendations
        .iter()
        .find(|r| r.column == "customer_id")
        .unwrap();
    assert!(!id.is_suitable);
}
