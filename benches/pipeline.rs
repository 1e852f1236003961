use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use insight_automl::dataset::{Dataset, Value};
use insight_automl::profiling::Profiler;
use insight_automl::schema::SchemaInferencer;
use insight_automl::training::{Algorithm, TrainEngine, TrainRequest};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_dataset(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Label depends on the first two features plus noise
    let label: Vec<Value> = (0..n_rows)
        .map(|i| {
            let score = features[0][i] + features.get(1).map_or(0.0, |f| f[i]) + rng.gen::<f64>();
            Value::from(if score > 10.5 { "yes_group" } else { "no_group" })
        })
        .collect();

    let mut columns: Vec<(String, Vec<Value>)> = features
        .into_iter()
        .enumerate()
        .map(|(i, f)| (format!("feature_{i}"), f.into_iter().map(Value::from).collect()))
        .collect();
    let segments = ["a", "b", "c", "d"];
    columns.push((
        "segment".to_string(),
        (0..n_rows).map(|i| Value::from(segments[i % segments.len()])).collect(),
    ));
    columns.push(("label".to_string(), label));

    Dataset::from_columns(columns).unwrap()
}

fn bench_profiling(c: &mut Criterion) {
    let mut group = c.benchmark_group("profiling");

    for n_rows in [1000, 10000].iter() {
        let ds = create_dataset(*n_rows, 10);
        let schema = SchemaInferencer::new().infer(&ds).unwrap();

        group.bench_with_input(BenchmarkId::new("infer_schema", n_rows), &ds, |b, ds| {
            b.iter(|| SchemaInferencer::new().infer(black_box(ds)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("profile", n_rows), &ds, |b, ds| {
            b.iter(|| {
                Profiler::new()
                    .profile(black_box(ds), &schema, Some("label"))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let ds = create_dataset(2000, 10);
    let schema = SchemaInferencer::new().infer(&ds).unwrap();
    let engine = TrainEngine::default().with_n_estimators(20);

    for algorithm in Algorithm::ALL {
        let request = TrainRequest::new("label").with_algorithm(algorithm).with_seed(42);
        group.bench_function(BenchmarkId::new("train", algorithm.as_str()), |b| {
            b.iter(|| {
                engine
                    .train(black_box(&ds), &schema, &request, "model_bench")
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_profiling, bench_training);
criterion_main!(benches);
