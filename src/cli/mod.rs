//! Insight AutoML CLI Module
//!
//! Command-line interface for profiling, training, prediction and model summaries.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AutoMlConfig;
use crate::evaluation::{EvaluationMetrics, FeatureImportance};
use crate::prediction::PredictionResult;
use crate::preprocessing::Record;
use crate::profiling::{ColumnDetails, ProfileReport};
use crate::service::AutoMl;
use crate::summary::NarrativeSource;
use crate::training::{Algorithm, TrainRequest};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn warn(s: &str) -> ColoredString   { s.truecolor(230, 190, 90) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_warn(msg: &str) {
    println!("  {} {}", warn("!"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "insight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dataset profiling and reproducible AutoML")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile a CSV file: schema, statistics, quality and leakage
    Profile {
        /// Input CSV file
        csv: PathBuf,

        /// Target column to check for leakage
        #[arg(short, long)]
        target: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train and register a model on a CSV file
    Train {
        /// Input CSV file
        csv: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Algorithm (random_forest, logistic_regression, xgboost, svm)
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Random seed for splitting and fitting
        #[arg(long)]
        seed: Option<u64>,

        /// Held-out fraction, strictly between 0 and 1
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Directory for model artifacts
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },

    /// Predict rows from a JSON file with a registered model
    Predict {
        /// Registered model id
        #[arg(short, long)]
        model_id: String,

        /// JSON file holding one object or an array of objects
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for model artifacts
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Print predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe a registered model
    Summary {
        /// Registered model id
        #[arg(short, long)]
        model_id: String,

        /// Directory for model artifacts
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn service(models_dir: Option<PathBuf>) -> anyhow::Result<AutoMl> {
    let mut config = AutoMlConfig::new();
    if models_dir.is_some() {
        config = config.with_models_dir(models_dir);
    }
    Ok(AutoMl::new(config)?)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_profile(csv: &Path, target: Option<&str>, json: bool) -> anyhow::Result<()> {
    let automl = AutoMl::new(AutoMlConfig::new().with_models_dir(None::<PathBuf>))?;

    if json {
        let upload = automl.upload_path(csv)?;
        let report = automl.profile(&upload.session_id, target)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Profile");
    step_run("Loading data");
    let start = Instant::now();
    let upload = automl.upload_path(csv)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        upload.row_count,
        upload.column_count,
        start.elapsed()
    ));
    for warning in &upload.warnings {
        step_warn(warning);
    }

    step_run("Profiling");
    let start = Instant::now();
    let report = automl.profile(&upload.session_id, target)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_profile(&report);
    Ok(())
}

fn print_profile(report: &ProfileReport) {
    let stats = &report.dataset;
    println!();
    line_box_top();
    line_box_center(&"Dataset".white().bold().to_string());
    line_box_sep();
    line_box(&kv("Rows          ", &stats.row_count.to_string()));
    line_box(&kv("Columns       ", &stats.column_count.to_string()));
    line_box(&kv(
        "Missing       ",
        &format!("{} ({:.1}%)", stats.missing_values_total, stats.missing_percentage * 100.0),
    ));
    line_box(&kv("Duplicates    ", &stats.duplicate_rows.to_string()));
    line_box(&kv(
        "Quality       ",
        &format!("{:.1} ({:?})", report.quality.overall_score, report.quality.level),
    ));
    line_box_bottom();

    section("Columns");
    for column in &report.columns {
        let detail = match &column.details {
            ColumnDetails::Numerical(s) => match s.std {
                Some(std) => format!("mean {:.3}  std {:.3}", s.mean, std),
                None => format!("mean {:.3}", s.mean),
            },
            ColumnDetails::Categorical(s) => {
                format!("{} categories, top {}", column.unique_count, s.most_frequent)
            }
            ColumnDetails::Boolean(s) => format!("{} true / {} false", s.true_count, s.false_count),
            ColumnDetails::Datetime(s) => format!("{} .. {}", s.min, s.max),
            ColumnDetails::Empty => "no values".to_string(),
        };
        println!(
            "  {:<24} {:<12} {:>6.1}% null  {}",
            column.name.white(),
            muted(&column.inferred_type.to_string()),
            column.null_percentage * 100.0,
            dim(&detail)
        );
    }

    if !report.notable_correlations.is_empty() {
        section("Correlations");
        for pair in &report.notable_correlations {
            println!(
                "  {:<40} {}",
                format!("{} ~ {}", pair.column_a, pair.column_b),
                format!("{:+.3}", pair.correlation).white()
            );
        }
    }

    if let Some(leakage) = &report.leakage {
        section(&format!("Leakage ({})", leakage.target));
        if !leakage.checked {
            step_warn("target is not numerical; correlation checks skipped");
        }
        if leakage.flags.is_empty() {
            step_ok("no suspicious features");
        }
        for flag in &leakage.flags {
            step_warn(&format!(
                "{} {:?} {:?}{}",
                flag.feature,
                flag.severity,
                flag.reason,
                flag.correlation
                    .map(|r| format!(" r={r:.3}"))
                    .unwrap_or_default()
            ));
        }
    }

    if !report.quality.warnings.is_empty() {
        section("Quality warnings");
        for warning in &report.quality.warnings {
            step_warn(&format!("{warning:?}"));
        }
    }

    let suitable: Vec<_> = report
        .target_recommendations
        .iter()
        .filter(|r| r.is_suitable)
        .take(5)
        .collect();
    if !suitable.is_empty() {
        section("Suggested targets");
        for rec in suitable {
            let kind = rec
                .problem_type
                .map(|p| p.to_string())
                .unwrap_or_default();
            println!("  {:<24} {:>3}  {}", rec.column.white(), rec.score, muted(&kind));
        }
    }
    println!();
}

pub fn cmd_train(
    csv: &Path,
    target: &str,
    algorithm: Option<&str>,
    seed: Option<u64>,
    test_fraction: Option<f64>,
    models_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    section("Train");
    let automl = service(models_dir)?;

    let mut request = TrainRequest::new(target);
    if let Some(name) = algorithm {
        request = request.with_algorithm(name.parse::<Algorithm>()?);
    }
    if let Some(seed) = seed {
        request = request.with_seed(seed);
    }
    if let Some(fraction) = test_fraction {
        request = request.with_test_fraction(fraction);
    }

    step_run("Loading data");
    let start = Instant::now();
    let upload = automl.upload_path(csv)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        upload.row_count,
        upload.column_count,
        start.elapsed()
    ));

    let chosen = request.algorithm.or(automl.config().default_algorithm);
    let label = chosen.map_or("recommended algorithm", |a| a.as_str());
    step_run(&format!("Training {}", label.cyan()));
    let start = Instant::now();
    let outcome = automl.train(&upload.session_id, &request)?;
    step_done(&format!("{} in {:?}", outcome.algorithm.as_str(), start.elapsed()));

    println!();
    line_box_top();
    line_box_center(&outcome.model_id.white().bold().to_string());
    line_box_sep();
    for (name, value) in metric_rows(&outcome.evaluation_metrics) {
        line_box(&kv(&format!("{name:<14}"), &format!("{value:.4}")));
    }
    let info = &outcome.training_info;
    line_box(&kv(
        "Split         ",
        &format!("{} train / {} test", info.train_samples, info.test_samples),
    ));
    line_box(&kv(
        "Features      ",
        &format!(
            "{} raw → {} encoded",
            info.features_before_encoding, info.features_after_encoding
        ),
    ));
    line_box_bottom();

    print_importance(&outcome.feature_importance);
    if let Some(root) = automl.registry().root() {
        step_ok(&format!("saved to {}", root.display()));
    }
    println!();
    Ok(())
}

fn metric_rows(metrics: &EvaluationMetrics) -> Vec<(&'static str, f64)> {
    match metrics {
        EvaluationMetrics::Classification(m) => vec![
            ("Accuracy", m.accuracy),
            ("Precision", m.precision),
            ("Recall", m.recall),
            ("F1", m.f1_score),
        ],
        EvaluationMetrics::Regression(m) => vec![("RMSE", m.rmse), ("MAE", m.mae), ("R²", m.r2)],
    }
}

fn print_importance(importance: &FeatureImportance) {
    match importance {
        FeatureImportance::Available { .. } => {
            section("Top features");
            for score in importance.top(10) {
                let bar = "█".repeat((score.importance * 40.0).round() as usize);
                println!(
                    "  {:<28} {:>6.3} {}",
                    score.feature.white(),
                    score.importance,
                    accent(&bar)
                );
            }
        }
        FeatureImportance::NotAvailable { reason } => {
            println!();
            println!("  {}", muted(reason));
        }
    }
}

/// Read prediction rows: a single JSON object or an array of objects
pub fn read_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let records: Vec<Record> = match value {
        serde_json::Value::Array(_) => serde_json::from_value(value)?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(value)?],
        _ => anyhow::bail!("Expected a JSON object or array of objects in {}", path.display()),
    };
    Ok(records)
}

pub fn cmd_predict(
    model_id: &str,
    input: &Path,
    models_dir: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let automl = service(models_dir)?;
    let rows = read_records(input)?;
    let results = automl.predict(model_id, &rows)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    section("Predict");
    step_ok(&format!("{} rows scored with {}", results.len(), model_id.cyan()));
    println!();
    for (i, result) in results.iter().enumerate() {
        println!("  {:>4}  {}  {}", muted(&i.to_string()), result.prediction.to_string().white().bold(), dim(&prediction_detail(result)));
    }
    println!();
    Ok(())
}

fn prediction_detail(result: &PredictionResult) -> String {
    match (result.confidence, result.interval_width) {
        (Some(c), _) => format!("confidence {c:.3}"),
        (None, Some(w)) => format!("interval ±{:.3}", w / 2.0),
        (None, None) => String::new(),
    }
}

pub async fn cmd_summary(model_id: &str, models_dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let automl = service(models_dir)?;
    let summary = automl.model_summary(model_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    section("Summary");
    println!();
    line_box_top();
    line_box_center(&summary.model_id.white().bold().to_string());
    line_box_sep();
    line_box(&kv("Algorithm     ", summary.algorithm.as_str()));
    line_box(&kv("Problem       ", &summary.problem_type.to_string()));
    line_box(&kv("Target        ", &summary.target_column));
    line_box(&kv("Features      ", &summary.feature_count.to_string()));
    let (name, value) = summary.evaluation_metrics.primary();
    line_box(&kv(&format!("{name:<14}"), &format!("{value:.4}")));
    line_box_bottom();

    println!();
    for line in summary.narrative.lines() {
        println!("  {line}");
    }
    if let NarrativeSource::Template(reason) = &summary.narrative_source {
        println!("  {}", dim(&format!("(template narrative: {reason})")));
    }

    for (title, items) in [
        ("Model", &summary.insights.model_insights),
        ("Data", &summary.insights.data_insights),
        ("Performance", &summary.insights.performance_insights),
        ("Recommendations", &summary.insights.recommendations),
    ] {
        if items.is_empty() {
            continue;
        }
        section(title);
        for item in items {
            println!("  {} {}", accent("•"), item);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = Cli::try_parse_from([
            "insight",
            "train",
            "data.csv",
            "--target",
            "churn",
            "--algorithm",
            "xgboost",
            "--seed",
            "7",
            "--test-fraction",
            "0.3",
        ])
        .unwrap();
        match cli.command {
            Commands::Train {
                csv,
                target,
                algorithm,
                seed,
                test_fraction,
                models_dir,
            } => {
                assert_eq!(csv, PathBuf::from("data.csv"));
                assert_eq!(target, "churn");
                assert_eq!(algorithm.as_deref(), Some("xgboost"));
                assert_eq!(seed, Some(7));
                assert_eq!(test_fraction, Some(0.3));
                assert!(models_dir.is_none());
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_train_requires_target() {
        assert!(Cli::try_parse_from(["insight", "train", "data.csv"]).is_err());
    }

    #[test]
    fn test_read_records_accepts_object_or_array() {
        let dir = tempfile::tempdir().unwrap();
        let single = dir.path().join("one.json");
        std::fs::write(&single, r#"{"age": 41, "city": "rome"}"#).unwrap();
        assert_eq!(read_records(&single).unwrap().len(), 1);

        let many = dir.path().join("many.json");
        std::fs::write(&many, r#"[{"age": 41}, {"age": null}]"#).unwrap();
        assert_eq!(read_records(&many).unwrap().len(), 2);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "42").unwrap();
        assert!(read_records(&bad).is_err());
    }

    #[test]
    fn test_strip_ansi() {
        let colored = "abc".green().to_string();
        assert_eq!(strip_ansi(&colored), "abc");
    }
}
