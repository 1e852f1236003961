//! Insight AutoML - Main Entry Point
//!
//! Profiles datasets, trains models and serves predictions from the command line.

use clap::Parser;
use insight_automl::cli::{cmd_predict, cmd_profile, cmd_summary, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insight_automl=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Profile { csv, target, json } => {
            cmd_profile(&csv, target.as_deref(), json)?;
        }
        Commands::Train { csv, target, algorithm, seed, test_fraction, models_dir } => {
            cmd_train(&csv, &target, algorithm.as_deref(), seed, test_fraction, models_dir)?;
        }
        Commands::Predict { model_id, input, models_dir, json } => {
            cmd_predict(&model_id, &input, models_dir, json)?;
        }
        Commands::Summary { model_id, models_dir, json } => {
            cmd_summary(&model_id, models_dir, json).await?;
        }
    }

    Ok(())
}
