//! Insightful Sales Predictor CLI
//!
//! `sales-predictor train` fits the model on the `TrainingData` table and
//! saves it; `sales-predictor predict` scores inactive customers and writes
//! the results to the `Predictions` table.

mod output;

use anyhow::{Context, Result};
use chrono::Local;
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use output::OutputFormat;
use predictor_lib::{AppConfig, PredictionService, SqlStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Insightful Sales Predictor
#[derive(Parser)]
#[command(name = "sales-predictor")]
#[command(author, version, about = "Train and run the Insightful Sales Predictor", long_about = None)]
struct Cli {
    /// Run mode
    #[arg(value_enum, ignore_case = true)]
    mode: Mode,

    /// Output format for the run report
    #[arg(long, short, default_value = "table")]
    format: OutputFormat,

    /// Write the run's Prometheus metrics to this file
    #[arg(long, value_name = "PATH")]
    metrics_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Train the model and save it to MODEL_PATH
    Train,
    /// Score inactive customers with the saved model
    Predict,
}

fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(1);
            }
        },
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();

    // Reads .env first, so LOG_FORMAT may come from there too
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing();
    info!(mode = ?cli.mode, model_path = ?config.model_path, "Starting sales-predictor");

    let store = SqlStore::connect(&config.db_connection_string)
        .await
        .context("Failed to connect to the sales database")?;
    let service = PredictionService::new(config, store);

    let result = run(&service, cli.mode, cli.format).await;
    service.store().close().await;
    result?;

    if let Some(path) = &cli.metrics_file {
        let text = service
            .metrics()
            .gather_text()
            .context("Failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    }

    Ok(())
}

async fn run(service: &PredictionService<SqlStore>, mode: Mode, format: OutputFormat) -> Result<()> {
    let now = Local::now().naive_local();

    match mode {
        Mode::Train => {
            let report = service.train(now).await.context("Training failed")?;
            output::print_training_report(&report, format);
        }
        Mode::Predict => {
            let report = service.predict(now).await.context("Prediction failed")?;
            output::print_prediction_report(&report, format);
        }
    }

    Ok(())
}
