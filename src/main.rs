//! Quakesense: Earthquake severity sequence classifier.
//!
//! Main entry point for the command-line application.

#![allow(non_snake_case)]

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use Quakesense::adapters::checkpoint::JsonCheckpointStore;
use Quakesense::adapters::sqlite::SqliteCatalog;
use Quakesense::adapters::synthetic::{SyntheticCatalog, DEFAULT_READING_COUNT};
use Quakesense::application::{PredictionService, TrainingConfig, TrainingService};
use Quakesense::QuakesenseError;

const DEFAULT_CHECKPOINT_PATH: &str = "best_severity_checkpoint.json";

fn main() -> Result<()> {
    // Initialize logging.
    //
    // IMPORTANT: stdout carries the single structured JSON result, so logs
    // must never land there. Default behavior:
    // - "stderr" (default): log to stderr
    // - "file": log to QUAKESENSE_LOG_FILE (default quakesense.log)
    let log_mode = std::env::var("QUAKESENSE_LOG_MODE").unwrap_or_else(|_| "stderr".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("QUAKESENSE_LOG_FILE")
            .unwrap_or_else(|_| "quakesense.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: don't fail startup just because the directory is missing.
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let outcome = match args.get(1).map(String::as_str) {
        Some("train") => run_train(),
        Some("predict") => match args.get(2) {
            Some(encoded) => run_predict(encoded),
            None => Err(QuakesenseError::MalformedInput(
                "predict requires a window argument".to_string(),
            )),
        },
        Some(other) => Err(QuakesenseError::MalformedInput(format!(
            "Unknown command: {other}"
        ))),
        None => Err(QuakesenseError::MalformedInput(
            "No command provided".to_string(),
        )),
    };

    match outcome {
        Ok(payload) => println!("{payload}"),
        Err(e) => {
            tracing::error!("{e}");
            println!("{}", serde_json::json!({ "error": e.to_string() }));
        }
    }

    Ok(())
}

fn checkpoint_store() -> JsonCheckpointStore {
    let path = std::env::var("QUAKESENSE_CHECKPOINT")
        .unwrap_or_else(|_| DEFAULT_CHECKPOINT_PATH.to_string());
    JsonCheckpointStore::new(path)
}

fn seed() -> u64 {
    std::env::var("QUAKESENSE_SEED")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(42)
}

/// Run the full training pipeline and serialize its report.
fn run_train() -> Quakesense::Result<String> {
    let config = TrainingConfig {
        seed: seed(),
        ..TrainingConfig::default()
    };
    let checkpoints = Arc::new(checkpoint_store());

    let report = match std::env::var("QUAKESENSE_DB") {
        Ok(db_path) => {
            tracing::info!("Training from SQLite catalog at {db_path}");
            let catalog = Arc::new(SqliteCatalog::new(db_path)?);
            TrainingService::new(catalog, checkpoints, config).run()?
        }
        Err(_) => {
            let count = std::env::var("QUAKESENSE_READINGS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_READING_COUNT);
            tracing::warn!(
                "QUAKESENSE_DB not set; training on {count} synthetic readings"
            );
            let catalog = Arc::new(SyntheticCatalog::new(count, seed()));
            TrainingService::new(catalog, checkpoints, config).run()?
        }
    };

    Ok(serde_json::to_string(&report)?)
}

/// Classify one window passed as a JSON array of magnitude readings.
fn run_predict(encoded: &str) -> Quakesense::Result<String> {
    let window: Vec<f64> = serde_json::from_str(encoded).map_err(|e| {
        QuakesenseError::MalformedInput(format!("window must be a JSON array of numbers: {e}"))
    })?;

    let service = PredictionService::new(Arc::new(checkpoint_store()));
    let report = service.predict(&window)?;

    Ok(serde_json::to_string(&report)?)
}
