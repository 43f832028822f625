//! Trains the property valuation model.
//!
//! Reads sold history from SQLite (`DATABASE_URL`) or a CSV export, fits the
//! boosted ensemble and writes the model and its metadata to the model directory.
//!
//! # Usage
//! ```sh
//! cargo run --bin train_model
//! cargo run --bin train_model -- --csv data/sold.csv --test-fraction 0.25
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use propval::application::ml::training::TrainingPipeline;
use propval::config::Config;
use propval::domain::clock::SystemClock;
use propval::domain::repositories::{HistoricalRecordSource, ModelStore};
use propval::infrastructure::persistence::Database;
use propval::infrastructure::persistence::repositories::SqliteListingRepository;
use propval::infrastructure::{CsvHistoricalSource, FileModelStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Read sold history from this CSV file instead of the database
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Directory for the model and metadata files (overrides PROPVAL_MODEL_DIR)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Hold-out fraction for evaluation (overrides PROPVAL_TEST_FRACTION)
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Print the training metadata as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.filter_directive()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut training = config.model.training_config();
    if let Some(fraction) = args.test_fraction {
        training.test_fraction = fraction;
    }
    let model_dir = args.model_dir.unwrap_or_else(|| config.model.model_dir.clone());

    let records = match &args.csv {
        Some(path) => CsvHistoricalSource::new(path).sold_records().await?,
        None => {
            let db = Database::new(&config.database.url).await?;
            SqliteListingRepository::new(db.pool)
                .sold_records()
                .await
                .context("Failed to load sold history from database")?
        }
    };
    info!("Training on {} sold records", records.len());

    let store = FileModelStore::new(&model_dir);
    let pipeline = TrainingPipeline::new(training, Arc::new(SystemClock));
    let model = pipeline.train_and_persist(&records, &store)?;
    let meta = &model.metadata;

    if args.json {
        println!("{}", serde_json::to_string_pretty(meta)?);
        return Ok(());
    }

    println!("\n══════════════════════════════════════════════════════");
    println!("  MODEL TRAINED  ({})", model.model_version());
    println!("══════════════════════════════════════════════════════");
    println!(
        "  Samples:    {} ({} train / {} test)",
        meta.total_samples, meta.metrics.train_size, meta.metrics.test_size
    );
    println!("  Dropped:    {}", meta.dropped.total());
    println!("  R²:         {:.4}", meta.metrics.r2);
    println!("  MAE:        ${:.0}", meta.metrics.mae);
    println!(
        "  MAPE:       {:.2}%  ({})",
        meta.metrics.mape * 100.0,
        meta.confidence_level()
    );

    let mut importance: Vec<(&String, &f64)> = meta.feature_importance.iter().collect();
    importance.sort_by(|a, b| b.1.total_cmp(a.1));
    println!("\n  Top features:");
    for (name, weight) in importance.iter().take(8) {
        println!("    {:<28} {:>6.1}%", name, *weight * 100.0);
    }
    println!("\n  Saved to {}", store.location());

    Ok(())
}
