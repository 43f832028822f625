//! Values a single property, or every current listing.
//!
//! # Usage
//! ```sh
//! cargo run --bin predict -- --suburb "Castle Hill" --beds 4 --land-size 650
//! cargo run --bin predict -- --suburb baulkham --property-type apartment --beds 2 --json
//! cargo run --bin predict -- --all-listings --status sale
//! ```

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::Parser;
use propval::application::ml::valuation_service::ValuationService;
use propval::config::Config;
use propval::domain::clock::SystemClock;
use propval::domain::errors::ValuationError;
use propval::domain::property::{ListingStatus, PropertyAttributes, Suburb};
use propval::infrastructure::FileModelStore;
use propval::infrastructure::persistence::Database;
use propval::infrastructure::persistence::repositories::{
    SqliteListingRepository, SqlitePredictionRepository,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suburb name (Castle Hill or Baulkham Hills)
    #[arg(long)]
    suburb: Option<String>,

    /// Property type, e.g. house, unit, townhouse, apartment, villa
    #[arg(long, default_value = "house")]
    property_type: String,

    #[arg(long)]
    beds: Option<u32>,

    #[arg(long)]
    baths: Option<u32>,

    #[arg(long)]
    cars: Option<u32>,

    /// Land size in square metres
    #[arg(long)]
    land_size: Option<f64>,

    /// Sale or listing date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Predict and persist every current listing instead of a single property
    #[arg(long)]
    all_listings: bool,

    /// Listing status for --all-listings (sale or sold)
    #[arg(long, default_value = "sale")]
    status: String,

    /// Directory holding the trained model (overrides PROPVAL_MODEL_DIR)
    #[arg(long)]
    model_dir: Option<PathBuf>,
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
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let model_dir = args.model_dir.clone().unwrap_or_else(|| config.model.model_dir.clone());
    let mut service = match ValuationService::load(&FileModelStore::new(model_dir), Arc::new(SystemClock)) {
        Ok(service) => service.with_rounding_unit(config.model.rounding_unit),
        Err(e @ ValuationError::ModelNotFound { .. }) => {
            error!("{}", e);
            bail!("No trained model available. Run `train_model` first.");
        }
        Err(e) => return Err(e.into()),
    };

    if args.all_listings {
        let status = ListingStatus::from_str(&args.status)?;
        let db = Database::new(&config.database.url).await?;
        let listings = SqliteListingRepository::new(db.pool.clone());
        let sink = SqlitePredictionRepository::new(db.pool);
        service
            .refresh_market_context_from(&listings)
            .await
            .context("Failed to refresh market context")?;

        let (predictions, summary) = service
            .predict_all_listings(&listings, &sink, status)
            .await
            .context("Failed to predict listings")?;

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "predictions": predictions
                        .iter()
                        .map(|(id, p)| serde_json::json!({ "property_id": id, "prediction": p }))
                        .collect::<Vec<_>>(),
                    "summary": summary,
                }))?
            );
        } else {
            for (id, p) in &predictions {
                println!(
                    "{:<16} ${:>12}  (${} - ${})",
                    id, p.predicted_price, p.price_range_low, p.price_range_high
                );
            }
            println!(
                "\n{} listings: {} predicted, {} failed, {} saved (model {})",
                summary.total_listings,
                summary.success_count,
                summary.error_count,
                summary.saved_count,
                summary.model_version
            );
            for skipped in &summary.skipped {
                println!("  skipped {}: {}", skipped.property_id, skipped.reason);
            }
        }
        return Ok(());
    }

    let (Some(suburb), Some(beds)) = (args.suburb.as_deref(), args.beds) else {
        bail!("--suburb and --beds are required unless --all-listings is given");
    };
    let mut attrs = PropertyAttributes::new(Suburb::from_str(suburb)?, &args.property_type, beds)
        .with_land_size(args.land_size)
        .with_date(args.date);
    if let Some(baths) = args.baths {
        attrs = attrs.with_bathrooms(baths);
    }
    if let Some(cars) = args.cars {
        attrs = attrs.with_car_spaces(cars);
    }

    match Database::new(&config.database.url).await {
        Ok(db) => {
            let listings = SqliteListingRepository::new(db.pool);
            if let Err(e) = service.refresh_market_context_from(&listings).await {
                warn!("Market context refresh failed, using training snapshot: {}", e);
            }
        }
        Err(e) => warn!("Database unavailable, using training snapshot: {:#}", e),
    }

    let result = service.predict_one(&attrs)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Estimated value: ${}", result.predicted_price);
        println!(
            "Range:           ${} - ${}",
            result.price_range_low, result.price_range_high
        );
        println!("Confidence:      {}", result.confidence_level);
        if let Some(note) = &result.confidence_note {
            println!("Note:            {}", note);
        }
        println!("Model:           {}", result.model_version);
    }

    Ok(())
}
