use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool holding listings and valuation results
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let in_memory = db_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("Invalid database URL: {}", db_url))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // Every in-memory connection is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        // 1. Properties (static info)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS properties (
                property_id TEXT PRIMARY KEY,
                address TEXT,
                suburb TEXT NOT NULL,
                first_seen TEXT,
                url TEXT
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create properties table")?;

        // 2. Listing history (one snapshot per property/day/status)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listing_history (
                property_id TEXT NOT NULL,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                price_display TEXT,
                price_value INTEGER,
                beds INTEGER,
                baths INTEGER,
                cars INTEGER,
                land_size TEXT,
                property_type TEXT,
                sold_date_iso TEXT,
                price_per_m2 REAL,
                PRIMARY KEY (property_id, date, status)
            );
            CREATE INDEX IF NOT EXISTS idx_listing_history_status_date
            ON listing_history (status, date);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create listing_history table")?;

        // 3. Current valuation per property
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS valuation_predictions (
                property_id TEXT PRIMARY KEY,
                predicted_price INTEGER NOT NULL,
                price_range_low INTEGER NOT NULL,
                price_range_high INTEGER NOT NULL,
                predicted_at TEXT NOT NULL,
                model_version TEXT NOT NULL,
                input_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create valuation_predictions table")?;

        // 4. Superseded valuations
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS valuation_predictions_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                property_id TEXT NOT NULL,
                predicted_price INTEGER NOT NULL,
                price_range_low INTEGER NOT NULL,
                price_range_high INTEGER NOT NULL,
                predicted_at TEXT NOT NULL,
                model_version TEXT NOT NULL,
                input_json TEXT NOT NULL,
                archived_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_valuation_history_property
            ON valuation_predictions_history (property_id, predicted_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create valuation_predictions_history table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_schema_created_in_memory() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&db.pool)
            .await
            .unwrap();
        let tables: Vec<String> = rows.iter().map(|r| r.try_get("name").unwrap()).collect();

        for expected in [
            "listing_history",
            "properties",
            "valuation_predictions",
            "valuation_predictions_history",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }
}
