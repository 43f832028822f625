use crate::domain::prediction::PredictionRecord;
use crate::domain::repositories::PredictionSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;

pub struct SqlitePredictionRepository {
    pool: SqlitePool,
}

impl SqlitePredictionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<PredictionRecord> {
        let predicted_at: String = row.try_get("predicted_at")?;
        let input_json: String = row.try_get("input_json")?;
        Ok(PredictionRecord {
            property_id: row.try_get("property_id")?,
            predicted_price: row.try_get("predicted_price")?,
            price_range_low: row.try_get("price_range_low")?,
            price_range_high: row.try_get("price_range_high")?,
            predicted_at: DateTime::parse_from_rfc3339(&predicted_at)
                .with_context(|| format!("Invalid predicted_at '{}'", predicted_at))?
                .with_timezone(&Utc),
            model_version: row.try_get("model_version")?,
            input: serde_json::from_str(&input_json).context("Invalid input snapshot JSON")?,
        })
    }
}

#[async_trait]
impl PredictionSink for SqlitePredictionRepository {
    async fn save_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let input_json =
            serde_json::to_string(&record.input).context("Failed to serialize input snapshot")?;
        let mut tx = self.pool.begin().await?;

        // Move the current value to the archive before replacing it
        let archived = sqlx::query(
            r#"
            INSERT INTO valuation_predictions_history
            (property_id, predicted_price, price_range_low, price_range_high,
             predicted_at, model_version, input_json, archived_at)
            SELECT property_id, predicted_price, price_range_low, price_range_high,
                   predicted_at, model_version, input_json, ?
            FROM valuation_predictions WHERE property_id = ?
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&record.property_id)
        .execute(&mut *tx)
        .await
        .context("Failed to archive previous prediction")?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO valuation_predictions
            (property_id, predicted_price, price_range_low, price_range_high,
             predicted_at, model_version, input_json)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.property_id)
        .bind(record.predicted_price)
        .bind(record.price_range_low)
        .bind(record.price_range_high)
        .bind(record.predicted_at.to_rfc3339())
        .bind(&record.model_version)
        .bind(input_json)
        .execute(&mut *tx)
        .await
        .context("Failed to save prediction")?;

        tx.commit().await.context("Failed to commit prediction")?;

        debug!(
            "Persisted prediction for {} ({} archived)",
            record.property_id,
            archived.rows_affected()
        );
        Ok(())
    }

    async fn latest_prediction(&self, property_id: &str) -> Result<Option<PredictionRecord>> {
        let row = sqlx::query("SELECT * FROM valuation_predictions WHERE property_id = ?")
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn prediction_history(&self, property_id: &str) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM valuation_predictions_history WHERE property_id = ? ORDER BY id DESC",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
