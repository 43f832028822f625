use crate::domain::property::{ListingSnapshot, ListingStatus, SoldRecord, parse_land_size};
use crate::domain::repositories::{HistoricalRecordSource, ListingSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// One row of `listing_history` as written by the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingHistoryEntry {
    pub property_id: String,
    pub date: String,
    pub status: ListingStatus,
    pub price_display: Option<String>,
    pub price_value: Option<i64>,
    pub beds: Option<i64>,
    pub baths: Option<i64>,
    pub cars: Option<i64>,
    pub land_size: Option<String>,
    pub property_type: Option<String>,
    pub sold_date_iso: Option<String>,
}

pub struct SqliteListingRepository {
    pool: SqlitePool,
}

impl SqliteListingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert the static property row; `first_seen` is kept from the first insert.
    pub async fn save_property(
        &self,
        property_id: &str,
        address: Option<&str>,
        suburb: &str,
        first_seen: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO properties (property_id, address, suburb, first_seen)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(property_id) DO UPDATE SET
                address = COALESCE(excluded.address, properties.address),
                suburb = excluded.suburb
            "#,
        )
        .bind(property_id)
        .bind(address)
        .bind(suburb)
        .bind(first_seen)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save property {}", property_id))?;

        Ok(())
    }

    /// Upsert a daily snapshot. `price_per_m2` is derived when both price and land parse.
    pub async fn save_snapshot(&self, entry: &ListingHistoryEntry) -> Result<()> {
        let price_per_m2 = match (
            entry.price_value.filter(|p| *p > 0),
            entry.land_size.as_deref().and_then(parse_land_size),
        ) {
            (Some(price), Some(land)) => Some(price as f64 / land),
            _ => None,
        };

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO listing_history
            (property_id, date, status, price_display, price_value, beds, baths, cars,
             land_size, property_type, sold_date_iso, price_per_m2)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.property_id)
        .bind(&entry.date)
        .bind(entry.status.as_str())
        .bind(&entry.price_display)
        .bind(entry.price_value)
        .bind(entry.beds)
        .bind(entry.baths)
        .bind(entry.cars)
        .bind(&entry.land_size)
        .bind(&entry.property_type)
        .bind(&entry.sold_date_iso)
        .bind(price_per_m2)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save snapshot for {}", entry.property_id))?;

        Ok(())
    }
}

#[async_trait]
impl HistoricalRecordSource for SqliteListingRepository {
    async fn sold_records(&self) -> Result<Vec<SoldRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT h.property_id, p.suburb, h.price_value, h.sold_date_iso,
                   h.beds, h.baths, h.cars, h.land_size, h.property_type
            FROM listing_history h
            JOIN properties p ON h.property_id = p.property_id
            WHERE h.status = 'sold'
            ORDER BY h.date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load sold records")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let land_text: Option<String> = row.try_get("land_size")?;
            records.push(SoldRecord {
                property_id: row.try_get("property_id")?,
                suburb: row.try_get("suburb")?,
                sale_price: row.try_get("price_value")?,
                sale_date: row.try_get("sold_date_iso")?,
                beds: row.try_get("beds")?,
                baths: row.try_get("baths")?,
                cars: row.try_get("cars")?,
                land_size: land_text.as_deref().and_then(parse_land_size),
                property_type: row.try_get("property_type")?,
            });
        }
        debug!("SqliteListingRepository: {} sold records", records.len());
        Ok(records)
    }
}

#[async_trait]
impl ListingSource for SqliteListingRepository {
    async fn current_listings(&self, status: ListingStatus) -> Result<Vec<ListingSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT h.property_id, p.suburb, h.property_type, h.beds, h.baths, h.cars,
                   h.land_size, COALESCE(p.first_seen, h.date) AS list_date
            FROM listing_history h
            JOIN properties p ON h.property_id = p.property_id
            WHERE h.status = ?
              AND h.date = (
                  SELECT MAX(date) FROM listing_history
                  WHERE property_id = h.property_id AND status = ?
              )
            ORDER BY h.property_id
            "#,
        )
        .bind(status.as_str())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load '{}' listings", status))?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            listings.push(ListingSnapshot {
                property_id: row.try_get("property_id")?,
                suburb: row.try_get("suburb")?,
                property_type: row.try_get("property_type")?,
                beds: row.try_get("beds")?,
                baths: row.try_get("baths")?,
                cars: row.try_get("cars")?,
                land_size: row.try_get("land_size")?,
                list_date: row.try_get("list_date")?,
            });
        }
        Ok(listings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::database::Database;

    fn entry(id: &str, date: &str, status: ListingStatus) -> ListingHistoryEntry {
        ListingHistoryEntry {
            property_id: id.to_string(),
            date: date.to_string(),
            status,
            price_display: None,
            price_value: None,
            beds: Some(4),
            baths: Some(2),
            cars: Some(2),
            land_size: Some("600m²".to_string()),
            property_type: Some("House".to_string()),
            sold_date_iso: None,
        }
    }

    async fn repo() -> SqliteListingRepository {
        let db = Database::new("sqlite::memory:").await.unwrap();
        SqliteListingRepository::new(db.pool)
    }

    #[tokio::test]
    async fn test_current_listings_returns_latest_snapshot() {
        let repo = repo().await;
        repo.save_property("p1", Some("1 Old Northern Rd"), "CASTLE HILL", "2024-03-01")
            .await
            .unwrap();

        let mut older = entry("p1", "2024-03-01", ListingStatus::Sale);
        older.beds = Some(3);
        repo.save_snapshot(&older).await.unwrap();
        repo.save_snapshot(&entry("p1", "2024-03-08", ListingStatus::Sale))
            .await
            .unwrap();

        let listings = repo.current_listings(ListingStatus::Sale).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].beds, Some(4));
        assert_eq!(listings[0].suburb, "CASTLE HILL");
        assert_eq!(listings[0].list_date.as_deref(), Some("2024-03-01"));

        assert!(repo.current_listings(ListingStatus::Sold).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sold_records_parse_land_text() {
        let repo = repo().await;
        repo.save_property("p2", None, "BAULKHAM HILLS", "2023-11-02")
            .await
            .unwrap();

        let mut sold = entry("p2", "2024-01-20", ListingStatus::Sold);
        sold.price_value = Some(1_450_000);
        sold.land_size = Some("1,200 m2".to_string());
        sold.sold_date_iso = Some("2024-01-18".to_string());
        repo.save_snapshot(&sold).await.unwrap();

        let records = repo.sold_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].suburb, "BAULKHAM HILLS");
        assert_eq!(records[0].sale_price, Some(1_450_000));
        assert_eq!(records[0].land_size, Some(1200.0));
        assert_eq!(records[0].sale_date.as_deref(), Some("2024-01-18"));
    }
}
