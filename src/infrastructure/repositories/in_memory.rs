//! In-Memory Repository Implementations
//!
//! Thread-safe, in-memory implementations of the traits defined in
//! `domain::repositories`.
//!
//! # Features
//!
//! - **Thread-safe**: Uses `Arc<RwLock>` for concurrent access
//! - **Testing**: Ideal for unit tests and development
//! - **Same semantics**: the prediction sink archives on overwrite like the SQLite one
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - Limited by available RAM

use crate::domain::errors::ValuationError;
use crate::domain::ml::model::ModelMetadata;
use crate::domain::prediction::PredictionRecord;
use crate::domain::property::{ListingSnapshot, ListingStatus, SoldRecord};
use crate::domain::repositories::{
    HistoricalRecordSource, ListingSource, ModelStore, PredictionSink, StoredModel,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory sold history and current listings
#[derive(Default)]
pub struct InMemoryListingStore {
    sold: Arc<RwLock<Vec<SoldRecord>>>,
    listings: Arc<RwLock<Vec<(ListingStatus, ListingSnapshot)>>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sold(records: Vec<SoldRecord>) -> Self {
        Self {
            sold: Arc::new(RwLock::new(records)),
            listings: Arc::default(),
        }
    }

    pub async fn add_sold(&self, record: SoldRecord) {
        self.sold.write().await.push(record);
    }

    /// Replaces any earlier snapshot of the same property and status.
    pub async fn upsert_listing(&self, status: ListingStatus, snapshot: ListingSnapshot) {
        let mut listings = self.listings.write().await;
        listings.retain(|(s, l)| !(*s == status && l.property_id == snapshot.property_id));
        listings.push((status, snapshot));
    }
}

#[async_trait]
impl HistoricalRecordSource for InMemoryListingStore {
    async fn sold_records(&self) -> Result<Vec<SoldRecord>> {
        Ok(self.sold.read().await.clone())
    }
}

#[async_trait]
impl ListingSource for InMemoryListingStore {
    async fn current_listings(&self, status: ListingStatus) -> Result<Vec<ListingSnapshot>> {
        let listings = self.listings.read().await;
        Ok(listings
            .iter()
            .filter(|(s, _)| *s == status)
            .map(|(_, l)| l.clone())
            .collect())
    }
}

/// In-memory prediction sink. Overwrites move the previous record to history.
#[derive(Default)]
pub struct InMemoryPredictionSink {
    current: Arc<RwLock<HashMap<String, PredictionRecord>>>,
    history: Arc<RwLock<Vec<PredictionRecord>>>,
}

impl InMemoryPredictionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.current.read().await.len()
    }
}

#[async_trait]
impl PredictionSink for InMemoryPredictionSink {
    async fn save_prediction(&self, record: &PredictionRecord) -> Result<()> {
        let mut current = self.current.write().await;
        if let Some(previous) = current.insert(record.property_id.clone(), record.clone()) {
            self.history.write().await.push(previous);
        }
        Ok(())
    }

    async fn latest_prediction(&self, property_id: &str) -> Result<Option<PredictionRecord>> {
        Ok(self.current.read().await.get(property_id).cloned())
    }

    async fn prediction_history(&self, property_id: &str) -> Result<Vec<PredictionRecord>> {
        let history = self.history.read().await;
        Ok(history
            .iter()
            .rev()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect())
    }
}

/// Model store kept in process memory
#[derive(Default)]
pub struct InMemoryModelStore {
    stored: std::sync::RwLock<Option<StoredModel>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn save(&self, artifact: &[u8], metadata: &ModelMetadata) -> Result<(), ValuationError> {
        let mut stored = self
            .stored
            .write()
            .map_err(|e| ValuationError::storage(format!("model store lock poisoned: {}", e)))?;
        *stored = Some(StoredModel {
            artifact: artifact.to_vec(),
            metadata: metadata.clone(),
        });
        Ok(())
    }

    fn load(&self) -> Result<StoredModel, ValuationError> {
        let stored = self
            .stored
            .read()
            .map_err(|e| ValuationError::storage(format!("model store lock poisoned: {}", e)))?;
        stored.clone().ok_or_else(|| ValuationError::ModelNotFound {
            path: self.location(),
        })
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
