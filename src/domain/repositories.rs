//! Repository Pattern Abstractions
//!
//! The valuation core reads listings and writes predictions only through
//! these traits. SQLite and in-memory implementations live in
//! `infrastructure`.
//!
//! # Design
//!
//! - `HistoricalRecordSource`: sold properties used for training and market context
//! - `ListingSource`: current snapshot of every listed property
//! - `PredictionSink`: durable store for predictions, archiving prior values
//! - `ModelStore`: byte-level model artifact plus a structured metadata document

use crate::domain::errors::ValuationError;
use crate::domain::ml::model::ModelMetadata;
use crate::domain::prediction::PredictionRecord;
use crate::domain::property::{ListingSnapshot, ListingStatus, SoldRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Source of sold-property history
#[async_trait]
pub trait HistoricalRecordSource: Send + Sync {
    /// All sold records known to the store
    async fn sold_records(&self) -> Result<Vec<SoldRecord>>;
}

/// Source of current listing snapshots
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Latest snapshot per property for the given status
    async fn current_listings(&self, status: ListingStatus) -> Result<Vec<ListingSnapshot>>;
}

/// Durable storage for prediction results
#[async_trait]
pub trait PredictionSink: Send + Sync {
    /// Save a prediction, archiving any previous one for the same property
    async fn save_prediction(&self, record: &PredictionRecord) -> Result<()>;

    /// Current prediction for a property, if any
    async fn latest_prediction(&self, property_id: &str) -> Result<Option<PredictionRecord>>;

    /// Archived predictions for a property, newest first
    async fn prediction_history(&self, property_id: &str) -> Result<Vec<PredictionRecord>>;
}

/// A persisted model: opaque artifact bytes and its metadata.
#[derive(Debug, Clone)]
pub struct StoredModel {
    pub artifact: Vec<u8>,
    pub metadata: ModelMetadata,
}

/// Persistence for trained models. Local and blocking; load happens once at service start.
pub trait ModelStore: Send + Sync {
    fn save(&self, artifact: &[u8], metadata: &ModelMetadata) -> Result<(), ValuationError>;

    /// Fails with `ValuationError::ModelNotFound` when nothing has been trained yet.
    fn load(&self) -> Result<StoredModel, ValuationError>;

    /// Human-readable location, used in logs and errors.
    fn location(&self) -> String;
}
