//! Prediction outputs and the per-item lifecycle.

use crate::domain::errors::{ErrorKind, ValuationError};
use crate::domain::ml::model::ConfidenceLevel;
use crate::domain::property::{PropertyAttributes, PropertyType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single prediction:
/// `Unvalidated -> Encoded -> Scored -> Ranged -> Done`, or `Rejected`
/// from `Unvalidated` (bad input) or `Encoded` (market lookup / scoring failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStage {
    Unvalidated,
    Encoded,
    Scored,
    Ranged,
    Done,
    Rejected,
}

impl PredictionStage {
    /// Legal forward transitions.
    pub fn can_advance_to(self, next: PredictionStage) -> bool {
        use PredictionStage::*;
        matches!(
            (self, next),
            (Unvalidated, Encoded)
                | (Encoded, Scored)
                | (Scored, Ranged)
                | (Ranged, Done)
                | (Unvalidated, Rejected)
                | (Encoded, Rejected)
        )
    }
}

impl fmt::Display for PredictionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PredictionStage::Unvalidated => "unvalidated",
            PredictionStage::Encoded => "encoded",
            PredictionStage::Scored => "scored",
            PredictionStage::Ranged => "ranged",
            PredictionStage::Done => "done",
            PredictionStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Point estimate plus MAPE-sized range for one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_price: i64,
    pub price_range_low: i64,
    pub price_range_high: i64,
    pub confidence_level: ConfidenceLevel,
    pub confidence_note: Option<String>,
    pub model_version: String,
    pub predicted_at: DateTime<Utc>,
    /// Land size the model actually saw (after imputation).
    pub land_size_used: f64,
    pub property_type: PropertyType,
    pub input: PropertyAttributes,
}

/// A rejected item, tagged with the stage it was rejected from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionFailure {
    pub stage: PredictionStage,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip)]
    pub error: ValuationError,
}

impl PredictionFailure {
    pub fn new(stage: PredictionStage, error: ValuationError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            error,
        }
    }
}

impl fmt::Display for PredictionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected at {} ({}): {}", self.stage, self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
}

/// Results in input order; each item either succeeded or carries its failure.
#[derive(Debug, Clone)]
pub struct BatchPrediction {
    pub results: Vec<Result<PredictionResult, PredictionFailure>>,
    pub summary: BatchSummary,
}

/// Durable form of a prediction, handed to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub property_id: String,
    pub predicted_price: i64,
    pub price_range_low: i64,
    pub price_range_high: i64,
    pub predicted_at: DateTime<Utc>,
    pub model_version: String,
    pub input: PropertyAttributes,
}

impl PredictionRecord {
    pub fn from_result(property_id: impl Into<String>, result: &PredictionResult) -> Self {
        Self {
            property_id: property_id.into(),
            predicted_price: result.predicted_price,
            price_range_low: result.price_range_low,
            price_range_high: result.price_range_high,
            predicted_at: result.predicted_at,
            model_version: result.model_version.clone(),
            input: result.input.clone(),
        }
    }
}

/// A listing that could not be valued or saved, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedListing {
    pub property_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPredictionSummary {
    pub total_listings: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub saved_count: usize,
    pub model_version: String,
    pub predicted_at: DateTime<Utc>,
    pub skipped: Vec<SkippedListing>,
}
