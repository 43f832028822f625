//! Prediction Service
//!
//! Holds one immutable [`TrainedModel`] for the life of the process and turns
//! property attributes into a rounded price with a MAPE-sized range.
//!
//! Each item walks `Unvalidated -> Encoded -> Scored -> Ranged -> Done`.
//! Batch paths run items in parallel with rayon and capture failures per item.

use super::feature_encoder::{FeatureEncoder, effective_land_size};
use super::historical_aggregator::{build_context, observations_from_sold};
use super::predictor::TrainedModel;
use crate::domain::clock::Clock;
use crate::domain::errors::ValuationError;
use crate::domain::ml::model::ModelMetadata;
use crate::domain::prediction::{
    BatchPrediction, BatchSummary, ListingPredictionSummary, PredictionFailure, PredictionRecord,
    PredictionResult, PredictionStage, SkippedListing,
};
use crate::domain::property::{ListingStatus, PropertyAttributes, PropertyType, SoldRecord};
use crate::domain::repositories::{
    HistoricalRecordSource, ListingSource, ModelStore, PredictionSink,
};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_ROUNDING_UNIT: i64 = 1000;

/// Upper bound applied to the range fraction so the low end stays positive.
const MAX_RANGE_FRACTION: f64 = 0.99;

pub struct ValuationService {
    model: TrainedModel,
    encoder: FeatureEncoder,
    clock: Arc<dyn Clock>,
    rounding_unit: i64,
}

impl ValuationService {
    pub fn new(model: TrainedModel, clock: Arc<dyn Clock>) -> Self {
        Self {
            model,
            encoder: FeatureEncoder::new(clock.clone()),
            clock,
            rounding_unit: DEFAULT_ROUNDING_UNIT,
        }
    }

    /// Loads the persisted model. Fails fast with `ModelNotFound` on a cold start.
    pub fn load(store: &dyn ModelStore, clock: Arc<dyn Clock>) -> Result<Self, ValuationError> {
        let stored = store.load()?;
        let model = TrainedModel::from_stored(stored)?;
        info!(
            "ValuationService: loaded model {} from {} ({}, MAPE {:.2}%)",
            model.model_version(),
            store.location(),
            model.regressor.name(),
            model.metadata.metrics.mape * 100.0
        );
        Ok(Self::new(model, clock))
    }

    pub fn with_rounding_unit(mut self, unit: i64) -> Self {
        self.rounding_unit = unit.max(1);
        self
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.model.metadata
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Rebuilds the market context from fresh sold history without retraining.
    pub fn refresh_market_context(&mut self, history: &[SoldRecord]) {
        let context = build_context(&observations_from_sold(history));
        info!(
            "ValuationService: market context refreshed from {} records (latest period {})",
            history.len(),
            context
                .latest_period()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        self.model.market_context = context;
    }

    /// Pulls sold history from `source` and refreshes the market context with it.
    pub async fn refresh_market_context_from(
        &mut self,
        source: &dyn HistoricalRecordSource,
    ) -> Result<usize, ValuationError> {
        let history = source.sold_records().await?;
        self.refresh_market_context(&history);
        Ok(history.len())
    }

    /// Values one property. The first failure is returned as-is.
    pub fn predict_one(&self, attrs: &PropertyAttributes) -> Result<PredictionResult, ValuationError> {
        self.predict_tracked(attrs).map_err(|failure| failure.error)
    }

    /// Values every item independently; one bad item never aborts the rest.
    pub fn predict_batch(&self, items: &[PropertyAttributes]) -> BatchPrediction {
        let results: Vec<Result<PredictionResult, PredictionFailure>> =
            items.par_iter().map(|attrs| self.predict_tracked(attrs)).collect();

        for (index, failure) in results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|f| (i, f)))
        {
            warn!("ValuationService: batch item {} {}", index, failure);
        }

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        let summary = BatchSummary {
            total: results.len(),
            success_count,
            error_count: results.len() - success_count,
        };
        debug!(
            "ValuationService: batch of {} ({} ok, {} failed)",
            summary.total, summary.success_count, summary.error_count
        );
        BatchPrediction { results, summary }
    }

    /// Predicts every current listing and saves the successes through `sink`.
    ///
    /// Listings that cannot be converted, valued or saved are logged and listed
    /// in the summary's `skipped`; only a failure to read the source aborts.
    pub async fn predict_all_listings(
        &self,
        source: &dyn ListingSource,
        sink: &dyn PredictionSink,
        status: ListingStatus,
    ) -> Result<(Vec<(String, PredictionResult)>, ListingPredictionSummary), ValuationError> {
        let listings = source.current_listings(status).await?;
        info!(
            "ValuationService: predicting {} '{}' listings",
            listings.len(),
            status
        );

        let outcomes: Vec<(String, Result<PredictionResult, PredictionFailure>)> = listings
            .par_iter()
            .map(|listing| {
                let outcome = PropertyAttributes::try_from(listing)
                    .map_err(|e| PredictionFailure::new(PredictionStage::Unvalidated, e))
                    .and_then(|attrs| self.predict_tracked(&attrs));
                (listing.property_id.clone(), outcome)
            })
            .collect();

        let mut predictions = Vec::new();
        let mut skipped = Vec::new();
        let mut saved_count = 0;
        for (property_id, outcome) in outcomes {
            match outcome {
                Ok(result) => {
                    let record = PredictionRecord::from_result(property_id.clone(), &result);
                    match sink.save_prediction(&record).await {
                        Ok(()) => saved_count += 1,
                        Err(e) => {
                            warn!("ValuationService: failed to save {}: {:#}", property_id, e);
                            skipped.push(SkippedListing {
                                property_id: property_id.clone(),
                                reason: format!("save failed: {:#}", e),
                            });
                        }
                    }
                    predictions.push((property_id, result));
                }
                Err(failure) => {
                    warn!("ValuationService: listing {} {}", property_id, failure);
                    skipped.push(SkippedListing {
                        property_id,
                        reason: failure.to_string(),
                    });
                }
            }
        }

        let summary = ListingPredictionSummary {
            total_listings: listings.len(),
            success_count: predictions.len(),
            error_count: listings.len() - predictions.len(),
            saved_count,
            model_version: self.model.model_version(),
            predicted_at: self.clock.now(),
            skipped,
        };
        info!(
            "ValuationService: {} listings, {} predicted, {} failed, {} saved",
            summary.total_listings, summary.success_count, summary.error_count, summary.saved_count
        );
        Ok((predictions, summary))
    }

    fn predict_tracked(&self, attrs: &PropertyAttributes) -> Result<PredictionResult, PredictionFailure> {
        let mut stage = PredictionStage::Unvalidated;
        let reject = |stage: PredictionStage, error: ValuationError| {
            debug!("ValuationService: {} -> {}", stage, PredictionStage::Rejected);
            PredictionFailure::new(stage, error)
        };

        attrs.validate().map_err(|e| reject(stage, e))?;

        // failures past validation reject from Encoded
        stage = self.advance(stage, PredictionStage::Encoded);
        let features = self
            .encoder
            .encode(attrs, &self.model.market_context, self.clock.today())
            .map_err(|e| reject(stage, e))?;

        let raw = self
            .model
            .regressor
            .predict(&[features])
            .and_then(|out| {
                out.first().copied().ok_or_else(|| ValuationError::Prediction {
                    reason: "regressor returned no output".to_string(),
                })
            })
            .and_then(|raw| {
                if raw.is_finite() && raw > 0.0 {
                    Ok(raw)
                } else {
                    Err(ValuationError::Prediction {
                        reason: format!("regressor produced an unusable price {}", raw),
                    })
                }
            })
            .map_err(|e| reject(stage, e))?;
        let predicted_price = self.round_to_unit(raw);
        if predicted_price <= 0 {
            return Err(reject(
                stage,
                ValuationError::Prediction {
                    reason: format!(
                        "regressor output {:.0} rounds to {} at unit {}",
                        raw, predicted_price, self.rounding_unit
                    ),
                },
            ));
        }
        stage = self.advance(stage, PredictionStage::Scored);

        let mape = self.range_fraction();
        let price_range_low = self.round_to_unit(predicted_price as f64 * (1.0 - mape));
        let price_range_high = self.round_to_unit(predicted_price as f64 * (1.0 + mape));
        stage = self.advance(stage, PredictionStage::Ranged);

        let (land_size_used, has_real_land) = effective_land_size(attrs);
        let result = PredictionResult {
            predicted_price,
            price_range_low,
            price_range_high,
            confidence_level: self.model.metadata.confidence_level(),
            confidence_note: confidence_note(attrs.property_type, land_size_used, has_real_land),
            model_version: self.model.model_version(),
            predicted_at: self.clock.now(),
            land_size_used,
            property_type: attrs.property_type,
            input: attrs.clone(),
        };
        self.advance(stage, PredictionStage::Done);
        Ok(result)
    }

    fn advance(&self, from: PredictionStage, to: PredictionStage) -> PredictionStage {
        debug_assert!(from.can_advance_to(to));
        debug!("ValuationService: {} -> {}", from, to);
        to
    }

    fn range_fraction(&self) -> f64 {
        let mape = self.model.metadata.metrics.mape;
        if mape.is_finite() {
            mape.clamp(0.0, MAX_RANGE_FRACTION)
        } else {
            0.0
        }
    }

    fn round_to_unit(&self, value: f64) -> i64 {
        let unit = self.rounding_unit as f64;
        ((value / unit).round() * unit) as i64
    }
}

fn confidence_note(property_type: PropertyType, land_size_used: f64, has_real_land: bool) -> Option<String> {
    if property_type == PropertyType::Unit {
        Some("Land size not applicable for units".to_string())
    } else if property_type.has_land() && !has_real_land {
        Some(format!("Using imputed land size ({:.0} m²)", land_size_used))
    } else {
        None
    }
}
