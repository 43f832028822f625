use super::evaluation::{permutation_importance, score};
use super::feature_encoder::FeatureEncoder;
use super::gradient_boosting::GradientBoostedRegressor;
use super::historical_aggregator::{build_context, observations_from_sold};
use super::predictor::{PriceRegressor, TrainedModel};
use crate::domain::clock::Clock;
use crate::domain::errors::ValuationError;
use crate::domain::ml::feature_registry::{FEATURE_NAMES, FeatureVector};
use crate::domain::ml::market_context::MarketContext;
use crate::domain::ml::model::{BoostingParameters, DroppedRecords, ModelMetadata, ModelMetrics};
use crate::domain::property::{PropertyAttributes, SoldRecord};
use crate::domain::repositories::ModelStore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sold prices outside this window are treated as data-entry errors.
pub const MIN_TRAINING_PRICE: i64 = 100_000;
pub const MAX_TRAINING_PRICE: i64 = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub min_samples: usize,
    pub parameters: BoostingParameters,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            min_samples: 30,
            parameters: BoostingParameters::default(),
        }
    }
}

/// Usable records after filtering, encoded against their own market context.
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    pub attributes: Vec<PropertyAttributes>,
    pub features: Vec<FeatureVector>,
    pub targets: Vec<f64>,
    pub market_context: MarketContext,
    pub dropped: DroppedRecords,
}

impl TrainingDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    fn type_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for attrs in &self.attributes {
            *counts.entry(attrs.property_type.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    fn suburb_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for attrs in &self.attributes {
            *counts.entry(attrs.suburb.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// A freshly trained model and its serialized artifact, ready for a `ModelStore`.
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub artifact: Vec<u8>,
}

/// Builds a labeled dataset from sold history, fits the boosted ensemble,
/// evaluates it on a seeded hold-out split and optionally persists it.
pub struct TrainingPipeline {
    config: TrainingConfig,
    clock: Arc<dyn Clock>,
    encoder: FeatureEncoder,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            encoder: FeatureEncoder::new(clock.clone()),
            clock,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Filters and encodes records. Record-level problems are counted, never fatal.
    pub fn build_dataset(&self, records: &[SoldRecord]) -> TrainingDataset {
        let mut dropped = DroppedRecords::default();
        let mut usable: Vec<(&SoldRecord, PropertyAttributes, f64)> = Vec::new();

        for record in records {
            let Some(price) = record.sale_price.filter(|p| *p > 0) else {
                dropped.missing_price += 1;
                continue;
            };
            if !(MIN_TRAINING_PRICE..=MAX_TRAINING_PRICE).contains(&price) {
                dropped.price_out_of_range += 1;
                continue;
            }
            if record.resolved_sale_date().is_none() {
                dropped.unresolvable_date += 1;
                continue;
            }
            match record.to_attributes().and_then(|a| a.validate().map(|_| a)) {
                Ok(attrs) => usable.push((record, attrs, price as f64)),
                Err(e) => {
                    debug!("TrainingPipeline: dropping {}: {}", record.property_id, e);
                    dropped.invalid_attributes += 1;
                }
            }
        }

        let usable_records: Vec<SoldRecord> = usable.iter().map(|(r, _, _)| (*r).clone()).collect();
        let market_context = build_context(&observations_from_sold(&usable_records));

        let as_of = self.clock.today();
        let mut attributes = Vec::with_capacity(usable.len());
        let mut features = Vec::with_capacity(usable.len());
        let mut targets = Vec::with_capacity(usable.len());
        for (record, attrs, price) in usable {
            match self.encoder.encode(&attrs, &market_context, as_of) {
                Ok(vector) => {
                    attributes.push(attrs);
                    features.push(vector);
                    targets.push(price);
                }
                Err(e) => {
                    debug!("TrainingPipeline: cannot encode {}: {}", record.property_id, e);
                    dropped.invalid_attributes += 1;
                }
            }
        }

        TrainingDataset {
            attributes,
            features,
            targets,
            market_context,
            dropped,
        }
    }

    /// Trains a model on `records`, holding out `test_fraction` for evaluation.
    pub fn train(
        &self,
        records: &[SoldRecord],
        test_fraction: f64,
    ) -> Result<TrainingOutcome, ValuationError> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ValuationError::validation(
                "test_fraction",
                format!("must be in (0, 1), got {}", test_fraction),
            ));
        }

        info!("TrainingPipeline: {} sold records received", records.len());
        let dataset = self.build_dataset(records);
        let dropped = dataset.dropped;
        info!(
            "TrainingPipeline: {} usable, {} dropped (missing price {}, out of range {}, bad date {}, invalid attributes {})",
            dataset.len(),
            dropped.total(),
            dropped.missing_price,
            dropped.price_out_of_range,
            dropped.unresolvable_date,
            dropped.invalid_attributes
        );

        // a split needs at least one row on each side
        let required = self.config.min_samples.max(2);
        if dataset.len() < required {
            return Err(ValuationError::InsufficientData {
                required,
                available: dataset.len(),
            });
        }

        let type_distribution = dataset.type_distribution();
        let suburb_distribution = dataset.suburb_distribution();
        info!("TrainingPipeline: type distribution {:?}", type_distribution);
        info!("TrainingPipeline: suburb distribution {:?}", suburb_distribution);

        let n = dataset.len();
        let test_size = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(self.config.parameters.seed));
        let (test_idx, train_idx) = indices.split_at(test_size);

        let pick_x = |idx: &[usize]| -> Vec<FeatureVector> {
            idx.iter().map(|&i| dataset.features[i]).collect()
        };
        let pick_y = |idx: &[usize]| -> Vec<f64> { idx.iter().map(|&i| dataset.targets[i]).collect() };
        let (train_x, train_y) = (pick_x(train_idx), pick_y(train_idx));
        let (test_x, test_y) = (pick_x(test_idx), pick_y(test_idx));

        info!(
            "TrainingPipeline: fitting {} trees on {} rows ({} held out)",
            self.config.parameters.n_estimators,
            train_x.len(),
            test_x.len()
        );
        let rows: Vec<Vec<f64>> = train_x.iter().map(FeatureVector::to_vec).collect();
        let regressor = GradientBoostedRegressor::fit(&rows, &train_y, &self.config.parameters)?;

        let scores = score(&test_y, &regressor.predict(&test_x)?);
        let metrics = ModelMetrics {
            r2: scores.r2,
            mae: scores.mae,
            mape: scores.mape,
            train_size: train_x.len(),
            test_size: test_x.len(),
        };
        info!(
            "TrainingPipeline: R²={:.4} MAE={:.0} MAPE={:.2}%",
            metrics.r2,
            metrics.mae,
            metrics.mape * 100.0
        );
        if metrics.r2 < 0.0 {
            warn!("TrainingPipeline: model is worse than predicting the mean on the hold-out set");
        }

        let feature_importance =
            permutation_importance(&regressor, &train_x, &train_y, self.config.parameters.seed)?;

        let metadata = ModelMetadata {
            trained_at: self.clock.now(),
            metrics,
            feature_importance,
            feature_order: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            total_samples: n,
            dropped,
            type_distribution,
            suburb_distribution,
            parameters: self.config.parameters,
        };

        let artifact = TrainedModel::encode_artifact(
            &regressor,
            &dataset.market_context,
            metadata.trained_at,
        )?;
        let model = TrainedModel {
            regressor: Arc::new(regressor),
            metadata,
            market_context: dataset.market_context,
        };
        Ok(TrainingOutcome { model, artifact })
    }

    /// Trains with the configured hold-out fraction and persists the result.
    pub fn train_and_persist(
        &self,
        records: &[SoldRecord],
        store: &dyn ModelStore,
    ) -> Result<TrainedModel, ValuationError> {
        let TrainingOutcome { model, artifact } = self.train(records, self.config.test_fraction)?;
        store.save(&artifact, &model.metadata)?;
        info!(
            "TrainingPipeline: model {} saved to {}",
            model.model_version(),
            store.location()
        );
        Ok(model)
    }
}
