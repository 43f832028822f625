use super::gradient_boosting::GradientBoostedRegressor;
use crate::domain::errors::ValuationError;
use crate::domain::ml::feature_registry::FeatureVector;
use crate::domain::ml::market_context::MarketContext;
use crate::domain::ml::model::ModelMetadata;
use crate::domain::repositories::StoredModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Interface for price regression models
pub trait PriceRegressor: Send + Sync {
    /// Predict a sale price for each feature vector, in order
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>, ValuationError>;

    /// Get model name/type
    fn name(&self) -> &str;
}

/// Serialized payload of the model artifact: the ensemble plus the market
/// context it was trained against. `trained_at` pairs it with its metadata.
#[derive(Deserialize)]
struct ModelArtifact {
    trained_at: DateTime<Utc>,
    regressor: GradientBoostedRegressor,
    market_context: MarketContext,
}

#[derive(Serialize)]
struct ModelArtifactRef<'a> {
    trained_at: DateTime<Utc>,
    regressor: &'a GradientBoostedRegressor,
    market_context: &'a MarketContext,
}

/// A trained regressor with its metadata. Immutable once built.
#[derive(Clone)]
pub struct TrainedModel {
    pub regressor: Arc<dyn PriceRegressor>,
    pub metadata: ModelMetadata,
    pub market_context: MarketContext,
}

impl TrainedModel {
    /// Serializes a boosted ensemble and its context into artifact bytes,
    /// stamped with the training run's `trained_at`.
    pub fn encode_artifact(
        regressor: &GradientBoostedRegressor,
        market_context: &MarketContext,
        trained_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, ValuationError> {
        serde_json::to_vec(&ModelArtifactRef {
            trained_at,
            regressor,
            market_context,
        })
        .map_err(|e| ValuationError::Storage {
            reason: format!("Failed to serialize model: {}", e),
        })
    }

    pub fn from_stored(stored: StoredModel) -> Result<Self, ValuationError> {
        let artifact: ModelArtifact =
            serde_json::from_slice(&stored.artifact).map_err(|e| ValuationError::Storage {
                reason: format!("Failed to deserialize model: {}", e),
            })?;
        if !stored.metadata.feature_order_matches() {
            return Err(ValuationError::Storage {
                reason: format!(
                    "Model feature order {:?} does not match the current feature registry",
                    stored.metadata.feature_order
                ),
            });
        }
        // Model and metadata files are written separately; a crash between the
        // two writes leaves halves of different runs on disk
        if artifact.trained_at != stored.metadata.trained_at {
            return Err(ValuationError::Storage {
                reason: format!(
                    "Model artifact ({}) and metadata ({}) come from different training runs",
                    artifact.trained_at.to_rfc3339(),
                    stored.metadata.trained_at.to_rfc3339()
                ),
            });
        }
        Ok(Self {
            regressor: Arc::new(artifact.regressor),
            metadata: stored.metadata,
            market_context: artifact.market_context,
        })
    }

    pub fn model_version(&self) -> String {
        self.metadata.model_version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::ml::feature_registry::{FEATURE_COUNT, FEATURE_NAMES};
    use crate::domain::ml::model::{BoostingParameters, DroppedRecords, ModelMetrics};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn trained_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap()
    }

    fn metadata(feature_order: Vec<String>) -> ModelMetadata {
        ModelMetadata {
            trained_at: trained_at(),
            metrics: ModelMetrics {
                r2: 0.8,
                mae: 90_000.0,
                mape: 0.11,
                train_size: 32,
                test_size: 8,
            },
            feature_importance: BTreeMap::new(),
            feature_order,
            total_samples: 40,
            dropped: DroppedRecords::default(),
            type_distribution: BTreeMap::new(),
            suburb_distribution: BTreeMap::new(),
            parameters: BoostingParameters::default(),
        }
    }

    fn fitted() -> GradientBoostedRegressor {
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let mut row = vec![0.0; FEATURE_COUNT];
                row[1] = (i % 5 + 1) as f64;
                row
            })
            .collect();
        let y: Vec<f64> = x.iter().map(|row| 400_000.0 + row[1] * 150_000.0).collect();
        let params = BoostingParameters {
            n_estimators: 10,
            ..BoostingParameters::default()
        };
        GradientBoostedRegressor::fit(&x, &y, &params).unwrap()
    }

    #[test]
    fn test_artifact_restores_same_predictions() {
        let regressor = fitted();
        let artifact =
            TrainedModel::encode_artifact(&regressor, &MarketContext::empty(), trained_at()).unwrap();
        let order = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let restored = TrainedModel::from_stored(StoredModel {
            artifact,
            metadata: metadata(order),
        })
        .unwrap();

        let mut values = [0.0; FEATURE_COUNT];
        values[1] = 3.0;
        let input = [FeatureVector::from_array(values)];
        let before = regressor.predict(&input).unwrap()[0];
        let after = restored.regressor.predict(&input).unwrap()[0];
        assert!((before - after).abs() < 1e-6);
        assert_eq!(restored.model_version(), "2024-07-01T03:00:00+00:00");
    }

    #[test]
    fn test_reordered_features_are_rejected() {
        let artifact =
            TrainedModel::encode_artifact(&fitted(), &MarketContext::empty(), trained_at()).unwrap();
        let mut order: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        order.swap(0, 1);
        let err = TrainedModel::from_stored(StoredModel {
            artifact,
            metadata: metadata(order),
        })
        .map(|_| ())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_corrupt_artifact_is_a_storage_error() {
        let order = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let err = TrainedModel::from_stored(StoredModel {
            artifact: b"not a model".to_vec(),
            metadata: metadata(order),
        })
        .map(|_| ())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_artifact_from_another_run_is_rejected() {
        let newer = trained_at() + chrono::Duration::days(7);
        let artifact =
            TrainedModel::encode_artifact(&fitted(), &MarketContext::empty(), newer).unwrap();
        let order = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
        let err = TrainedModel::from_stored(StoredModel {
            artifact,
            metadata: metadata(order),
        })
        .map(|_| ())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("different training runs"));
    }
}
