use super::feature_registry::FEATURE_NAMES;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Hold-out evaluation of a trained model. `mape` is a fraction (0.12 = 12%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub r2: f64,
    pub mae: f64,
    pub mape: f64,
    pub train_size: usize,
    pub test_size: usize,
}

/// Hyper-parameters of the boosted ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParameters {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of training rows sampled (without replacement) for each stage.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoostingParameters {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 3,
            subsample: 0.8,
            seed: 42,
        }
    }
}

/// Why records were left out of a training run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecords {
    pub missing_price: usize,
    pub price_out_of_range: usize,
    pub unresolvable_date: usize,
    pub invalid_attributes: usize,
}

impl DroppedRecords {
    pub fn total(&self) -> usize {
        self.missing_price + self.price_out_of_range + self.unresolvable_date + self.invalid_attributes
    }
}

/// Everything persisted next to the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub metrics: ModelMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub feature_order: Vec<String>,
    pub total_samples: usize,
    pub dropped: DroppedRecords,
    pub type_distribution: BTreeMap<String, usize>,
    pub suburb_distribution: BTreeMap<String, usize>,
    pub parameters: BoostingParameters,
}

impl ModelMetadata {
    /// Identifier stamped on every prediction made with this model.
    pub fn model_version(&self) -> String {
        self.trained_at.to_rfc3339()
    }

    /// Whether the persisted order matches the compiled-in registry.
    pub fn feature_order_matches(&self) -> bool {
        self.feature_order.len() == FEATURE_NAMES.len()
            && self
                .feature_order
                .iter()
                .zip(FEATURE_NAMES.iter())
                .all(|(a, b)| a == b)
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_mape(self.metrics.mape)
    }
}

/// Qualitative label derived from the model's hold-out MAPE. Descriptive only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Good,
    Fair,
    Low,
}

impl ConfidenceLevel {
    pub fn from_mape(mape: f64) -> Self {
        if mape < 0.15 {
            ConfidenceLevel::Good
        } else if mape < 0.20 {
            ConfidenceLevel::Fair
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::Good => write!(f, "Good"),
            ConfidenceLevel::Fair => write!(f, "Fair"),
            ConfidenceLevel::Low => write!(f, "Low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(ConfidenceLevel::from_mape(0.08), ConfidenceLevel::Good);
        assert_eq!(ConfidenceLevel::from_mape(0.15), ConfidenceLevel::Fair);
        assert_eq!(ConfidenceLevel::from_mape(0.199), ConfidenceLevel::Fair);
        assert_eq!(ConfidenceLevel::from_mape(0.20), ConfidenceLevel::Low);
    }

    #[test]
    fn test_dropped_total() {
        let dropped = DroppedRecords {
            missing_price: 2,
            price_out_of_range: 1,
            unresolvable_date: 3,
            invalid_attributes: 0,
        };
        assert_eq!(dropped.total(), 6);
    }
}
