//! Model training and prediction configuration parsing from environment variables.
//!
//! This module handles the model directory, the hold-out split, the training
//! floor and the boosting hyper-parameters.

use super::parse_var;
use crate::application::ml::training::TrainingConfig;
use crate::application::ml::valuation_service::DEFAULT_ROUNDING_UNIT;
use crate::domain::ml::model::BoostingParameters;
use anyhow::{Result, ensure};
use std::env;
use std::path::PathBuf;

/// Model environment configuration
#[derive(Debug, Clone)]
pub struct ModelEnvConfig {
    pub model_dir: PathBuf,
    pub test_fraction: f64,
    pub min_samples: usize,
    pub random_seed: u64,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    pub subsample: f64,
    pub rounding_unit: i64,
}

impl Default for ModelEnvConfig {
    fn default() -> Self {
        let params = BoostingParameters::default();
        let training = TrainingConfig::default();
        Self {
            model_dir: PathBuf::from("data/models"),
            test_fraction: training.test_fraction,
            min_samples: training.min_samples,
            random_seed: params.seed,
            n_estimators: params.n_estimators,
            learning_rate: params.learning_rate,
            max_depth: params.max_depth,
            subsample: params.subsample,
            rounding_unit: DEFAULT_ROUNDING_UNIT,
        }
    }
}

impl ModelEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            model_dir: lookup("PROPVAL_MODEL_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            test_fraction: parse_var(lookup, "PROPVAL_TEST_FRACTION", defaults.test_fraction)?,
            min_samples: parse_var(lookup, "PROPVAL_MIN_SAMPLES", defaults.min_samples)?,
            random_seed: parse_var(lookup, "PROPVAL_RANDOM_SEED", defaults.random_seed)?,
            n_estimators: parse_var(lookup, "PROPVAL_N_ESTIMATORS", defaults.n_estimators)?,
            learning_rate: parse_var(lookup, "PROPVAL_LEARNING_RATE", defaults.learning_rate)?,
            max_depth: parse_var(lookup, "PROPVAL_MAX_DEPTH", defaults.max_depth)?,
            subsample: parse_var(lookup, "PROPVAL_SUBSAMPLE", defaults.subsample)?,
            rounding_unit: parse_var(lookup, "PROPVAL_ROUNDING_UNIT", defaults.rounding_unit)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.test_fraction > 0.0 && self.test_fraction < 1.0,
            "PROPVAL_TEST_FRACTION must be in (0, 1), got {}",
            self.test_fraction
        );
        ensure!(
            self.subsample > 0.0 && self.subsample <= 1.0,
            "PROPVAL_SUBSAMPLE must be in (0, 1], got {}",
            self.subsample
        );
        ensure!(
            self.learning_rate > 0.0 && self.learning_rate.is_finite(),
            "PROPVAL_LEARNING_RATE must be positive, got {}",
            self.learning_rate
        );
        ensure!(
            self.min_samples >= 2,
            "PROPVAL_MIN_SAMPLES must be at least 2, got {}",
            self.min_samples
        );
        ensure!(self.max_depth >= 1, "PROPVAL_MAX_DEPTH must be at least 1");
        ensure!(
            self.rounding_unit >= 1,
            "PROPVAL_ROUNDING_UNIT must be at least 1, got {}",
            self.rounding_unit
        );
        Ok(())
    }

    pub fn boosting_parameters(&self) -> BoostingParameters {
        BoostingParameters {
            n_estimators: self.n_estimators,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            subsample: self.subsample,
            seed: self.random_seed,
            ..BoostingParameters::default()
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            test_fraction: self.test_fraction,
            min_samples: self.min_samples,
            parameters: self.boosting_parameters(),
        }
    }
}
