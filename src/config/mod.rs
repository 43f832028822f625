//! Configuration module for propval.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Database, Model and Logging.
//!
//! Every sub-config can also be built from an arbitrary key lookup, which is
//! how the tests exercise parsing without touching the process environment.

mod database_config;
mod logging_config;
mod model_config;

pub use database_config::DatabaseEnvConfig;
pub use logging_config::LoggingEnvConfig;
pub use model_config::ModelEnvConfig;

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DatabaseEnvConfig,
    pub model: ModelEnvConfig,
    pub logging: LoggingEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database: DatabaseEnvConfig::from_lookup(&lookup),
            model: ModelEnvConfig::from_lookup(&lookup).context("Failed to load model config")?,
            logging: LoggingEnvConfig::from_lookup(&lookup),
        })
    }
}

/// Reads `key` through `lookup`, falling back to `default` when unset or blank.
pub(crate) fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {}={}", key, raw)),
        _ => Ok(default),
    }
}
