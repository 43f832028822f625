//! Logging configuration parsing from environment variables.
//!
//! `RUST_LOG` still wins when set; this only supplies the fallback level.

use std::env;

/// Logging environment configuration
#[derive(Debug, Clone)]
pub struct LoggingEnvConfig {
    pub level: String,
}

impl Default for LoggingEnvConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            level: lookup("PROPVAL_LOG_LEVEL")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Filter directive for `tracing_subscriber::EnvFilter`.
    pub fn filter_directive(&self) -> String {
        format!("{},sqlx=warn", self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingEnvConfig::from_lookup(&|_: &str| None);
        assert_eq!(config.level, "info");
        assert_eq!(config.filter_directive(), "info,sqlx=warn");
    }

    #[test]
    fn test_level_is_normalized() {
        let config = LoggingEnvConfig::from_lookup(&|_: &str| Some(" DEBUG ".to_string()));
        assert_eq!(config.level, "debug");
    }
}
