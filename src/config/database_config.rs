//! Database configuration parsing from environment variables.

use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://propval.db";

/// Database environment configuration
#[derive(Debug, Clone)]
pub struct DatabaseEnvConfig {
    pub url: String,
}

impl Default for DatabaseEnvConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl DatabaseEnvConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseEnvConfig::from_lookup(&|_: &str| None);
        assert_eq!(config.url, "sqlite://propval.db");
    }

    #[test]
    fn test_database_url_override() {
        let config = DatabaseEnvConfig::from_lookup(&|key: &str| {
            (key == "DATABASE_URL").then(|| "sqlite://data/listings.db".to_string())
        });
        assert_eq!(config.url, "sqlite://data/listings.db");
    }
}
