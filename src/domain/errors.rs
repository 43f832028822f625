use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the valuation core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValuationError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Model not found at {path}; train a model first")]
    ModelNotFound { path: String },

    #[error("Insufficient training data: {available} usable records (minimum: {required})")]
    InsufficientData { required: usize, available: usize },

    #[error("Cannot derive feature {feature}: {reason}")]
    Encoding { feature: String, reason: String },

    #[error("Model training failed: {reason}")]
    Training { reason: String },

    #[error("Prediction failed: {reason}")]
    Prediction { reason: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },
}

/// Stable tag for each error variant, handed to presentation layers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    ModelNotFound,
    InsufficientData,
    Encoding,
    Training,
    Prediction,
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Training => "training",
            ErrorKind::Prediction => "prediction",
            ErrorKind::Storage => "storage",
        };
        write!(f, "{}", tag)
    }
}

impl ValuationError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn encoding(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            feature: feature.into(),
            reason: reason.into(),
        }
    }

    /// Wraps a collaborator failure (database, filesystem) without losing its context chain.
    pub fn storage(err: impl fmt::Display) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValuationError::Validation { .. } => ErrorKind::Validation,
            ValuationError::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            ValuationError::InsufficientData { .. } => ErrorKind::InsufficientData,
            ValuationError::Encoding { .. } => ErrorKind::Encoding,
            ValuationError::Training { .. } => ErrorKind::Training,
            ValuationError::Prediction { .. } => ErrorKind::Prediction,
            ValuationError::Storage { .. } => ErrorKind::Storage,
        }
    }
}

impl From<anyhow::Error> for ValuationError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage {
            reason: format!("{:#}", err),
        }
    }
}
