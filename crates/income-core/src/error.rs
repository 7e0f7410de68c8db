use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Region not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Upstream timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl PredictionError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PredictionError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable tag, surfaced to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictionError::Validation { .. } => "validation",
            PredictionError::NotFound(_) => "not_found",
            PredictionError::Upstream(_) => "upstream",
            PredictionError::Timeout(_) => "timeout",
            PredictionError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// The offending field for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            PredictionError::Validation { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}
