use income_core::PredictionError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MLError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Region unknown to the model: {0}")]
    UnknownRegion(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type MLResult<T> = Result<T, MLError>;

impl From<MLError> for PredictionError {
    fn from(err: MLError) -> Self {
        match err {
            MLError::UnknownRegion(region) => PredictionError::NotFound(region),
            MLError::Timeout(elapsed) => PredictionError::Timeout(elapsed),
            other => PredictionError::Upstream(format!("ML oracle: {}", other)),
        }
    }
}
