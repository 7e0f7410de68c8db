pub mod error;
pub mod estimate;
pub mod evaluation;
pub mod http;
pub mod table;

pub use error::{MLError, MLResult};
pub use estimate::OracleEstimate;
pub use evaluation::{HoldoutSample, RegressionMetrics};
pub use http::HttpMlPredictor;
pub use table::{PredictionTable, TableMlPredictor};

use income_core::MlPredictor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Which oracle implementation to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlBackend {
    /// Precomputed lookup table (built-in or loaded from `table_path`)
    Table,
    /// Remote prediction service at `predictor_url`
    Http,
}

impl std::str::FromStr for MlBackend {
    type Err = MLError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" => Ok(MlBackend::Table),
            "http" => Ok(MlBackend::Http),
            other => Err(MLError::Other(format!("unknown ML backend '{}'", other))),
        }
    }
}

/// Configuration for the ML oracle
#[derive(Debug, Clone)]
pub struct MLConfig {
    pub backend: MlBackend,
    pub predictor_url: String,
    pub table_path: Option<PathBuf>,
    pub timeout: Duration,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            backend: MlBackend::Table,
            predictor_url: "http://localhost:8005".to_string(),
            table_path: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl MLConfig {
    /// Read `ML_BACKEND`, `ML_PREDICTOR_URL`, `ML_TABLE_PATH` and `ML_TIMEOUT_MS`
    /// through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> MLResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(raw) = get("ML_BACKEND") {
            config.backend = raw.parse()?;
        }
        if let Some(url) = get("ML_PREDICTOR_URL") {
            config.predictor_url = url;
        }
        if let Some(raw) = get("ML_TIMEOUT_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                MLError::Other(format!("ML_TIMEOUT_MS must be a whole number of milliseconds, got '{}'", raw))
            })?;
            if millis == 0 {
                return Err(MLError::Other("ML_TIMEOUT_MS must be positive".to_string()));
            }
            config.timeout = Duration::from_millis(millis);
        }
        config.table_path = get("ML_TABLE_PATH").map(PathBuf::from);

        Ok(config)
    }
}

/// Construct the configured oracle.
pub fn build_predictor(config: &MLConfig) -> MLResult<Arc<dyn MlPredictor>> {
    match config.backend {
        MlBackend::Http => {
            tracing::info!("Using remote ML oracle at {}", config.predictor_url);
            Ok(Arc::new(HttpMlPredictor::new(
                config.predictor_url.clone(),
                config.timeout,
            )?))
        }
        MlBackend::Table => match &config.table_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    MLError::Other(format!("reading {}: {}", path.display(), e))
                })?;
                Ok(Arc::new(TableMlPredictor::from_json(&raw)?))
            }
            None => Ok(Arc::new(TableMlPredictor::builtin()?)),
        },
    }
}
