use anyhow::{Context, Result};
use income_core::{InMemoryRegionStore, PredictionPolicy};
use ml_client::MLConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub ml: MLConfig,
    pub region_data_path: Option<PathBuf>,
    pub policy_path: Option<PathBuf>,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let ml = MLConfig::from_lookup(&lookup).context("invalid ML oracle configuration")?;

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            ml,
            region_data_path: get("REGION_DATA_PATH").map(PathBuf::from),
            policy_path: get("PREDICTION_POLICY_PATH").map(PathBuf::from),
            cors_origins,
        })
    }

    pub fn load_policy(&self) -> Result<PredictionPolicy> {
        match &self.policy_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading prediction policy {}", path.display()))?;
                let policy = PredictionPolicy::from_json(&raw)
                    .with_context(|| format!("parsing prediction policy {}", path.display()))?;
                tracing::info!("Loaded prediction policy {} from {}", policy.version, path.display());
                Ok(policy)
            }
            None => Ok(PredictionPolicy::default()),
        }
    }

    pub fn load_region_store(&self) -> Result<InMemoryRegionStore> {
        match &self.region_data_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading region data {}", path.display()))?;
                InMemoryRegionStore::from_json(&raw)
                    .with_context(|| format!("parsing region data {}", path.display()))
            }
            None => InMemoryRegionStore::builtin().context("built-in region data"),
        }
    }
}
