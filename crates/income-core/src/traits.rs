use async_trait::async_trait;

use crate::{PredictionError, PredictionResult, RegionId, RegionIndicators};

/// Read-only source of region reference data
#[async_trait]
pub trait RegionStore: Send + Sync {
    async fn lookup(&self, region: &RegionId) -> Result<RegionIndicators, PredictionError>;

    /// Every region this store can answer for, in ascending order.
    async fn region_ids(&self) -> Vec<RegionId>;
}

/// Machine-learned income oracle.
///
/// Implementations must be deterministic for a fixed model version and must
/// return a result tagged [`crate::Methodology::Ml`] for the requested region.
#[async_trait]
pub trait MlPredictor: Send + Sync {
    async fn predict(&self, region: &RegionId) -> Result<PredictionResult, PredictionError>;

    fn backend_name(&self) -> &'static str;

    /// Whether the oracle can currently answer. Backends without a remote
    /// dependency are always ready.
    async fn health(&self) -> Result<bool, PredictionError> {
        Ok(true)
    }
}
