use futures_util::future::join_all;
use income_core::{
    BatchComparisonEntry, BatchFailure, ComparisonReport, Methodology, MlPredictor,
    PredictionError, PredictionPolicy, PredictionResult, RegionId, RegionStore,
};
use statistical_estimator::StatisticalEstimator;
use std::sync::Arc;
use std::time::Duration;

pub mod comparison;
pub mod hybrid;

pub use comparison::ComparisonEngine;
pub use hybrid::{agreement_adjustment, weights_for, HybridCombiner, WeightShift, WeightSplit};

/// Upper bound on region ids per batch comparison
pub const MAX_BATCH_SIZE: usize = 50;

pub const DEFAULT_ML_TIMEOUT: Duration = Duration::from_secs(5);

/// Entry point for every prediction operation.
///
/// Holds only read-only collaborators, so a single instance is shared across
/// requests behind an `Arc`.
pub struct PredictionOrchestrator {
    store: Arc<dyn RegionStore>,
    ml: Arc<dyn MlPredictor>,
    statistical: StatisticalEstimator,
    hybrid: HybridCombiner,
    comparison: ComparisonEngine,
    policy: PredictionPolicy,
    ml_timeout: Duration,
}

impl PredictionOrchestrator {
    pub fn new(
        store: Arc<dyn RegionStore>,
        ml: Arc<dyn MlPredictor>,
        policy: PredictionPolicy,
        ml_timeout: Duration,
    ) -> Self {
        Self {
            statistical: StatisticalEstimator::new(policy.confidence.clone(), &policy.version),
            hybrid: HybridCombiner::new(policy.hybrid.clone(), &policy.version),
            comparison: ComparisonEngine::new(policy.agreement.clone()),
            store,
            ml,
            policy,
            ml_timeout,
        }
    }

    pub fn policy_version(&self) -> &str {
        &self.policy.version
    }

    pub fn backend_name(&self) -> &'static str {
        self.ml.backend_name()
    }

    pub fn ml_timeout(&self) -> Duration {
        self.ml_timeout
    }

    /// Whether the oracle reports healthy within the ML timeout.
    pub async fn ml_healthy(&self) -> bool {
        match tokio::time::timeout(self.ml_timeout, self.ml.health()).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                tracing::warn!("ML oracle health check failed: {}", e);
                false
            }
            Err(_) => {
                tracing::warn!("ML oracle health check timed out after {:?}", self.ml_timeout);
                false
            }
        }
    }

    /// Known region ids, sorted.
    pub async fn regions(&self) -> Vec<RegionId> {
        self.store.region_ids().await
    }

    pub async fn predict_statistical(&self, region_id: &str) -> Result<PredictionResult, PredictionError> {
        let region = RegionId::parse(region_id)?;
        tracing::info!("Statistical prediction for {}", region);
        self.statistical_for(&region).await
    }

    pub async fn predict_ml(&self, region_id: &str) -> Result<PredictionResult, PredictionError> {
        let region = RegionId::parse(region_id)?;
        tracing::info!("ML prediction for {} via {} backend", region, self.ml.backend_name());
        self.ml_for(&region).await
    }

    pub async fn predict_hybrid(&self, region_id: &str) -> Result<PredictionResult, PredictionError> {
        let region = RegionId::parse(region_id)?;
        tracing::info!("Hybrid prediction for {}", region);
        let (statistical, ml) = self.fan_out(&region).await?;
        self.hybrid.combine(&statistical, &ml)
    }

    /// Run all three methods for one region and compare them. Any failure fails the whole report.
    pub async fn compare_methods(&self, region_id: &str) -> Result<ComparisonReport, PredictionError> {
        let region = RegionId::parse(region_id)?;
        self.compare_region(&region).await
    }

    /// Compare several regions concurrently, one entry per requested id in request order.
    pub async fn compare_batch(
        &self,
        region_ids: &[String],
    ) -> Result<Vec<BatchComparisonEntry>, PredictionError> {
        if region_ids.is_empty() {
            return Err(PredictionError::validation("regionIds", "at least one region id is required"));
        }
        if region_ids.len() > MAX_BATCH_SIZE {
            return Err(PredictionError::validation(
                "regionIds",
                format!("at most {} region ids per batch, got {}", MAX_BATCH_SIZE, region_ids.len()),
            ));
        }

        tracing::info!("Batch comparison for {} regions", region_ids.len());

        let futures = region_ids.iter().map(|raw| async move {
            let outcome = self.compare_methods(raw).await;
            match outcome {
                Ok(report) => BatchComparisonEntry {
                    region_id: raw.trim().to_string(),
                    report: Some(report),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Batch comparison for {} failed: {}", raw, e);
                    BatchComparisonEntry {
                        region_id: raw.trim().to_string(),
                        report: None,
                        error: Some(BatchFailure::from(&e)),
                    }
                }
            }
        });

        Ok(join_all(futures).await)
    }

    async fn compare_region(&self, region: &RegionId) -> Result<ComparisonReport, PredictionError> {
        tracing::info!("Comparing methods for {}", region);

        let (statistical, ml) = self.fan_out(region).await?;
        let hybrid = self.hybrid.combine(&statistical, &ml)?;
        let report = self.comparison.report(statistical, ml, hybrid)?;

        tracing::info!(
            "Comparison for {} complete: agreement {}, recommending {}",
            region,
            report.statistics.agreement,
            report.statistics.recommended_method
        );
        Ok(report)
    }

    /// Statistical and ML concurrently; the first error wins.
    async fn fan_out(&self, region: &RegionId) -> Result<(PredictionResult, PredictionResult), PredictionError> {
        let (statistical, ml) = tokio::try_join!(self.statistical_for(region), self.ml_for(region))?;

        if ml.jurisdiction != statistical.jurisdiction {
            return Err(PredictionError::Upstream(format!(
                "ML oracle placed {} in {} but reference data says {}",
                region, ml.jurisdiction, statistical.jurisdiction
            )));
        }
        Ok((statistical, ml))
    }

    async fn statistical_for(&self, region: &RegionId) -> Result<PredictionResult, PredictionError> {
        self.statistical.predict(self.store.as_ref(), region).await
    }

    async fn ml_for(&self, region: &RegionId) -> Result<PredictionResult, PredictionError> {
        let result = tokio::time::timeout(self.ml_timeout, self.ml.predict(region))
            .await
            .map_err(|_| {
                tracing::warn!("ML oracle timed out for {} after {:?}", region, self.ml_timeout);
                PredictionError::Timeout(self.ml_timeout)
            })??;

        if result.methodology != Methodology::Ml {
            return Err(PredictionError::Upstream(format!(
                "ML oracle returned a {} result",
                result.methodology
            )));
        }
        if result.region_id != region.as_str() {
            return Err(PredictionError::Upstream(format!(
                "ML oracle answered for {} instead of {}",
                result.region_id, region
            )));
        }
        if result.predicted_income <= 0 || !(0.0..=1.0).contains(&result.confidence) {
            return Err(PredictionError::Upstream(format!(
                "ML oracle returned an invalid estimate for {}: ${} at {}",
                region, result.predicted_income, result.confidence
            )));
        }
        Ok(result)
    }
}
