use async_trait::async_trait;
use income_core::{MlPredictor, PredictionError, PredictionResult, RegionId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MLError, MLResult};
use crate::estimate::OracleEstimate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest<'a> {
    region_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(flatten)]
    estimate: OracleEstimate,
    #[serde(default)]
    model_version: Option<String>,
}

/// Client for a remote income-prediction service
#[derive(Clone)]
pub struct HttpMlPredictor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpMlPredictor {
    pub fn new(base_url: String, timeout: Duration) -> MLResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Request a point estimate for one region
    pub async fn fetch(&self, region: &RegionId) -> MLResult<(OracleEstimate, Option<String>)> {
        let request = PredictRequest {
            region_id: region.as_str(),
        };

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MLError::UnknownRegion(region.to_string()));
        }
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(MLError::ModelNotLoaded);
        }
        if !status.is_success() {
            return Err(MLError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let parsed: PredictResponse = serde_json::from_str(&body)
            .map_err(|e| MLError::InvalidResponse(e.to_string()))?;
        parsed.estimate.validate(region)?;

        Ok((parsed.estimate, parsed.model_version))
    }

    /// `GET {base}/health`; any 2xx counts as healthy
    pub async fn check_health(&self) -> MLResult<bool> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        Ok(response.status().is_success())
    }

    fn classify(&self, err: reqwest::Error) -> MLError {
        if err.is_timeout() {
            MLError::Timeout(self.timeout)
        } else {
            MLError::RequestFailed(err)
        }
    }
}

#[async_trait]
impl MlPredictor for HttpMlPredictor {
    async fn predict(&self, region: &RegionId) -> Result<PredictionResult, PredictionError> {
        let (estimate, version) = self.fetch(region).await.map_err(|e| {
            tracing::warn!("ML service request for {} failed: {}", region, e);
            e
        })?;
        let version = version.unwrap_or_else(|| "remote".to_string());
        Ok(estimate.into_prediction(&version))
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn health(&self) -> Result<bool, PredictionError> {
        Ok(self.check_health().await?)
    }
}
