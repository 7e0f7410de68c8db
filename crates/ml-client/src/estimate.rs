use chrono::Utc;
use income_core::{
    confidence_label, Methodology, ModelDetails, PredictionResult, RegionId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{MLError, MLResult};

/// Raw oracle answer for one region, as returned over the wire or read from a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleEstimate {
    pub region_id: String,
    pub jurisdiction: String,
    pub predicted_income: f64,
    pub confidence: f64,
    /// Feature values the model considered for this region
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    #[serde(default)]
    pub model_details: Option<ModelDetails>,
}

impl OracleEstimate {
    /// Reject answers the rest of the pipeline cannot use.
    pub fn validate(&self, requested: &RegionId) -> MLResult<()> {
        if self.region_id != requested.as_str() {
            return Err(MLError::InvalidResponse(format!(
                "asked for region {}, got {}",
                requested, self.region_id
            )));
        }
        if !self.predicted_income.is_finite() || self.predicted_income.round() <= 0.0 {
            return Err(MLError::InvalidResponse(format!(
                "predicted income must be positive, got {}",
                self.predicted_income
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(MLError::InvalidResponse(format!(
                "confidence must be in [0, 1], got {}",
                self.confidence
            )));
        }
        if let Some((name, _)) = self.features.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MLError::InvalidResponse(format!("feature {} is not finite", name)));
        }
        Ok(())
    }

    pub fn into_prediction(self, model_version: &str) -> PredictionResult {
        let predicted_income = self.predicted_income.round() as i64;

        let mut explanation = vec![
            format!("Model {} point estimate: ${}", model_version, predicted_income),
            format!(
                "Model confidence: {:.0}% ({})",
                self.confidence * 100.0,
                confidence_label(self.confidence)
            ),
        ];
        if let Some(details) = &self.model_details {
            explanation.push(format!(
                "Holdout accuracy {:.3}, RMSE ${:.0}, MAE ${:.0} over {} training samples",
                details.accuracy, details.rmse, details.mae, details.training_size
            ));
        }
        if !self.features.is_empty() {
            let names: Vec<&str> = self.features.keys().map(String::as_str).collect();
            explanation.push(format!("Features considered: {}", names.join(", ")));
        }

        let components = serde_json::to_value(&self.features)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()));

        PredictionResult {
            region_id: self.region_id,
            jurisdiction: self.jurisdiction,
            predicted_income,
            confidence: self.confidence,
            methodology: Methodology::Ml,
            explanation,
            components,
            model_details: self.model_details,
            model_version: model_version.to_string(),
            timestamp: Utc::now(),
        }
    }
}
