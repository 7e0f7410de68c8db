use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PredictionError;

/// Economic indicators for one region: its jurisdiction's row joined with the
/// region-level adjustment. Immutable for the lifetime of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RegionIndicators {
    pub region_id: String,
    /// Parent jurisdiction code (state)
    pub jurisdiction: String,
    /// Jurisdiction median income, whole dollars
    pub median_income: f64,
    /// 1.0 = national baseline
    pub cost_of_living_index: f64,
    pub unemployment_rate: f64,
    pub education_index: f64,
    pub young_demographic_ratio: f64,
    /// Annual growth, may be negative
    pub growth_rate: f64,
    /// Region multiplier applied to the jurisdiction median
    pub adjustment_factor: f64,
    /// Region sits in a well-studied income bracket
    #[serde(default)]
    pub well_studied: bool,
}

impl RegionIndicators {
    pub fn validate(&self) -> Result<(), PredictionError> {
        let values = [
            ("medianIncome", self.median_income),
            ("costOfLivingIndex", self.cost_of_living_index),
            ("unemploymentRate", self.unemployment_rate),
            ("educationIndex", self.education_index),
            ("youngDemographicRatio", self.young_demographic_ratio),
            ("growthRate", self.growth_rate),
            ("adjustmentFactor", self.adjustment_factor),
        ];
        for (field, value) in values {
            if !value.is_finite() {
                return Err(PredictionError::validation(field, "must be finite"));
            }
        }

        if self.median_income <= 0.0 {
            return Err(PredictionError::validation("medianIncome", "must be positive"));
        }
        if self.adjustment_factor <= 0.0 {
            return Err(PredictionError::validation("adjustmentFactor", "must be positive"));
        }
        if self.cost_of_living_index < 0.0 {
            return Err(PredictionError::validation("costOfLivingIndex", "must be non-negative"));
        }
        for (field, value) in [
            ("unemploymentRate", self.unemployment_rate),
            ("educationIndex", self.education_index),
            ("youngDemographicRatio", self.young_demographic_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PredictionError::validation(field, "must be a fraction in [0, 1]"));
            }
        }
        Ok(())
    }
}

/// Estimation method tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Methodology {
    Statistical,
    Ml,
    Hybrid,
}

impl Methodology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Methodology::Statistical => "statistical",
            Methodology::Ml => "ml",
            Methodology::Hybrid => "hybrid",
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Methodology::Statistical => "Statistical",
            Methodology::Ml => "ML",
            Methodology::Hybrid => "Hybrid",
        }
    }
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Holdout performance of the model behind the ML oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ModelDetails {
    pub accuracy: f64,
    pub rmse: f64,
    pub mae: f64,
    pub training_size: u64,
}

/// Output of any estimator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub region_id: String,
    pub jurisdiction: String,
    /// Whole dollars
    pub predicted_income: i64,
    pub confidence: f64, // 0.0 to 1.0
    pub methodology: Methodology,
    pub explanation: Vec<String>,
    /// Method-specific breakdown (factors, weights, or model features)
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub components: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_details: Option<ModelDetails>,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
}

impl PredictionResult {
    /// Look up a numeric component by name.
    pub fn component(&self, name: &str) -> Option<f64> {
        self.components.get(name).and_then(|v| v.as_f64())
    }
}

/// How closely the three methods cluster around their mean
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Agreement {
    High,
    Medium,
    Low,
}

impl Agreement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Agreement::High => "high",
            Agreement::Medium => "medium",
            Agreement::Low => "low",
        }
    }
}

impl fmt::Display for Agreement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispersion across the three predicted incomes plus the recommendation drawn from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComparisonStatistics {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub min: i64,
    pub max: i64,
    pub spread: i64,
    pub max_relative_deviation: f64,
    pub agreement: Agreement,
    pub recommended_method: Methodology,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MethodPrediction {
    pub method: Methodology,
    pub income: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MethodConfidence {
    pub method: Methodology,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MethodDeviation {
    pub method: Methodology,
    pub deviation_from_mean: f64,
}

/// Chart-ready projections of a comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComparisonCharts {
    pub predictions: Vec<MethodPrediction>,
    pub confidence: Vec<MethodConfidence>,
    pub deviations: Vec<MethodDeviation>,
}

/// All three predictions for one region, compared
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub region_id: String,
    pub jurisdiction: String,
    pub statistical: PredictionResult,
    pub ml: PredictionResult,
    pub hybrid: PredictionResult,
    pub statistics: ComparisonStatistics,
    pub charts: ComparisonCharts,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub kind: String,
    pub message: String,
}

impl From<&PredictionError> for BatchFailure {
    fn from(err: &PredictionError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// One region's outcome inside a batch comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct BatchComparisonEntry {
    pub region_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ComparisonReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BatchFailure>,
}

/// Human-readable description of a confidence value.
pub fn confidence_label(confidence: f64) -> &'static str {
    if confidence > 0.9 {
        "very high"
    } else if confidence > 0.8 {
        "high"
    } else if confidence > 0.6 {
        "moderate"
    } else if confidence > 0.4 {
        "low"
    } else {
        "very low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators() -> RegionIndicators {
        RegionIndicators {
            region_id: "90210".into(),
            jurisdiction: "CA".into(),
            median_income: 72000.0,
            cost_of_living_index: 1.45,
            unemployment_rate: 0.042,
            education_index: 0.78,
            young_demographic_ratio: 0.65,
            growth_rate: 0.028,
            adjustment_factor: 1.35,
            well_studied: true,
        }
    }

    #[test]
    fn test_valid_indicators() {
        assert!(indicators().validate().is_ok());
    }

    #[test]
    fn test_negative_growth_is_allowed() {
        let mut ind = indicators();
        ind.growth_rate = -0.04;
        assert!(ind.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let mut ind = indicators();
        ind.unemployment_rate = 1.2;
        assert_eq!(ind.validate().unwrap_err().field(), Some("unemploymentRate"));

        let mut ind = indicators();
        ind.education_index = f64::NAN;
        assert_eq!(ind.validate().unwrap_err().field(), Some("educationIndex"));

        let mut ind = indicators();
        ind.adjustment_factor = 0.0;
        assert_eq!(ind.validate().unwrap_err().field(), Some("adjustmentFactor"));
    }

    #[test]
    fn test_methodology_wire_names() {
        assert_eq!(serde_json::to_string(&Methodology::Ml).unwrap(), "\"ml\"");
        assert_eq!(serde_json::to_string(&Methodology::Statistical).unwrap(), "\"statistical\"");
        assert_eq!(Methodology::Hybrid.to_string(), "hybrid");
    }

    #[test]
    fn test_agreement_ordering_tracks_looseness() {
        assert!(Agreement::High < Agreement::Medium);
        assert!(Agreement::Medium < Agreement::Low);
        assert_eq!(serde_json::to_string(&Agreement::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_confidence_label() {
        assert_eq!(confidence_label(0.95), "very high");
        assert_eq!(confidence_label(0.85), "high");
        assert_eq!(confidence_label(0.7), "moderate");
        assert_eq!(confidence_label(0.1), "very low");
    }
}
