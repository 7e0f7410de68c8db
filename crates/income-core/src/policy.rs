//! Tunable heuristics for confidence scoring, hybrid weighting and agreement
//! classification. Grouped under one versioned [`PredictionPolicy`] so a deployment
//! can override them from JSON without touching estimator code.

use serde::{Deserialize, Serialize};

use crate::PredictionError;

pub const DEFAULT_POLICY_VERSION: &str = "income-policy-v1";

/// Confidence heuristics for the statistical estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfidencePolicy {
    pub base: f64,
    pub well_studied_bonus: f64,
    pub education_threshold: f64,
    pub education_bonus: f64,
    pub unemployment_threshold: f64,
    pub unemployment_bonus: f64,
    /// Upper bound on any single bonus
    pub max_single_bonus: f64,
    /// Upper bound on base plus bonuses
    pub cap: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            base: 0.87,
            well_studied_bonus: 0.03,
            education_threshold: 0.75,
            education_bonus: 0.02,
            unemployment_threshold: 0.04,
            unemployment_bonus: 0.02,
            max_single_bonus: 0.05,
            cap: 0.95,
        }
    }
}

/// Weighting and confidence-adjustment rules for the hybrid combiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HybridPolicy {
    /// ML weight before any shift; the statistical weight is its complement
    pub base_ml_weight: f64,
    /// |confidence difference| beyond which weights shift toward the more confident method
    pub shift_threshold: f64,
    /// |confidence difference| below which weights snap to the parity split
    pub parity_band: f64,
    pub ml_shift: f64,
    pub ml_weight_cap: f64,
    pub statistical_shift: f64,
    pub statistical_weight_cap: f64,
    pub parity_ml_weight: f64,
    pub strong_agreement_below: f64,
    pub strong_agreement_boost: f64,
    pub moderate_agreement_below: f64,
    pub moderate_agreement_boost: f64,
    pub weak_agreement_boost: f64,
    pub penalty_above: f64,
    pub penalty_multiplier: f64,
    pub confidence_cap: f64,
}

impl Default for HybridPolicy {
    fn default() -> Self {
        Self {
            base_ml_weight: 0.68,
            shift_threshold: 0.06,
            parity_band: 0.02,
            ml_shift: 0.14,
            ml_weight_cap: 0.82,
            statistical_shift: 0.10,
            statistical_weight_cap: 0.42,
            parity_ml_weight: 0.65,
            strong_agreement_below: 0.12,
            strong_agreement_boost: 1.05,
            moderate_agreement_below: 0.20,
            moderate_agreement_boost: 1.03,
            weak_agreement_boost: 1.01,
            penalty_above: 0.25,
            penalty_multiplier: 0.96,
            confidence_cap: 0.99,
        }
    }
}

/// Thresholds on the maximum relative deviation from the mean
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgreementPolicy {
    pub high_below: f64,
    pub medium_below: f64,
}

impl Default for AgreementPolicy {
    fn default() -> Self {
        Self {
            high_below: 0.05,
            medium_below: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PredictionPolicy {
    pub version: String,
    pub confidence: ConfidencePolicy,
    pub hybrid: HybridPolicy,
    pub agreement: AgreementPolicy,
}

impl Default for PredictionPolicy {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            confidence: ConfidencePolicy::default(),
            hybrid: HybridPolicy::default(),
            agreement: AgreementPolicy::default(),
        }
    }
}

fn fraction(field: &str, value: f64) -> Result<(), PredictionError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PredictionError::validation(field, format!("must be in [0, 1], got {}", value)))
    }
}

impl PredictionPolicy {
    /// Parse a (possibly partial) policy document; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, PredictionError> {
        let policy: PredictionPolicy = serde_json::from_str(raw)
            .map_err(|e| PredictionError::validation("policy", e.to_string()))?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PredictionError> {
        if self.version.trim().is_empty() {
            return Err(PredictionError::validation("policy.version", "must not be empty"));
        }

        let c = &self.confidence;
        for (field, value) in [
            ("policy.confidence.base", c.base),
            ("policy.confidence.wellStudiedBonus", c.well_studied_bonus),
            ("policy.confidence.educationBonus", c.education_bonus),
            ("policy.confidence.unemploymentBonus", c.unemployment_bonus),
            ("policy.confidence.maxSingleBonus", c.max_single_bonus),
            ("policy.confidence.cap", c.cap),
        ] {
            fraction(field, value)?;
        }

        let h = &self.hybrid;
        for (field, value) in [
            ("policy.hybrid.baseMlWeight", h.base_ml_weight),
            ("policy.hybrid.mlWeightCap", h.ml_weight_cap),
            ("policy.hybrid.statisticalWeightCap", h.statistical_weight_cap),
            ("policy.hybrid.parityMlWeight", h.parity_ml_weight),
            ("policy.hybrid.confidenceCap", h.confidence_cap),
        ] {
            fraction(field, value)?;
        }
        if h.parity_band > h.shift_threshold {
            return Err(PredictionError::validation(
                "policy.hybrid.parityBand",
                "must not exceed shiftThreshold",
            ));
        }
        if h.penalty_multiplier <= 0.0 || h.penalty_multiplier > 1.0 {
            return Err(PredictionError::validation(
                "policy.hybrid.penaltyMultiplier",
                "must be in (0, 1]",
            ));
        }

        let a = &self.agreement;
        if !(a.high_below > 0.0 && a.high_below < a.medium_below) {
            return Err(PredictionError::validation(
                "policy.agreement",
                "highBelow must be positive and below mediumBelow",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        assert!(PredictionPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let policy = PredictionPolicy::from_json(
            r#"{"version": "tuned-2", "hybrid": {"baseMlWeight": 0.6}}"#,
        )
        .unwrap();
        assert_eq!(policy.version, "tuned-2");
        assert_eq!(policy.hybrid.base_ml_weight, 0.6);
        assert_eq!(policy.hybrid.ml_weight_cap, 0.82);
        assert_eq!(policy.confidence, ConfidencePolicy::default());
    }

    #[test]
    fn test_rejects_weight_outside_unit_interval() {
        let err = PredictionPolicy::from_json(r#"{"hybrid": {"mlWeightCap": 1.4}}"#).unwrap_err();
        assert_eq!(err.field(), Some("policy.hybrid.mlWeightCap"));
    }

    #[test]
    fn test_rejects_inverted_agreement_thresholds() {
        let err = PredictionPolicy::from_json(
            r#"{"agreement": {"highBelow": 0.2, "mediumBelow": 0.1}}"#,
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("policy.agreement"));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = PredictionPolicy::from_json("{not json").unwrap_err();
        assert_eq!(err.field(), Some("policy"));
    }
}
