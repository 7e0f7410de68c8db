//! Confidence-weighted blend of the statistical and ML estimates.

use chrono::Utc;
use income_core::stats::{relative_gap, round_to};
use income_core::{
    confidence_label, HybridPolicy, Methodology, PredictionError, PredictionResult,
    DEFAULT_POLICY_VERSION,
};
use serde::Serialize;
use serde_json::json;

/// Why the weights landed where they did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightShift {
    TowardMl,
    TowardStatistical,
    Parity,
    Default,
}

impl WeightShift {
    pub fn describe(&self) -> &'static str {
        match self {
            WeightShift::TowardMl => "shifted toward ML",
            WeightShift::TowardStatistical => "shifted toward statistical",
            WeightShift::Parity => "near-parity split",
            WeightShift::Default => "default ML-favored split",
        }
    }
}

/// Realized weight split. `ml + statistical == 1.0` always.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightSplit {
    pub ml: f64,
    pub statistical: f64,
    pub shift: WeightShift,
}

/// Pure mapping from `ml.confidence - statistical.confidence` to weights.
pub fn weights_for(confidence_diff: f64, policy: &HybridPolicy) -> WeightSplit {
    let (ml, shift) = if confidence_diff > policy.shift_threshold {
        (
            (policy.base_ml_weight + policy.ml_shift).min(policy.ml_weight_cap),
            WeightShift::TowardMl,
        )
    } else if confidence_diff < -policy.shift_threshold {
        let statistical = ((1.0 - policy.base_ml_weight) + policy.statistical_shift)
            .min(policy.statistical_weight_cap);
        (1.0 - statistical, WeightShift::TowardStatistical)
    } else if confidence_diff.abs() < policy.parity_band {
        (policy.parity_ml_weight, WeightShift::Parity)
    } else {
        (policy.base_ml_weight, WeightShift::Default)
    };

    WeightSplit {
        ml,
        statistical: 1.0 - ml,
        shift,
    }
}

/// Multipliers applied to the weighted base confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceAdjustment {
    pub boost: f64,
    pub penalty: f64,
}

pub fn agreement_adjustment(disagreement: f64, policy: &HybridPolicy) -> ConfidenceAdjustment {
    let boost = if disagreement < policy.strong_agreement_below {
        policy.strong_agreement_boost
    } else if disagreement < policy.moderate_agreement_below {
        policy.moderate_agreement_boost
    } else {
        policy.weak_agreement_boost
    };
    let penalty = if disagreement > policy.penalty_above {
        policy.penalty_multiplier
    } else {
        1.0
    };
    ConfidenceAdjustment { boost, penalty }
}

pub struct HybridCombiner {
    policy: HybridPolicy,
    version: String,
}

impl Default for HybridCombiner {
    fn default() -> Self {
        Self::new(HybridPolicy::default(), DEFAULT_POLICY_VERSION)
    }
}

impl HybridCombiner {
    pub fn new(policy: HybridPolicy, policy_version: &str) -> Self {
        Self {
            policy,
            version: format!("hybrid/{}", policy_version),
        }
    }

    /// Blend a statistical and an ML result for the same region. Inputs are not modified.
    pub fn combine(
        &self,
        statistical: &PredictionResult,
        ml: &PredictionResult,
    ) -> Result<PredictionResult, PredictionError> {
        if statistical.methodology != Methodology::Statistical || ml.methodology != Methodology::Ml {
            return Err(PredictionError::InvariantViolation(format!(
                "hybrid expects statistical + ml inputs, got {} + {}",
                statistical.methodology, ml.methodology
            )));
        }
        if statistical.region_id != ml.region_id {
            return Err(PredictionError::InvariantViolation(format!(
                "region mismatch: statistical {} vs ml {}",
                statistical.region_id, ml.region_id
            )));
        }

        let stat_income = statistical.predicted_income as f64;
        let ml_income = ml.predicted_income as f64;

        let disagreement = relative_gap(stat_income, ml_income).ok_or_else(|| {
            PredictionError::InvariantViolation(format!(
                "non-positive inputs for region {}: statistical ${}, ml ${}",
                statistical.region_id, statistical.predicted_income, ml.predicted_income
            ))
        })?;

        let confidence_diff = ml.confidence - statistical.confidence;
        let weights = weights_for(confidence_diff, &self.policy);
        let predicted_income =
            (weights.statistical * stat_income + weights.ml * ml_income).round() as i64;

        let base_confidence =
            weights.statistical * statistical.confidence + weights.ml * ml.confidence;
        let adjustment = agreement_adjustment(disagreement, &self.policy);
        let confidence = (base_confidence * adjustment.boost * adjustment.penalty)
            .min(self.policy.confidence_cap)
            .clamp(0.0, 1.0);

        let w_ml = round_to(weights.ml, 4);
        let w_stat = round_to(weights.statistical, 4);
        let disagreement_shown = round_to(disagreement, 4);

        let explanation = vec![
            format!(
                "Statistical estimate: ${} at {:.0}% confidence",
                statistical.predicted_income,
                statistical.confidence * 100.0
            ),
            format!(
                "ML estimate: ${} at {:.0}% confidence",
                ml.predicted_income,
                ml.confidence * 100.0
            ),
            format!(
                "Confidence difference (ML - statistical): {:+.3}, {}",
                confidence_diff,
                weights.shift.describe()
            ),
            format!("Weights: ML {:.4}, statistical {:.4}", w_ml, w_stat),
            format!(
                "Combined estimate: ${} = {:.4} x ${} + {:.4} x ${}",
                predicted_income, w_stat, statistical.predicted_income, w_ml, ml.predicted_income
            ),
            format!("Disagreement between methods: {:.4} ({:.2}%)", disagreement_shown, disagreement * 100.0),
            format!(
                "Agreement boost x{:.2}, disagreement penalty x{:.2}",
                adjustment.boost, adjustment.penalty
            ),
            format!(
                "Hybrid confidence: {:.0}% ({}), weighted base {:.0}%, cap {:.0}%",
                confidence * 100.0,
                confidence_label(confidence),
                base_confidence * 100.0,
                self.policy.confidence_cap * 100.0
            ),
        ];

        tracing::debug!(
            "Hybrid for {}: ${} (w_ml {:.2}, disagreement {:.3}, confidence {:.3})",
            statistical.region_id,
            predicted_income,
            weights.ml,
            disagreement,
            confidence
        );

        Ok(PredictionResult {
            region_id: statistical.region_id.clone(),
            jurisdiction: statistical.jurisdiction.clone(),
            predicted_income,
            confidence,
            methodology: Methodology::Hybrid,
            explanation,
            components: json!({
                "statisticalPrediction": statistical.predicted_income,
                "statisticalConfidence": statistical.confidence,
                "mlPrediction": ml.predicted_income,
                "mlConfidence": ml.confidence,
                "weightingStrategy": {
                    "ml": w_ml,
                    "statistical": w_stat,
                    "shift": weights.shift,
                },
                "disagreement": disagreement_shown,
                "agreementBoost": adjustment.boost,
                "disagreementPenalty": adjustment.penalty,
            }),
            model_details: None,
            model_version: self.version.clone(),
            timestamp: Utc::now(),
        })
    }
}
