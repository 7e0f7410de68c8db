//! Deterministic econometric income estimator.
//!
//! The estimate is a product of multiplicative adjustments applied to the
//! jurisdiction median scaled by the region adjustment factor:
//!
//! ```text
//! income = median * adjustment * col * education * unemployment * demographic * growth
//! ```
//!
//! No randomness and no I/O beyond the single reference-store read, so identical
//! indicators always yield identical income, confidence and components.

use chrono::Utc;
use income_core::stats::round_to;
use income_core::{
    confidence_label, ConfidencePolicy, Methodology, PredictionError, PredictionResult, RegionId,
    RegionIndicators, RegionStore, DEFAULT_POLICY_VERSION,
};
use serde_json::json;

/// Cost-of-living indices above this are dampened
pub const COL_DAMPENING_THRESHOLD: f64 = 1.3;
pub const COL_DAMPENING_RATE: f64 = 0.65;
pub const EDUCATION_WEIGHT: f64 = 0.15;
pub const UNEMPLOYMENT_WEIGHT: f64 = 3.0;
pub const DEMOGRAPHIC_WEIGHT: f64 = 0.10;
pub const GROWTH_WEIGHT: f64 = 0.5;

/// The multiplicative adjustments for one region, at full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncomeFactors {
    pub base_income: f64,
    pub region_adjustment: f64,
    pub cost_of_living: f64,
    pub education: f64,
    pub unemployment: f64,
    pub demographic: f64,
    pub growth: f64,
}

impl IncomeFactors {
    pub fn from_indicators(ind: &RegionIndicators) -> Self {
        // Diminishing returns at the expensive end
        let cost_of_living = if ind.cost_of_living_index > COL_DAMPENING_THRESHOLD {
            1.0 + (ind.cost_of_living_index - 1.0) * COL_DAMPENING_RATE
        } else {
            ind.cost_of_living_index
        };

        Self {
            base_income: ind.median_income * ind.adjustment_factor,
            region_adjustment: ind.adjustment_factor,
            cost_of_living,
            education: 1.0 + ind.education_index * EDUCATION_WEIGHT,
            // Not clamped: rates above ~33% drive this to zero or below.
            unemployment: 1.0 - ind.unemployment_rate * UNEMPLOYMENT_WEIGHT,
            demographic: 1.0 + ind.young_demographic_ratio * DEMOGRAPHIC_WEIGHT,
            growth: 1.0 + ind.growth_rate * GROWTH_WEIGHT,
        }
    }

    pub fn estimate(&self) -> f64 {
        self.base_income
            * self.cost_of_living
            * self.education
            * self.unemployment
            * self.demographic
            * self.growth
    }
}

fn pct_change(factor: f64) -> String {
    format!("{:+.2}%", (factor - 1.0) * 100.0)
}

pub struct StatisticalEstimator {
    policy: ConfidencePolicy,
    version: String,
}

impl Default for StatisticalEstimator {
    fn default() -> Self {
        Self::new(ConfidencePolicy::default(), DEFAULT_POLICY_VERSION)
    }
}

impl StatisticalEstimator {
    pub fn new(policy: ConfidencePolicy, policy_version: &str) -> Self {
        Self {
            policy,
            version: format!("statistical/{}", policy_version),
        }
    }

    /// Base confidence plus capped bonuses for well-understood regions.
    /// Returns the confidence and the names of the bonuses that applied.
    pub fn confidence_for(&self, ind: &RegionIndicators) -> (f64, Vec<&'static str>) {
        let p = &self.policy;
        let mut bonus = 0.0;
        let mut reasons = Vec::new();

        if ind.well_studied {
            bonus += p.well_studied_bonus.min(p.max_single_bonus);
            reasons.push("well-studied income bracket");
        }
        if ind.education_index > p.education_threshold {
            bonus += p.education_bonus.min(p.max_single_bonus);
            reasons.push("high education index");
        }
        if ind.unemployment_rate < p.unemployment_threshold {
            bonus += p.unemployment_bonus.min(p.max_single_bonus);
            reasons.push("low unemployment");
        }

        ((p.base + bonus).min(p.cap).clamp(0.0, 1.0), reasons)
    }

    /// Pure estimate from an already-fetched indicator snapshot.
    pub fn estimate(&self, ind: &RegionIndicators) -> Result<PredictionResult, PredictionError> {
        let factors = IncomeFactors::from_indicators(ind);

        if factors.unemployment <= 0.0 {
            tracing::warn!(
                "Unemployment factor {:.4} for region {} is non-positive (rate {:.3})",
                factors.unemployment,
                ind.region_id,
                ind.unemployment_rate
            );
        }

        let raw = factors.estimate();
        if !raw.is_finite() || raw.round() <= 0.0 {
            return Err(PredictionError::InvariantViolation(format!(
                "statistical estimate for region {} is not a positive amount ({:.2})",
                ind.region_id, raw
            )));
        }
        let predicted_income = raw.round() as i64;
        let (confidence, bonuses) = self.confidence_for(ind);

        // Components and explanation are formatted from the same rounded values
        let base_income = factors.base_income.round() as i64;
        let adjustment = round_to(factors.region_adjustment, 4);
        let col = round_to(factors.cost_of_living, 4);
        let education = round_to(factors.education, 4);
        let unemployment = round_to(factors.unemployment, 4);
        let demographic = round_to(factors.demographic, 4);
        let growth = round_to(factors.growth, 4);

        let col_note = if ind.cost_of_living_index > COL_DAMPENING_THRESHOLD {
            format!(
                "index {:.2} dampened above {:.2}",
                ind.cost_of_living_index, COL_DAMPENING_THRESHOLD
            )
        } else {
            format!("index {:.2} applied directly", ind.cost_of_living_index)
        };

        let bonus_note = if bonuses.is_empty() {
            "no bonuses".to_string()
        } else {
            format!("bonuses for {}", bonuses.join(", "))
        };

        let explanation = vec![
            format!(
                "Base income: ${} (jurisdiction {} median ${:.0} x region adjustment {:.4})",
                base_income, ind.jurisdiction, ind.median_income, adjustment
            ),
            format!("Cost of living factor: {:.4} ({}), {}", col, pct_change(col), col_note),
            format!(
                "Education factor: {:.4} ({}) from education index {:.2}",
                education,
                pct_change(education),
                ind.education_index
            ),
            format!(
                "Unemployment factor: {:.4} ({}) from unemployment rate {:.1}%",
                unemployment,
                pct_change(unemployment),
                ind.unemployment_rate * 100.0
            ),
            format!(
                "Demographic factor: {:.4} ({}) from young-demographic ratio {:.2}",
                demographic,
                pct_change(demographic),
                ind.young_demographic_ratio
            ),
            format!(
                "Growth factor: {:.4} ({}) from growth rate {:.1}%",
                growth,
                pct_change(growth),
                ind.growth_rate * 100.0
            ),
            format!(
                "Confidence: {:.0}% base with {} ({:.0}% final)",
                self.policy.base * 100.0,
                bonus_note,
                confidence * 100.0
            ),
            format!(
                "Predicted income: ${} at {:.0}% confidence ({})",
                predicted_income,
                confidence * 100.0,
                confidence_label(confidence)
            ),
        ];

        tracing::debug!(
            "Statistical estimate for {}: ${} (base ${}, confidence {:.2})",
            ind.region_id,
            predicted_income,
            base_income,
            confidence
        );

        Ok(PredictionResult {
            region_id: ind.region_id.clone(),
            jurisdiction: ind.jurisdiction.clone(),
            predicted_income,
            confidence,
            methodology: Methodology::Statistical,
            explanation,
            components: json!({
                "baseIncome": base_income,
                "regionAdjustment": adjustment,
                "costOfLivingIndex": col,
                "educationAdjustment": education,
                "unemploymentAdjustment": unemployment,
                "ageDistributionFactor": demographic,
                "regionalEconomicIndex": growth,
            }),
            model_details: None,
            model_version: self.version.clone(),
            timestamp: Utc::now(),
        })
    }

    /// Look the region up and estimate it.
    pub async fn predict(
        &self,
        store: &dyn RegionStore,
        region: &RegionId,
    ) -> Result<PredictionResult, PredictionError> {
        let indicators = store.lookup(region).await?;
        self.estimate(&indicators)
    }
}
