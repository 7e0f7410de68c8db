//! Cross-method statistics, agreement classification and recommendation.

use chrono::Utc;
use income_core::stats::{max_relative_deviation, mean, population_std_dev, population_variance};
use income_core::{
    Agreement, AgreementPolicy, ComparisonCharts, ComparisonReport, ComparisonStatistics,
    MethodConfidence, MethodDeviation, MethodPrediction, Methodology, PredictionError,
    PredictionResult,
};

#[derive(Debug, Clone, Default)]
pub struct ComparisonEngine {
    policy: AgreementPolicy,
}

impl ComparisonEngine {
    pub fn new(policy: AgreementPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, max_relative_deviation: f64) -> Agreement {
        if max_relative_deviation < self.policy.high_below {
            Agreement::High
        } else if max_relative_deviation < self.policy.medium_below {
            Agreement::Medium
        } else {
            Agreement::Low
        }
    }

    /// Pick a method for the given agreement level.
    ///
    /// Medium agreement defers to the most confident method; ties resolve
    /// hybrid, then ml, then statistical.
    pub fn recommend(
        &self,
        agreement: Agreement,
        statistical: &PredictionResult,
        ml: &PredictionResult,
        hybrid: &PredictionResult,
    ) -> (Methodology, String) {
        match agreement {
            Agreement::High => (
                Methodology::Hybrid,
                "Methods agree closely; the hybrid estimate balances both with the highest confidence"
                    .to_string(),
            ),
            Agreement::Medium => {
                let mut best = hybrid;
                for candidate in [ml, statistical] {
                    if candidate.confidence > best.confidence {
                        best = candidate;
                    }
                }
                let strength = match best.methodology {
                    Methodology::Hybrid => "balances statistical stability with ML accuracy",
                    Methodology::Ml => "has the strongest historical accuracy",
                    Methodology::Statistical => "offers the most stable, explainable estimate",
                };
                (
                    best.methodology,
                    format!(
                        "Moderate agreement; {} is the most confident ({:.0}%) and {}",
                        best.methodology.to_label(),
                        best.confidence * 100.0,
                        strength
                    ),
                )
            }
            Agreement::Low => (
                Methodology::Statistical,
                "High disagreement between methods; the statistical estimate is the most explainable and stable"
                    .to_string(),
            ),
        }
    }

    /// Assemble a report from three results for one region.
    pub fn report(
        &self,
        statistical: PredictionResult,
        ml: PredictionResult,
        hybrid: PredictionResult,
    ) -> Result<ComparisonReport, PredictionError> {
        let expected = [
            (&statistical, Methodology::Statistical),
            (&ml, Methodology::Ml),
            (&hybrid, Methodology::Hybrid),
        ];
        for (result, methodology) in expected {
            if result.methodology != methodology {
                return Err(PredictionError::InvariantViolation(format!(
                    "expected {} result, got {}",
                    methodology, result.methodology
                )));
            }
            if result.region_id != statistical.region_id {
                return Err(PredictionError::InvariantViolation(format!(
                    "region mismatch in comparison: {} vs {}",
                    statistical.region_id, result.region_id
                )));
            }
        }

        let incomes = [
            statistical.predicted_income,
            ml.predicted_income,
            hybrid.predicted_income,
        ];
        let values: Vec<f64> = incomes.iter().map(|&v| v as f64).collect();

        let avg = mean(&values);
        let variance = population_variance(&values);
        let min = incomes.iter().copied().min().unwrap_or_default();
        let max = incomes.iter().copied().max().unwrap_or_default();
        let max_rel = max_relative_deviation(&values);

        let agreement = self.classify(max_rel);
        let (recommended_method, recommendation) =
            self.recommend(agreement, &statistical, &ml, &hybrid);

        tracing::debug!(
            "Comparison for {}: mean {:.0}, max deviation {:.4}, agreement {}",
            statistical.region_id,
            avg,
            max_rel,
            agreement
        );

        let ordered = [&statistical, &ml, &hybrid];
        let charts = ComparisonCharts {
            predictions: ordered
                .iter()
                .map(|r| MethodPrediction {
                    method: r.methodology,
                    income: r.predicted_income,
                    confidence: r.confidence,
                })
                .collect(),
            confidence: ordered
                .iter()
                .map(|r| MethodConfidence {
                    method: r.methodology,
                    confidence: r.confidence,
                })
                .collect(),
            deviations: ordered
                .iter()
                .map(|r| MethodDeviation {
                    method: r.methodology,
                    deviation_from_mean: r.predicted_income as f64 - avg,
                })
                .collect(),
        };

        Ok(ComparisonReport {
            region_id: statistical.region_id.clone(),
            jurisdiction: statistical.jurisdiction.clone(),
            statistics: ComparisonStatistics {
                mean: avg,
                variance,
                std_dev: population_std_dev(&values),
                min,
                max,
                spread: max - min,
                max_relative_deviation: max_rel,
                agreement,
                recommended_method,
                recommendation,
            },
            charts,
            statistical,
            ml,
            hybrid,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn result(method: Methodology, income: i64, confidence: f64) -> PredictionResult {
        PredictionResult {
            region_id: "90210".to_string(),
            jurisdiction: "CA".to_string(),
            predicted_income: income,
            confidence,
            methodology: method,
            explanation: vec![],
            components: Value::Null,
            model_details: None,
            model_version: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    fn triple(
        (s, sc): (i64, f64),
        (m, mc): (i64, f64),
        (h, hc): (i64, f64),
    ) -> (PredictionResult, PredictionResult, PredictionResult) {
        (
            result(Methodology::Statistical, s, sc),
            result(Methodology::Ml, m, mc),
            result(Methodology::Hybrid, h, hc),
        )
    }

    #[test]
    fn test_statistics_use_population_variance() {
        let (s, m, h) = triple((90_000, 0.9), (100_000, 0.9), (110_000, 0.9));
        let report = ComparisonEngine::default().report(s, m, h).unwrap();
        let stats = &report.statistics;

        assert_eq!(stats.mean, 100_000.0);
        assert!((stats.variance - 200_000_000.0 / 3.0).abs() < 1e-6);
        assert!((stats.std_dev - stats.variance.sqrt()).abs() < 1e-9);
        assert_eq!(stats.min, 90_000);
        assert_eq!(stats.max, 110_000);
        assert_eq!(stats.spread, 20_000);
        assert!((stats.max_relative_deviation - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_classification_thresholds() {
        let engine = ComparisonEngine::default();
        assert_eq!(engine.classify(0.0), Agreement::High);
        assert_eq!(engine.classify(0.0499), Agreement::High);
        assert_eq!(engine.classify(0.05), Agreement::Medium);
        assert_eq!(engine.classify(0.1499), Agreement::Medium);
        assert_eq!(engine.classify(0.15), Agreement::Low);
        assert_eq!(engine.classify(f64::INFINITY), Agreement::Low);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let engine = ComparisonEngine::default();
        let mut last = Agreement::High;
        for step in 0..=300 {
            let agreement = engine.classify(step as f64 / 1000.0);
            assert!(agreement >= last);
            last = agreement;
        }
    }

    #[test]
    fn test_close_estimates_recommend_hybrid() {
        let (s, m, h) = triple((100_000, 0.92), (102_000, 0.91), (101_300, 0.95));
        let report = ComparisonEngine::default().report(s, m, h).unwrap();
        assert_eq!(report.statistics.agreement, Agreement::High);
        assert_eq!(report.statistics.recommended_method, Methodology::Hybrid);
    }

    #[test]
    fn test_wide_disagreement_recommends_statistical() {
        let (s, m, h) = triple((70_000, 0.92), (100_000, 0.95), (90_000, 0.97));
        let report = ComparisonEngine::default().report(s, m, h).unwrap();
        assert_eq!(report.statistics.agreement, Agreement::Low);
        assert_eq!(report.statistics.recommended_method, Methodology::Statistical);
    }

    #[test]
    fn test_medium_agreement_picks_most_confident() {
        let (s, m, h) = triple((90_000, 0.80), (100_000, 0.95), (97_000, 0.90));
        let report = ComparisonEngine::default().report(s, m, h).unwrap();
        assert_eq!(report.statistics.agreement, Agreement::Medium);
        assert_eq!(report.statistics.recommended_method, Methodology::Ml);
        assert!(report.statistics.recommendation.contains("ML"));
    }

    #[test]
    fn test_medium_agreement_tie_order() {
        let engine = ComparisonEngine::default();
        let (s, m, h) = triple((90_000, 0.9), (100_000, 0.9), (97_000, 0.9));
        let (method, _) = engine.recommend(Agreement::Medium, &s, &m, &h);
        assert_eq!(method, Methodology::Hybrid);

        let (s, m, h) = triple((90_000, 0.9), (100_000, 0.9), (97_000, 0.8));
        let (method, _) = engine.recommend(Agreement::Medium, &s, &m, &h);
        assert_eq!(method, Methodology::Ml);
    }

    #[test]
    fn test_charts_follow_method_order() {
        let (s, m, h) = triple((90_000, 0.8), (100_000, 0.9), (95_000, 0.85));
        let report = ComparisonEngine::default().report(s, m, h).unwrap();

        let methods: Vec<Methodology> = report.charts.predictions.iter().map(|p| p.method).collect();
        assert_eq!(methods, vec![Methodology::Statistical, Methodology::Ml, Methodology::Hybrid]);
        assert_eq!(report.charts.confidence[1].confidence, 0.9);

        let total: f64 = report.charts.deviations.iter().map(|d| d.deviation_from_mean).sum();
        assert!(total.abs() < 1e-9);
        assert_eq!(report.charts.deviations[0].deviation_from_mean, -5_000.0);
    }

    #[test]
    fn test_mismatched_inputs_fail() {
        let (s, mut m, h) = triple((90_000, 0.8), (100_000, 0.9), (95_000, 0.85));
        m.region_id = "10001".to_string();
        let err = ComparisonEngine::default().report(s, m, h).unwrap_err();
        assert_eq!(err.kind(), "invariant_violation");

        let (s, m, h) = triple((90_000, 0.8), (100_000, 0.9), (95_000, 0.85));
        assert!(ComparisonEngine::default().report(m, s, h).is_err());
    }
}
