//! Regression metrics over a model's holdout sample.

use income_core::ModelDetails;
use serde::{Deserialize, Serialize};

use crate::error::{MLError, MLResult};

/// One (actual, predicted) pair from the held-out evaluation set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutSample {
    pub actual: f64,
    pub predicted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Mean absolute percentage error; the `+ 1` in the denominator keeps zero targets finite
    pub mape: f64,
}

impl RegressionMetrics {
    pub fn compute(samples: &[HoldoutSample]) -> MLResult<Self> {
        if samples.is_empty() {
            return Err(MLError::Other("holdout sample is empty".to_string()));
        }
        if samples.iter().any(|s| !s.actual.is_finite() || !s.predicted.is_finite()) {
            return Err(MLError::Other("holdout sample contains non-finite values".to_string()));
        }
        // MAPE divides by `actual + 1`
        if let Some(s) = samples.iter().find(|s| s.actual <= -1.0) {
            return Err(MLError::Other(format!(
                "holdout actual {} is at or below -1",
                s.actual
            )));
        }

        let n = samples.len() as f64;
        let mae = samples.iter().map(|s| (s.actual - s.predicted).abs()).sum::<f64>() / n;
        let sse = samples.iter().map(|s| (s.actual - s.predicted).powi(2)).sum::<f64>();
        let rmse = (sse / n).sqrt();

        let mean_actual = samples.iter().map(|s| s.actual).sum::<f64>() / n;
        let sst = samples.iter().map(|s| (s.actual - mean_actual).powi(2)).sum::<f64>();
        let r2 = if sst > 0.0 { 1.0 - sse / sst } else { 0.0 };

        let mape = samples
            .iter()
            .map(|s| ((s.actual - s.predicted) / (s.actual + 1.0)).abs())
            .sum::<f64>()
            / n
            * 100.0;

        Ok(Self { mae, rmse, r2, mape })
    }

    /// Summarize as the model card exposed with each ML prediction.
    /// R² stands in for accuracy, clamped to [0, 1].
    pub fn model_details(&self, training_size: u64) -> ModelDetails {
        ModelDetails {
            accuracy: self.r2.clamp(0.0, 1.0),
            rmse: self.rmse,
            mae: self.mae,
            training_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(actual: f64, predicted: f64) -> HoldoutSample {
        HoldoutSample { actual, predicted }
    }

    #[test]
    fn test_perfect_predictions() {
        let m = RegressionMetrics::compute(&[sample(10.0, 10.0), sample(20.0, 20.0)]).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.mape, 0.0);
    }

    #[test]
    fn test_known_errors() {
        // errors: +1, -1, +2, -2
        let samples = [
            sample(10.0, 11.0),
            sample(20.0, 19.0),
            sample(30.0, 32.0),
            sample(40.0, 38.0),
        ];
        let m = RegressionMetrics::compute(&samples).unwrap();
        assert!((m.mae - 1.5).abs() < 1e-12);
        assert!((m.rmse - 2.5f64.sqrt()).abs() < 1e-12);
        // sst = 500, sse = 10
        assert!((m.r2 - 0.98).abs() < 1e-12);
    }

    #[test]
    fn test_model_details_clamps_accuracy() {
        let m = RegressionMetrics { mae: 1.0, rmse: 2.0, r2: -0.4, mape: 3.0 };
        let details = m.model_details(100);
        assert_eq!(details.accuracy, 0.0);
        assert_eq!(details.training_size, 100);
    }

    #[test]
    fn test_empty_holdout_rejected() {
        assert!(RegressionMetrics::compute(&[]).is_err());
    }

    #[test]
    fn test_actual_at_mape_pole_rejected() {
        let err = RegressionMetrics::compute(&[sample(-1.0, 5.0), sample(10.0, 10.0)]).unwrap_err();
        assert!(matches!(err, MLError::Other(_)));
        assert!(RegressionMetrics::compute(&[sample(-3.0, 5.0)]).is_err());
        // Zero targets stay finite
        let m = RegressionMetrics::compute(&[sample(0.0, 1.0), sample(10.0, 10.0)]).unwrap();
        assert!(m.mape.is_finite());
    }
}
