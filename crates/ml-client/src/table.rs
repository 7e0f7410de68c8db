//! Lookup-table oracle: precomputed model outputs keyed by region.
//!
//! Deterministic by construction. The model card's holdout sample feeds the
//! `modelDetails` attached to every prediction.

use async_trait::async_trait;
use income_core::{MlPredictor, ModelDetails, PredictionError, PredictionResult, RegionId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{MLError, MLResult};
use crate::estimate::OracleEstimate;
use crate::evaluation::{HoldoutSample, RegressionMetrics};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCard {
    pub name: String,
    pub version: String,
    pub training_size: u64,
    pub holdout: Vec<HoldoutSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableEntry {
    pub jurisdiction: String,
    pub predicted_income: f64,
    pub confidence: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

/// Serialized form of a prediction table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionTable {
    pub model: ModelCard,
    pub predictions: HashMap<String, TableEntry>,
}

// (region, jurisdiction, income, confidence,
//  median household income, per-capita income, education rate, unemployment rate,
//  median home value, median gross rent)
#[allow(clippy::type_complexity)]
const BUILTIN_PREDICTIONS: &[(&str, &str, f64, f64, f64, f64, f64, f64, f64, f64)] = &[
    ("90210", "CA", 128_500.0, 0.91, 112_000.0, 86_400.0, 0.71, 0.038, 2_150_000.0, 2_850.0),
    ("94105", "CA", 171_200.0, 0.93, 165_300.0, 121_700.0, 0.83, 0.031, 1_380_000.0, 3_420.0),
    ("10001", "NY", 118_400.0, 0.90, 104_200.0, 92_300.0, 0.69, 0.044, 1_120_000.0, 2_610.0),
    ("10451", "NY", 54_800.0, 0.84, 38_900.0, 21_600.0, 0.19, 0.091, 412_000.0, 1_180.0),
    ("73301", "TX", 68_900.0, 0.88, 74_100.0, 39_800.0, 0.47, 0.036, 386_000.0, 1_520.0),
    ("77002", "TX", 79_600.0, 0.94, 88_700.0, 61_200.0, 0.58, 0.035, 329_000.0, 1_740.0),
    ("33101", "FL", 67_200.0, 0.87, 59_400.0, 36_900.0, 0.35, 0.033, 448_000.0, 1_690.0),
    ("60601", "IL", 91_800.0, 0.95, 97_300.0, 78_500.0, 0.74, 0.040, 452_000.0, 2_240.0),
    ("98101", "WA", 134_900.0, 0.93, 118_600.0, 94_100.0, 0.77, 0.037, 795_000.0, 2_380.0),
    ("02108", "MA", 148_300.0, 0.92, 131_800.0, 108_900.0, 0.86, 0.029, 1_240_000.0, 3_050.0),
    ("43215", "OH", 52_600.0, 0.86, 49_300.0, 33_700.0, 0.41, 0.048, 231_000.0, 1_090.0),
];

const BUILTIN_HOLDOUT: &[(f64, f64)] = &[
    (58_200.0, 61_050.0),
    (74_900.0, 71_300.0),
    (102_400.0, 98_800.0),
    (45_300.0, 48_100.0),
    (131_700.0, 126_900.0),
    (66_800.0, 68_400.0),
    (89_500.0, 93_200.0),
    (53_100.0, 51_700.0),
];

impl PredictionTable {
    pub fn builtin() -> Self {
        let predictions = BUILTIN_PREDICTIONS
            .iter()
            .map(
                |&(id, jurisdiction, income, confidence, household, per_capita, education, unemployment, home, rent)| {
                    let features = BTreeMap::from([
                        ("medianHouseholdIncome".to_string(), household),
                        ("perCapitaIncome".to_string(), per_capita),
                        ("educationRate".to_string(), education),
                        ("unemploymentRate".to_string(), unemployment),
                        ("medianHomeValue".to_string(), home),
                        ("medianGrossRent".to_string(), rent),
                    ]);
                    (
                        id.to_string(),
                        TableEntry {
                            jurisdiction: jurisdiction.to_string(),
                            predicted_income: income,
                            confidence,
                            features,
                        },
                    )
                },
            )
            .collect();

        Self {
            model: ModelCard {
                name: "lightgbm-avg-agi".to_string(),
                version: "2024.2".to_string(),
                training_size: 48_210,
                holdout: BUILTIN_HOLDOUT
                    .iter()
                    .map(|&(actual, predicted)| HoldoutSample { actual, predicted })
                    .collect(),
            },
            predictions,
        }
    }
}

pub struct TableMlPredictor {
    entries: HashMap<RegionId, TableEntry>,
    details: ModelDetails,
    version: String,
}

impl TableMlPredictor {
    pub fn from_table(table: PredictionTable) -> MLResult<Self> {
        let metrics = RegressionMetrics::compute(&table.model.holdout)?;
        let details = metrics.model_details(table.model.training_size);
        let version = format!("{}/{}", table.model.name, table.model.version);

        let mut entries = HashMap::with_capacity(table.predictions.len());
        for (raw_id, entry) in table.predictions {
            let id = RegionId::parse(&raw_id)
                .map_err(|e| MLError::Other(format!("prediction table: {}", e)))?;
            to_estimate(&id, &entry, &details).validate(&id)?;
            entries.insert(id, entry);
        }

        tracing::info!(
            "Loaded ML prediction table {} with {} regions (holdout MAPE {:.2}%)",
            version,
            entries.len(),
            metrics.mape
        );
        Ok(Self { entries, details, version })
    }

    pub fn from_json(raw: &str) -> MLResult<Self> {
        let table: PredictionTable = serde_json::from_str(raw)?;
        Self::from_table(table)
    }

    pub fn builtin() -> MLResult<Self> {
        Self::from_table(PredictionTable::builtin())
    }

    pub fn model_details(&self) -> &ModelDetails {
        &self.details
    }
}

fn to_estimate(id: &RegionId, entry: &TableEntry, details: &ModelDetails) -> OracleEstimate {
    OracleEstimate {
        region_id: id.to_string(),
        jurisdiction: entry.jurisdiction.clone(),
        predicted_income: entry.predicted_income,
        confidence: entry.confidence,
        features: entry.features.clone(),
        model_details: Some(details.clone()),
    }
}

#[async_trait]
impl MlPredictor for TableMlPredictor {
    async fn predict(&self, region: &RegionId) -> Result<PredictionResult, PredictionError> {
        let entry = self
            .entries
            .get(region)
            .ok_or_else(|| MLError::UnknownRegion(region.to_string()))?;
        Ok(to_estimate(region, entry, &self.details).into_prediction(&self.version))
    }

    fn backend_name(&self) -> &'static str {
        "table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use income_core::Methodology;

    #[test]
    fn test_builtin_table_loads() {
        let predictor = TableMlPredictor::builtin().unwrap();
        let details = predictor.model_details();
        assert_eq!(details.training_size, 48_210);
        assert!(details.accuracy > 0.9 && details.accuracy <= 1.0);
        assert!(details.mae > 0.0 && details.rmse >= details.mae);
    }

    #[tokio::test]
    async fn test_predict_known_region() {
        let predictor = TableMlPredictor::builtin().unwrap();
        let result = predictor.predict(&RegionId::parse("90210").unwrap()).await.unwrap();

        assert_eq!(result.methodology, Methodology::Ml);
        assert_eq!(result.predicted_income, 128_500);
        assert_eq!(result.confidence, 0.91);
        assert_eq!(result.jurisdiction, "CA");
        assert_eq!(result.model_version, "lightgbm-avg-agi/2024.2");
        assert!(result.model_details.is_some());
        assert_eq!(result.component("medianHomeValue"), Some(2_150_000.0));
        assert!(predictor.health().await.unwrap());
    }

    #[tokio::test]
    async fn test_predict_is_deterministic() {
        let predictor = TableMlPredictor::builtin().unwrap();
        let id = RegionId::parse("60601").unwrap();
        let a = predictor.predict(&id).await.unwrap();
        let b = predictor.predict(&id).await.unwrap();
        assert_eq!(a.predicted_income, b.predicted_income);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.components, b.components);
    }

    #[tokio::test]
    async fn test_unknown_region_is_not_found() {
        let predictor = TableMlPredictor::builtin().unwrap();
        let err = predictor.predict(&RegionId::parse("99999").unwrap()).await.unwrap_err();
        assert_eq!(err, PredictionError::NotFound("99999".into()));
    }

    #[test]
    fn test_from_json_rejects_invalid_confidence() {
        let raw = r#"{
            "model": {"name": "m", "version": "1", "trainingSize": 10,
                      "holdout": [{"actual": 1.0, "predicted": 1.0}, {"actual": 3.0, "predicted": 2.0}]},
            "predictions": {"12345": {"jurisdiction": "CA", "predictedIncome": 50000, "confidence": 1.5}}
        }"#;
        assert!(matches!(
            TableMlPredictor::from_json(raw),
            Err(MLError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        assert!(matches!(
            TableMlPredictor::from_json("[]"),
            Err(MLError::Serialization(_))
        ));
    }
}
