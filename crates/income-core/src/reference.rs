//! In-memory region reference store.
//!
//! Holds a jurisdiction table (state code -> indicator set) and a region table
//! (region id -> jurisdiction, adjustment factor, well-studied flag). Lookups join the
//! two into a [`RegionIndicators`] snapshot. The table never changes after
//! construction, so every request sees one consistent view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{PredictionError, RegionId, RegionIndicators, RegionStore};

/// Jurisdiction-level economic indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionIndicators {
    pub median_income: f64,
    pub cost_of_living_index: f64,
    pub unemployment_rate: f64,
    pub education_index: f64,
    pub young_demographic_ratio: f64,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionEntry {
    pub jurisdiction: String,
    pub adjustment_factor: f64,
    #[serde(default)]
    pub well_studied: bool,
}

/// Serialized form of a reference table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDataset {
    pub jurisdictions: HashMap<String, JurisdictionIndicators>,
    pub regions: HashMap<String, RegionEntry>,
}

// (code, median income, cost of living, unemployment, education, young ratio, growth)
const DEFAULT_JURISDICTIONS: &[(&str, f64, f64, f64, f64, f64, f64)] = &[
    ("CA", 72000.0, 1.45, 0.042, 0.78, 0.65, 0.028),
    ("NY", 68000.0, 1.38, 0.045, 0.76, 0.62, 0.021),
    ("TX", 61000.0, 0.98, 0.039, 0.68, 0.68, 0.034),
    ("FL", 59000.0, 1.02, 0.031, 0.66, 0.55, 0.031),
    ("IL", 63000.0, 1.05, 0.047, 0.72, 0.60, 0.012),
    ("WA", 70000.0, 1.25, 0.041, 0.80, 0.63, 0.030),
    ("MA", 75000.0, 1.35, 0.035, 0.84, 0.61, 0.019),
    ("OH", 54000.0, 0.92, 0.043, 0.65, 0.58, 0.009),
];

// (region id, jurisdiction, adjustment factor, well studied)
const DEFAULT_REGIONS: &[(&str, &str, f64, bool)] = &[
    ("90210", "CA", 1.35, true),
    ("94105", "CA", 1.60, true),
    ("10001", "NY", 1.45, true),
    ("10451", "NY", 0.72, false),
    ("73301", "TX", 1.05, false),
    ("77002", "TX", 1.20, true),
    ("33101", "FL", 1.10, false),
    ("60601", "IL", 1.30, true),
    ("98101", "WA", 1.40, true),
    ("02108", "MA", 1.55, true),
    ("43215", "OH", 0.95, false),
];

impl ReferenceDataset {
    /// Built-in fixture table covering a handful of US ZIP codes.
    pub fn builtin() -> Self {
        let jurisdictions = DEFAULT_JURISDICTIONS
            .iter()
            .map(|&(code, median, col, unemployment, education, young, growth)| {
                (
                    code.to_string(),
                    JurisdictionIndicators {
                        median_income: median,
                        cost_of_living_index: col,
                        unemployment_rate: unemployment,
                        education_index: education,
                        young_demographic_ratio: young,
                        growth_rate: growth,
                    },
                )
            })
            .collect();

        let regions = DEFAULT_REGIONS
            .iter()
            .map(|&(id, jurisdiction, adjustment, well_studied)| {
                (
                    id.to_string(),
                    RegionEntry {
                        jurisdiction: jurisdiction.to_string(),
                        adjustment_factor: adjustment,
                        well_studied,
                    },
                )
            })
            .collect();

        Self { jurisdictions, regions }
    }
}

/// Read-only reference store backed by in-process tables
#[derive(Debug, Clone)]
pub struct InMemoryRegionStore {
    jurisdictions: HashMap<String, JurisdictionIndicators>,
    regions: BTreeMap<RegionId, RegionEntry>,
}

impl InMemoryRegionStore {
    /// Build a store, validating every region id and every joined indicator row.
    pub fn from_dataset(dataset: ReferenceDataset) -> Result<Self, PredictionError> {
        let mut regions = BTreeMap::new();
        for (raw_id, entry) in dataset.regions {
            let id = RegionId::parse(&raw_id)?;
            regions.insert(id, entry);
        }

        let store = Self {
            jurisdictions: dataset.jurisdictions,
            regions,
        };
        for (id, entry) in &store.regions {
            store.join(id, entry)?.validate()?;
        }

        tracing::info!(
            "Loaded reference data: {} regions across {} jurisdictions",
            store.regions.len(),
            store.jurisdictions.len()
        );
        Ok(store)
    }

    pub fn from_json(raw: &str) -> Result<Self, PredictionError> {
        let dataset: ReferenceDataset = serde_json::from_str(raw)
            .map_err(|e| PredictionError::validation("referenceData", e.to_string()))?;
        Self::from_dataset(dataset)
    }

    pub fn builtin() -> Result<Self, PredictionError> {
        Self::from_dataset(ReferenceDataset::builtin())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn join(&self, id: &RegionId, entry: &RegionEntry) -> Result<RegionIndicators, PredictionError> {
        let state = self.jurisdictions.get(&entry.jurisdiction).ok_or_else(|| {
            PredictionError::validation(
                "jurisdiction",
                format!("region {} references unknown jurisdiction {}", id, entry.jurisdiction),
            )
        })?;

        Ok(RegionIndicators {
            region_id: id.to_string(),
            jurisdiction: entry.jurisdiction.clone(),
            median_income: state.median_income,
            cost_of_living_index: state.cost_of_living_index,
            unemployment_rate: state.unemployment_rate,
            education_index: state.education_index,
            young_demographic_ratio: state.young_demographic_ratio,
            growth_rate: state.growth_rate,
            adjustment_factor: entry.adjustment_factor,
            well_studied: entry.well_studied,
        })
    }
}

#[async_trait]
impl RegionStore for InMemoryRegionStore {
    async fn lookup(&self, region: &RegionId) -> Result<RegionIndicators, PredictionError> {
        let entry = self
            .regions
            .get(region)
            .ok_or_else(|| PredictionError::NotFound(region.to_string()))?;
        self.join(region, entry)
    }

    async fn region_ids(&self) -> Vec<RegionId> {
        self.regions.keys().cloned().collect()
    }
}
