use serde::{Serialize, Serializer};
use std::fmt;

use crate::PredictionError;

/// Number of digits in a region code (US ZIP).
pub const REGION_ID_LEN: usize = 5;

/// A well-formed region identifier. Construction is the only validation point;
/// everything downstream can assume the format holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(String);

impl RegionId {
    /// Parse a raw identifier, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self, PredictionError> {
        let trimmed = raw.trim();
        if trimmed.len() != REGION_ID_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PredictionError::validation(
                "regionId",
                format!("expected a {}-digit numeric code, got {:?}", REGION_ID_LEN, raw),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RegionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
