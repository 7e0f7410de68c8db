pub mod error;
pub mod policy;
pub mod reference;
pub mod region;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use policy::*;
pub use reference::{InMemoryRegionStore, JurisdictionIndicators, ReferenceDataset, RegionEntry};
pub use region::*;
pub use traits::*;
pub use types::*;
