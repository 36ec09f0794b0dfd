pub mod config;
pub mod detection;
pub mod region;

pub use config::DetectorConfig;
pub use detection::{DetectionRecord, ExtractedField, PresenceResult, RecordId};
pub use region::{AbsoluteRegion, RegionSpec};
