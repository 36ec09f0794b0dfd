pub mod config;
pub mod detector;
pub mod ocr;
pub mod presence;
pub mod region;
pub mod store;

pub use config::ConfigManager;
pub use detector::{Detector, ImageSource, Inspection};
pub use presence::PresenceScorer;
pub use store::{BroadcastHub, DetectionSink, DetectionStore, JsonlStore, MemoryStore, PersistAndBroadcast};
