pub mod detection;

pub use detection::DetectionService;
