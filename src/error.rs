use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single `Detector::analyze` call.
///
/// OCR failures and "nothing found" never show up here: they are folded into
/// the record as an absent combat power.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to decode image")]
    Decode(#[from] image::ImageError),

    #[error("Raw RGBA buffer of {len} bytes does not match {width}x{height}")]
    InvalidBuffer { width: u32, height: u32, len: usize },

    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Region '{0}' is listed more than once")]
    DuplicateRegion(String),

    #[error("Detection sink rejected record")]
    Sink(#[from] SinkError),

    #[error("Detection worker failed: {0}")]
    Worker(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Store I/O failed: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize detection record")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to create store directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine platform {0} directory")]
    NoPlatformDir(&'static str),

    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid field rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("OCR engine '{0}' is not available in this build")]
    EngineUnavailable(String),

    #[error("Failed to open detection store")]
    Storage(#[from] SinkError),
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to encode image for OCR")]
    Encode(#[from] image::ImageError),

    #[error("OCR request failed")]
    Request(#[from] reqwest::Error),

    #[error("OCR server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR worker stopped without a result")]
    WorkerLost,

    #[error("OCR engine unresponsive: {0} timed-out workers still running")]
    Stalled(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = DetectionError::InvalidBuffer {
            width: 2,
            height: 2,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "Raw RGBA buffer of 3 bytes does not match 2x2"
        );

        let err = OcrError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "OCR timed out after 1.5s");
    }

    #[test]
    fn test_sink_error_chains_into_detection_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let sink = SinkError::Io {
            path: PathBuf::from("/tmp/detections.jsonl"),
            source: io,
        };
        let err: DetectionError = sink.into();

        assert!(matches!(err, DetectionError::Sink(_)));
        assert!(err.source().is_some());
    }
}
