use crate::error::{ConfigError, OcrError};
use crate::models::config::{OcrConfig, OcrEngineKind};
use image::DynamicImage;
use std::sync::Arc;

/// OCR Engine trait - abstraction for different OCR implementations
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Recognize text from a preprocessed image
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Engine used when OCR is switched off; recognizes nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEngine;

impl OcrEngine for DisabledEngine {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Ok(String::new())
    }
}

/// Build the engine selected in the configuration
pub fn build_engine(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, ConfigError> {
    match config.engine {
        OcrEngineKind::Http => {
            let client = super::http_ocr::HttpOcrClient::new(config)
                .map_err(|e| ConfigError::Invalid(format!("Failed to create HTTP OCR client: {}", e)))?;
            Ok(Arc::new(client))
        }
        OcrEngineKind::Tesseract => build_tesseract(config),
        OcrEngineKind::Disabled => Ok(Arc::new(DisabledEngine)),
    }
}

#[cfg(feature = "tesseract")]
fn build_tesseract(config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, ConfigError> {
    let engine = super::tesseract::TesseractEngine::new(config)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "tesseract"))]
fn build_tesseract(_config: &OcrConfig) -> Result<Arc<dyn OcrEngine>, ConfigError> {
    Err(ConfigError::EngineUnavailable("tesseract".to_string()))
}
