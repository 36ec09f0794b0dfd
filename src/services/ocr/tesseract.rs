use super::engine::OcrEngine;
use crate::error::OcrError;
use crate::models::config::OcrConfig;
use image::DynamicImage;
use leptess::{LepTess, Variable};

/// Tesseract OCR engine implementation
pub struct TesseractEngine {
    // LepTess is not Sync; an instance is created per call
    lang: String,
    whitelist: String,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        if !Self::is_available(&config.language) {
            return Err(OcrError::Engine(format!(
                "Tesseract with language '{}' not available on system",
                config.language
            )));
        }

        tracing::info!(lang = %config.language, "Tesseract OCR initialized");

        Ok(Self {
            lang: config.language.clone(),
            whitelist: config.whitelist.clone(),
        })
    }

    pub fn is_available(lang: &str) -> bool {
        LepTess::new(None, lang).is_ok()
    }

    fn configure(&self, tess: &mut LepTess) -> Result<(), OcrError> {
        // PSM 6 = single uniform block of text (HUD readouts span one or two lines)
        tess.set_variable(Variable::TesseditPagesegMode, "6")
            .map_err(|e| OcrError::Engine(format!("Failed to set page mode: {}", e)))?;

        if !self.whitelist.is_empty() {
            tess.set_variable(Variable::TesseditCharWhitelist, &self.whitelist)
                .map_err(|e| OcrError::Engine(format!("Failed to set whitelist: {}", e)))?;
        }
        Ok(())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let mut img_bytes: Vec<u8> = Vec::new();
        image.write_to(&mut std::io::Cursor::new(&mut img_bytes), image::ImageFormat::Png)?;

        let mut tess = LepTess::new(None, &self.lang)
            .map_err(|e| OcrError::Engine(format!("Failed to create Tesseract instance: {}", e)))?;
        self.configure(&mut tess)?;

        tess.set_image_from_mem(&img_bytes)
            .map_err(|e| OcrError::Engine(format!("Failed to set image: {}", e)))?;

        tess.get_utf8_text()
            .map_err(|e| OcrError::Engine(format!("Failed to recognize text: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    #[ignore] // needs a system Tesseract install with eng traineddata
    fn test_blank_image_recognizes_without_error() {
        let engine = TesseractEngine::new(&OcrConfig::default()).unwrap();
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 50, Rgb([255, 255, 255])));

        let text = engine.recognize(&blank).unwrap();
        assert!(text.trim().is_empty(), "got: {}", text);
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let config = OcrConfig {
            language: "no_such_language_xx".to_string(),
            ..OcrConfig::default()
        };
        assert!(TesseractEngine::new(&config).is_err());
    }
}
