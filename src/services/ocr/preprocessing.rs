use crate::models::config::PreprocessingConfig;
use image::{imageops, DynamicImage, GrayImage, Luma};

/// Image preprocessing service for OCR optimization
#[derive(Debug, Clone)]
pub struct PreprocessingService {
    config: PreprocessingConfig,
}

impl Default for PreprocessingService {
    fn default() -> Self {
        Self::new(PreprocessingConfig::default())
    }
}

impl PreprocessingService {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    /// Full pipeline: grayscale → contrast → normalize → upscale (→ threshold)
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        let gray = self.to_grayscale(image);
        let contrasted = self.enhance_contrast(&gray);
        let normalized = self.normalize(&contrasted);
        let scaled = self.scale(&normalized, self.config.scale_factor);

        if self.config.binarize {
            DynamicImage::ImageLuma8(self.threshold(&scaled))
        } else {
            DynamicImage::ImageLuma8(scaled)
        }
    }

    pub fn to_grayscale(&self, image: &DynamicImage) -> GrayImage {
        image.to_luma8()
    }

    pub fn enhance_contrast(&self, image: &GrayImage) -> GrayImage {
        if self.config.contrast == 0.0 {
            return image.clone();
        }
        imageops::contrast(image, self.config.contrast)
    }

    /// Stretch intensities linearly so the darkest pixel maps to 0 and the
    /// brightest to 255. Flat images are returned unchanged.
    pub fn normalize(&self, image: &GrayImage) -> GrayImage {
        let (min, max) = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));

        if min >= max {
            return image.clone();
        }

        let range = (max - min) as f32;
        let mut out = image.clone();
        for pixel in out.pixels_mut() {
            let v = (pixel[0] - min) as f32 * 255.0 / range;
            *pixel = Luma([v.round() as u8]);
        }
        out
    }

    /// Scale image by factor (at least 1x1)
    pub fn scale(&self, image: &GrayImage, factor: f64) -> GrayImage {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return image.clone();
        }
        let new_width = ((width as f64 * factor).round() as u32).max(1);
        let new_height = ((height as f64 * factor).round() as u32).max(1);

        if (new_width, new_height) == (width, height) {
            return image.clone();
        }
        imageops::resize(image, new_width, new_height, imageops::FilterType::Lanczos3)
    }

    /// Binary thresholding (Otsu's method)
    pub fn threshold(&self, image: &GrayImage) -> GrayImage {
        let level = imageproc::contrast::otsu_level(image);

        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y)[0] > level {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }
}
