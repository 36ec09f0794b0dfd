use crate::models::config::PresenceConfig;
use crate::models::detection::PresenceResult;
use crate::models::region::AbsoluteRegion;
use image::{DynamicImage, GenericImageView, GrayImage};

/// Decides whether a region shows rendered UI by its grayscale variance.
///
/// Blank or flat-colored regions sit near zero; icons, text and borders
/// produce high local contrast.
#[derive(Debug, Clone)]
pub struct PresenceScorer {
    threshold: f64,
    max_samples: u32,
}

impl PresenceScorer {
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            threshold: config.threshold,
            max_samples: config.max_samples.max(1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a region of an already decoded screenshot
    pub fn score(&self, image: &DynamicImage, region: &AbsoluteRegion) -> PresenceResult {
        let gray = crop_gray(image, region);
        self.score_gray(&region.name, &gray)
    }

    /// Score a grayscale crop
    pub fn score_gray(&self, region_name: &str, gray: &GrayImage) -> PresenceResult {
        let stride = sample_stride(gray.width(), gray.height(), self.max_samples);
        let score = intensity_variance(gray, stride);
        let visible = score > self.threshold;

        tracing::debug!(
            region = region_name,
            score,
            stride,
            visible,
            "presence scored"
        );

        PresenceResult {
            region_name: region_name.to_string(),
            visible,
            score,
        }
    }
}

/// Crop `region` out of `image` (clipped to the image) as 8-bit luma
pub fn crop_gray(image: &DynamicImage, region: &AbsoluteRegion) -> GrayImage {
    let (width, height) = image.dimensions();
    let x = region.x.min(width);
    let y = region.y.min(height);
    let w = region.width.min(width - x);
    let h = region.height.min(height - y);

    image.crop_imm(x, y, w, h).to_luma8()
}

/// Pixel step along both axes so that roughly `max_samples` pixels are read
fn sample_stride(width: u32, height: u32, max_samples: u32) -> u32 {
    let area = width as u64 * height as u64;
    if area <= max_samples as u64 {
        return 1;
    }
    ((area as f64 / max_samples as f64).sqrt().floor() as u32).max(1)
}

/// Population variance of pixel intensity, sampling every `stride`-th pixel
/// in both directions. Zero for empty and single-pixel images.
fn intensity_variance(gray: &GrayImage, stride: u32) -> f64 {
    let stride = stride.max(1) as usize;
    let mut count = 0u64;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;

    for y in (0..gray.height()).step_by(stride) {
        for x in (0..gray.width()).step_by(stride) {
            let v = gray.get_pixel(x, y)[0] as f64;
            count += 1;
            sum += v;
            sum_sq += v * v;
        }
    }

    if count < 2 {
        return 0.0;
    }

    let n = count as f64;
    let mean = sum / n;
    // Rounding can push a flat region a hair below zero
    (sum_sq / n - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn scorer() -> PresenceScorer {
        PresenceScorer::new(&PresenceConfig::default())
    }

    fn checkerboard(width: u32, height: u32, cell: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn full(image: &DynamicImage) -> AbsoluteRegion {
        AbsoluteRegion::new("full", 0, 0, image.width(), image.height())
    }

    #[test]
    fn test_uniform_region_is_not_visible() {
        for &(w, h) in &[(1, 1), (2, 2), (37, 11), (640, 480), (1920, 1080)] {
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([90, 140, 200])));
            let result = scorer().score(&image, &full(&image));

            assert_eq!(result.score, 0.0, "{}x{}", w, h);
            assert!(!result.visible, "{}x{}", w, h);
        }
    }

    #[test]
    fn test_checkerboard_is_visible() {
        let image = checkerboard(200, 100, 4);
        let result = scorer().score(&image, &full(&image));

        // Black/white in equal parts: variance of {0, 255} is 127.5^2
        assert!((result.score - 16256.25).abs() < 1.0, "score {}", result.score);
        assert!(result.visible);
        assert_eq!(result.region_name, "full");
    }

    #[test]
    fn test_single_pixel_region_is_not_visible() {
        let image = checkerboard(64, 64, 1);
        let region = AbsoluteRegion::new("dot", 10, 10, 1, 1);
        let result = scorer().score(&image, &region);

        assert_eq!(result.score, 0.0);
        assert!(!result.visible);
    }

    #[test]
    fn test_scores_only_the_cropped_region() {
        // Left half flat, right half checkerboard
        let img = RgbImage::from_fn(100, 50, |x, y| {
            if x < 50 || (x + y) % 2 == 0 {
                Rgb([20, 20, 20])
            } else {
                Rgb([230, 230, 230])
            }
        });
        let image = DynamicImage::ImageRgb8(img);

        let left = AbsoluteRegion::new("left", 0, 0, 50, 50);
        let right = AbsoluteRegion::new("right", 50, 0, 50, 50);

        assert!(!scorer().score(&image, &left).visible);
        assert!(scorer().score(&image, &right).visible);
    }

    #[test]
    fn test_low_contrast_noise_stays_below_threshold() {
        // Alternating 100/110: variance 25
        let gray = GrayImage::from_fn(40, 40, |x, _| if x % 2 == 0 { Luma([100]) } else { Luma([110]) });
        let result = scorer().score_gray("faint", &gray);

        assert!((result.score - 25.0).abs() < 1e-9);
        assert!(!result.visible);
    }

    #[test]
    fn test_strided_variance_is_stable() {
        let image = checkerboard(1024, 768, 8);
        let gray = image.to_luma8();

        let dense = intensity_variance(&gray, 1);
        let stride = sample_stride(gray.width(), gray.height(), 4096);
        assert!(stride > 1);
        let sparse = intensity_variance(&gray, stride);

        assert!(
            (sparse - dense).abs() <= dense * 0.10,
            "dense {} sparse {} stride {}",
            dense,
            sparse,
            stride
        );
    }

    #[test]
    fn test_sample_stride() {
        assert_eq!(sample_stride(100, 100, 65_536), 1);
        assert_eq!(sample_stride(1000, 1000, 10_000), 10);
        assert_eq!(sample_stride(0, 0, 1), 1);
    }

    #[test]
    fn test_crop_gray_clips_to_image() {
        let image = checkerboard(20, 10, 2);
        let region = AbsoluteRegion::new("overhang", 15, 5, 50, 50);
        let gray = crop_gray(&image, &region);
        assert_eq!(gray.dimensions(), (5, 5));
    }

    #[test]
    fn test_custom_threshold() {
        let config = PresenceConfig {
            threshold: 10.0,
            max_samples: 65_536,
        };
        let gray = GrayImage::from_fn(40, 40, |x, _| if x % 2 == 0 { Luma([100]) } else { Luma([110]) });

        let result = PresenceScorer::new(&config).score_gray("faint", &gray);
        assert!(result.visible);
    }
}
