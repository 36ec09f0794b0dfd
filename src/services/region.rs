use crate::models::region::{AbsoluteRegion, RegionSpec};

/// Resolve a fractional region against concrete image dimensions.
///
/// Never fails: out-of-range fractions are clamped and the result is at least
/// 1x1 pixel. For images of at least 1x1 the rectangle is always inside the image.
pub fn resolve(spec: &RegionSpec, image_width: u32, image_height: u32) -> AbsoluteRegion {
    let (x, width) = resolve_axis(spec.x, spec.w, image_width);
    let (y, height) = resolve_axis(spec.y, spec.h, image_height);

    AbsoluteRegion {
        name: spec.name.clone(),
        x,
        y,
        width,
        height,
    }
}

/// Resolve every spec, preserving order
pub fn resolve_all(specs: &[RegionSpec], image_width: u32, image_height: u32) -> Vec<AbsoluteRegion> {
    specs
        .iter()
        .map(|spec| resolve(spec, image_width, image_height))
        .collect()
}

fn resolve_axis(offset: f64, extent: f64, size: u32) -> (u32, u32) {
    let offset = scale(offset, size);
    let extent = scale(extent, size);

    let start = offset.min(size.saturating_sub(1));
    let len = extent.min(size.saturating_sub(start)).max(1);
    (start, len)
}

fn scale(fraction: f64, size: u32) -> u32 {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (fraction * size as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_basic() {
        let spec = RegionSpec::new("panel", 0.25, 0.5, 0.5, 0.25);
        let region = resolve(&spec, 1920, 1080);

        assert_eq!(region.name, "panel");
        assert_eq!(region.x, 480);
        assert_eq!(region.y, 540);
        assert_eq!(region.width, 960);
        assert_eq!(region.height, 270);
    }

    #[test]
    fn test_resolve_rounds_to_nearest_pixel() {
        let spec = RegionSpec::new("cp", 0.033, 0.751, 0.3, 0.08);
        let region = resolve(&spec, 100, 100);

        assert_eq!(region.x, 3);
        assert_eq!(region.y, 75);
        assert_eq!(region.width, 30);
        assert_eq!(region.height, 8);
    }

    #[test]
    fn test_resolve_degenerate_becomes_one_pixel() {
        let spec = RegionSpec::new("dot", 0.5, 0.5, 0.0, 0.0);
        let region = resolve(&spec, 640, 480);

        assert_eq!(region.width, 1);
        assert_eq!(region.height, 1);
        assert_eq!(region.area(), 1);
    }

    #[test]
    fn test_resolve_clamps_overflowing_spec() {
        let spec = RegionSpec::new("wide", 0.9, 0.9, 0.5, 0.5);
        let region = resolve(&spec, 100, 100);

        assert_eq!(region.x, 90);
        assert_eq!(region.y, 90);
        assert_eq!(region.width, 10);
        assert_eq!(region.height, 10);
        assert!(region.fits_within(100, 100));
    }

    #[test]
    fn test_resolve_clamps_negative_and_nan() {
        let spec = RegionSpec::new("odd", -0.2, f64::NAN, 1.5, f64::INFINITY);
        let region = resolve(&spec, 200, 100);

        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 200);
        assert_eq!(region.height, 1);
        assert!(region.fits_within(200, 100));
    }

    #[test]
    fn test_resolve_origin_at_far_edge() {
        let spec = RegionSpec::new("edge", 1.0, 1.0, 0.0, 0.0);
        let region = resolve(&spec, 50, 40);

        assert_eq!((region.x, region.y), (49, 39));
        assert_eq!((region.width, region.height), (1, 1));
        assert!(region.fits_within(50, 40));
    }

    #[test]
    fn test_resolved_regions_always_inside_image() {
        let sizes = [(1, 1), (2, 3), (7, 5), (99, 101), (1920, 1080), (333, 1)];
        let steps = [0.0, 0.1, 0.25, 0.333, 0.5, 0.667, 0.9, 1.0];

        for &(width, height) in &sizes {
            for &x in &steps {
                for &w in &steps {
                    if x + w > 1.0 {
                        continue;
                    }
                    for &y in &steps {
                        for &h in &steps {
                            if y + h > 1.0 {
                                continue;
                            }
                            let spec = RegionSpec::new("r", x, y, w, h);
                            let region = resolve(&spec, width, height);
                            assert!(
                                region.fits_within(width, height),
                                "{:?} outside {}x{} for {:?}",
                                region,
                                width,
                                height,
                                spec
                            );
                            assert!(region.width >= 1 && region.height >= 1);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_resolve_all_preserves_order() {
        let specs = vec![
            RegionSpec::new("b", 0.0, 0.0, 0.5, 0.5),
            RegionSpec::new("a", 0.5, 0.5, 0.5, 0.5),
        ];
        let regions = resolve_all(&specs, 10, 10);
        let names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
