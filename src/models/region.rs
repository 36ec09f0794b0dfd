use serde::{Deserialize, Serialize};

/// Named UI zone of a screenshot, as fractions of the image width/height
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionSpec {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl RegionSpec {
    pub fn new(name: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            w,
            h,
        }
    }

    /// True when the box stays inside the unit square
    pub fn is_within_unit(&self) -> bool {
        let parts = [self.x, self.y, self.w, self.h];
        parts.iter().all(|v| v.is_finite() && *v >= 0.0)
            && self.x + self.w <= 1.0
            && self.y + self.h <= 1.0
    }
}

/// Region in pixel units, derived from a `RegionSpec` for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteRegion {
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AbsoluteRegion {
    pub fn new(name: impl Into<String>, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// Get the end coordinates (exclusive)
    pub fn x2(&self) -> u32 {
        self.x + self.width
    }

    pub fn y2(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Check if the region lies fully inside an image of the given size
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x2() <= image_width && self.y2() <= image_height
    }
}
