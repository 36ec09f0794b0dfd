use super::engine::OcrEngine;
use crate::error::OcrError;
use crate::models::config::OcrConfig;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Blocking HTTP client for an external OCR server.
///
/// Protocol: `POST {base_url}/ocr` with `{"image_base64", "lang", "whitelist"}`,
/// answered by `{"boxes": [{"box", "text"}], "raw_text"}` (other box fields are ignored).
#[derive(Clone)]
pub struct HttpOcrClient {
    client: reqwest::blocking::Client,
    base_url: String,
    lang: String,
    whitelist: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image_base64: String,
    lang: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    whitelist: &'a str,
}

/// Single text box with bounding box coordinates
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box")]
    bbox: Vec<Vec<f64>>, // 4 corner points [[x1,y1], [x2,y2], [x3,y3], [x4,y4]]
    text: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    boxes: Vec<TextBox>,
    #[serde(default)]
    raw_text: String,
}

impl TextBox {
    /// Get bounding box as (x_min, y_min, x_max, y_max)
    fn rect(&self) -> (f64, f64, f64, f64) {
        let points = self.bbox.iter().filter(|p| p.len() >= 2);

        let mut x_min = f64::INFINITY;
        let mut y_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for p in points {
            x_min = x_min.min(p[0]);
            x_max = x_max.max(p[0]);
            y_min = y_min.min(p[1]);
            y_max = y_max.max(p[1]);
        }

        if x_min > x_max || y_min > y_max {
            return (0.0, 0.0, 0.0, 0.0);
        }
        (x_min, y_min, x_max, y_max)
    }

    /// Intersection over union with another box
    fn iou(&self, other: &TextBox) -> f64 {
        let (x1_min, y1_min, x1_max, y1_max) = self.rect();
        let (x2_min, y2_min, x2_max, y2_max) = other.rect();

        let inter_x_min = x1_min.max(x2_min);
        let inter_y_min = y1_min.max(y2_min);
        let inter_x_max = x1_max.min(x2_max);
        let inter_y_max = y1_max.min(y2_max);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0;
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            return 0.0;
        }

        inter_area / union_area
    }

    fn left_x(&self) -> f64 {
        self.rect().0
    }

    fn top_y(&self) -> f64 {
        self.rect().1
    }

    fn area(&self) -> f64 {
        let (x_min, y_min, x_max, y_max) = self.rect();
        (x_max - x_min) * (y_max - y_min)
    }
}

impl HttpOcrClient {
    pub fn new(config: &OcrConfig) -> Result<Self, OcrError> {
        let mut builder = reqwest::blocking::Client::builder();
        if config.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.timeout_ms));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            lang: config.language.clone(),
            whitelist: config.whitelist.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn encode_image(image: &DynamicImage) -> Result<String, OcrError> {
        let mut buffer = Vec::new();
        image.write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)?;
        Ok(general_purpose::STANDARD.encode(&buffer))
    }

    /// Drop boxes overlapping a larger box by more than `iou_threshold`
    fn filter_overlapping_boxes(boxes: Vec<TextBox>, iou_threshold: f64) -> Vec<TextBox> {
        let mut remaining = boxes;
        // Largest last, so pop() visits big boxes first
        remaining.sort_by(|a, b| a.area().total_cmp(&b.area()));

        let mut kept = Vec::new();
        while let Some(current) = remaining.pop() {
            remaining.retain(|other| current.iou(other) <= iou_threshold);
            kept.push(current);
        }
        kept
    }

    /// Filter overlapping boxes, order them in reading order and join the text
    fn process_ocr_boxes(boxes: Vec<TextBox>) -> String {
        if boxes.is_empty() {
            return String::new();
        }

        let mut filtered = Self::filter_overlapping_boxes(boxes, 0.3);

        // Reading order: coarse line bucket first, then left-to-right
        filtered.sort_by(|a, b| {
            let line_a = (a.top_y() / 16.0).floor();
            let line_b = (b.top_y() / 16.0).floor();
            line_a
                .total_cmp(&line_b)
                .then(a.left_x().total_cmp(&b.left_x()))
        });

        filtered
            .iter()
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl OcrEngine for HttpOcrClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let url = format!("{}/ocr", self.base_url);
        let request = ImageRequest {
            image_base64: Self::encode_image(image)?,
            lang: &self.lang,
            whitelist: &self.whitelist,
        };

        let response = self.client.post(&url).json(&request).send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OcrError::Server { status, body });
        }

        let data: OcrResponse = response.json()?;

        if data.boxes.is_empty() {
            return Ok(data.raw_text);
        }
        Ok(Self::process_ocr_boxes(data.boxes))
    }
}
