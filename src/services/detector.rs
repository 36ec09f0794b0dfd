use crate::error::{ConfigError, DetectionError};
use crate::models::config::DetectorConfig;
use crate::models::detection::{DetectionRecord, ExtractedField, PresenceResult, RecordId};
use crate::models::region::RegionSpec;
use crate::services::ocr::{build_engine, FieldParser, OcrEngine, PreprocessingService, TextExtractor};
use crate::services::presence::PresenceScorer;
use crate::services::region::resolve;
use crate::services::store::DetectionSink;
use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView, RgbaImage};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Screenshot handed to the detector
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    /// Encoded file bytes (PNG, JPEG, ...); dimensions come from decoding
    Encoded(&'a [u8]),
    /// Raw RGBA8 pixels, row-major
    Rgba {
        width: u32,
        height: u32,
        pixels: &'a [u8],
    },
}

impl ImageSource<'_> {
    pub fn decode(&self) -> Result<DynamicImage, DetectionError> {
        let image = match *self {
            ImageSource::Encoded(bytes) => image::load_from_memory(bytes)?,
            ImageSource::Rgba {
                width,
                height,
                pixels,
            } => {
                let buffer = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(
                    DetectionError::InvalidBuffer {
                        width,
                        height,
                        len: pixels.len(),
                    },
                )?;
                DynamicImage::ImageRgba8(buffer)
            }
        };

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::EmptyImage { width, height });
        }
        Ok(image)
    }
}

/// Per-region verdicts of one run, before an id is minted
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub presence: Vec<PresenceResult>,
    pub readout: Option<ExtractedField>,
}

/// Detection orchestrator.
///
/// Holds only immutable configuration, so one instance can serve any number
/// of concurrent `analyze` calls.
pub struct Detector {
    regions: Vec<RegionSpec>,
    readout_region: String,
    presence: PresenceScorer,
    extractor: TextExtractor,
    parser: FieldParser,
    sink: Arc<dyn DetectionSink>,
}

impl Detector {
    /// Build a detector with an explicit OCR engine
    pub fn new(
        config: &DetectorConfig,
        engine: Arc<dyn OcrEngine>,
        sink: Arc<dyn DetectionSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let timeout = (config.ocr.timeout_ms > 0).then(|| Duration::from_millis(config.ocr.timeout_ms));
        let extractor = TextExtractor::new(
            engine,
            PreprocessingService::new(config.preprocessing.clone()),
            timeout,
        )
        .with_max_stalled(config.ocr.max_stalled_workers);

        Ok(Self {
            regions: config.regions.clone(),
            readout_region: config.readout_region.clone(),
            presence: PresenceScorer::new(&config.presence),
            extractor,
            parser: FieldParser::new(&config.field_rules)?,
            sink,
        })
    }

    /// Build a detector with the OCR engine named in the configuration
    pub fn from_config(config: &DetectorConfig, sink: Arc<dyn DetectionSink>) -> Result<Self, ConfigError> {
        let engine = build_engine(&config.ocr)?;
        Self::new(config, engine, sink)
    }

    pub fn regions(&self) -> &[RegionSpec] {
        &self.regions
    }

    /// Analyze a screenshot against the configured regions and hand the
    /// record to the sink
    pub fn analyze(
        &self,
        source: ImageSource<'_>,
        image_path: &str,
        now: DateTime<Utc>,
    ) -> Result<DetectionRecord, DetectionError> {
        self.analyze_regions(source, &self.regions, image_path, now)
    }

    /// Same as `analyze`, over an explicit region list. Region names must be
    /// unique.
    pub fn analyze_regions(
        &self,
        source: ImageSource<'_>,
        regions: &[RegionSpec],
        image_path: &str,
        now: DateTime<Utc>,
    ) -> Result<DetectionRecord, DetectionError> {
        let mut seen = HashSet::new();
        if let Some(dup) = regions.iter().find(|r| !seen.insert(r.name.as_str())) {
            return Err(DetectionError::DuplicateRegion(dup.name.clone()));
        }

        let image = source.decode()?;
        let inspection = self.inspect(&image, regions);

        let record = DetectionRecord {
            id: RecordId::mint(now),
            image_path: image_path.to_string(),
            created_at: now,
            regions: inspection
                .presence
                .iter()
                .map(|p| (p.region_name.clone(), p.visible))
                .collect::<BTreeMap<_, _>>(),
            combat_power: inspection.readout.and_then(|field| field.value),
        };

        self.sink.accept(&record)?;

        tracing::info!(
            id = %record.id,
            image = %record.image_path,
            combat_power = record.combat_power.as_deref().unwrap_or("-"),
            "detection recorded"
        );

        Ok(record)
    }

    /// Run presence scoring and readout extraction without minting or
    /// storing a record
    pub fn inspect(&self, image: &DynamicImage, regions: &[RegionSpec]) -> Inspection {
        let (width, height) = image.dimensions();

        let (presence, readout) = rayon::join(
            || {
                regions
                    .par_iter()
                    .map(|spec| self.presence.score(image, &resolve(spec, width, height)))
                    .collect::<Vec<_>>()
            },
            || self.read_field(image, regions),
        );

        Inspection { presence, readout }
    }

    fn read_field(&self, image: &DynamicImage, regions: &[RegionSpec]) -> Option<ExtractedField> {
        let Some(spec) = regions.iter().find(|r| r.name == self.readout_region) else {
            tracing::warn!(region = %self.readout_region, "readout region not configured");
            return None;
        };

        let (width, height) = image.dimensions();
        let region = resolve(spec, width, height);
        let raw_text = self.extractor.extract_text(image, &region);

        Some(self.parser.parse(&region.name, &raw_text))
    }
}
