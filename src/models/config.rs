use crate::error::ConfigError;
use crate::models::region::RegionSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub const INVENTORY_PANEL: &str = "inventory_panel";
pub const EQUIPPED_ITEMS: &str = "equipped_items";
pub const COMBAT_POWER: &str = "combat_power";

/// Presence heuristic tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresenceConfig {
    /// Grayscale variance (0-255 scale) a region must exceed to count as rendered
    pub threshold: f64,
    /// Upper bound on sampled pixels per region; larger crops are strided
    pub max_samples: u32,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            threshold: 60.0,
            max_samples: 65_536,
        }
    }
}

/// Image preprocessing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Contrast adjustment passed to `image::imageops::contrast` (percent)
    pub contrast: f32,
    pub scale_factor: f64,
    /// Otsu threshold after upscaling
    pub binarize: bool,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            contrast: 30.0,
            scale_factor: 2.0,
            binarize: false,
        }
    }
}

/// OCR engine choice
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// External OCR server speaking the `/ocr` JSON protocol
    Http,
    /// Local Tesseract, requires the `tesseract` cargo feature
    Tesseract,
    Disabled,
}

impl Default for OcrEngineKind {
    fn default() -> Self {
        Self::Http
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    pub engine: OcrEngineKind,
    pub server_url: String,
    pub language: String,
    pub whitelist: String,
    /// 0 disables the timeout. A timed-out call leaves its worker thread
    /// running until the engine returns.
    pub timeout_ms: u64,
    /// Timed-out workers allowed to keep running (at least 1); further OCR
    /// calls yield empty text until one of them finishes
    pub max_stalled_workers: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::Http,
            server_url: "http://127.0.0.1:39835".to_string(),
            language: "eng".to_string(),
            whitelist: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz ,:"
                .to_string(),
            timeout_ms: 10_000,
            max_stalled_workers: 4,
        }
    }
}

/// One field-extraction rule, tried in declared order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Regex capture group, optionally reduced to its digits
    Capture {
        pattern: String,
        #[serde(default = "default_group")]
        group: usize,
        #[serde(default)]
        digits_only: bool,
    },
    /// Longest run of at least `min_len` digits anywhere in the text
    LongestDigits { min_len: usize },
}

fn default_group() -> usize {
    1
}

impl FieldRule {
    /// Label-anchored combat power rule followed by the bare-digits fallback
    pub fn combat_power_defaults() -> Vec<FieldRule> {
        vec![
            FieldRule::Capture {
                pattern: r"(?i)combat\s*power[^0-9]{0,3}(\d[\d,.]*)".to_string(),
                group: 1,
                digits_only: true,
            },
            FieldRule::LongestDigits { min_len: 3 },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Append-only record file; platform data dir when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete detector configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub regions: Vec<RegionSpec>,
    /// Region whose text is OCR'd for the combat power readout
    pub readout_region: String,
    pub presence: PresenceConfig,
    pub preprocessing: PreprocessingConfig,
    pub ocr: OcrConfig,
    pub field_rules: Vec<FieldRule>,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            regions: vec![
                RegionSpec::new(INVENTORY_PANEL, 0.62, 0.12, 0.35, 0.70),
                RegionSpec::new(EQUIPPED_ITEMS, 0.03, 0.12, 0.30, 0.60),
                RegionSpec::new(COMBAT_POWER, 0.03, 0.75, 0.30, 0.08),
            ],
            readout_region: COMBAT_POWER.to_string(),
            presence: PresenceConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            ocr: OcrConfig::default(),
            field_rules: FieldRule::combat_power_defaults(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Check structural invariants. Field rule patterns are compiled (and
    /// checked) by `FieldParser::new`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(ConfigError::Invalid("Region name is empty".to_string()));
            }
            if !seen.insert(region.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate region name: {}",
                    region.name
                )));
            }
        }

        if !seen.contains(self.readout_region.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Readout region '{}' is not among the configured regions",
                self.readout_region
            )));
        }

        if !self.presence.threshold.is_finite() || self.presence.threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "Presence threshold must be a non-negative number, got {}",
                self.presence.threshold
            )));
        }

        if self.presence.max_samples == 0 {
            return Err(ConfigError::Invalid(
                "presence.max_samples must be at least 1".to_string(),
            ));
        }

        if !(self.preprocessing.scale_factor.is_finite() && self.preprocessing.scale_factor > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "Scale factor must be positive, got {}",
                self.preprocessing.scale_factor
            )));
        }

        Ok(())
    }
}
