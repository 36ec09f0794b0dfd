use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Presence verdict for one region
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceResult {
    pub region_name: String,
    pub visible: bool,
    pub score: f64,
}

/// Field pulled out of OCR text; `value` is `None` when no rule matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedField {
    pub region_name: String,
    pub raw_text: String,
    pub value: Option<String>,
}

/// Unique, creation-ordered record identifier.
///
/// Ordered by capture time in microseconds, then by a random nonce that keeps
/// ids from the same instant apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId {
    micros: i64,
    nonce: u32,
}

impl RecordId {
    pub fn new(micros: i64, nonce: u32) -> Self {
        Self { micros, nonce }
    }

    /// Mint an id for a detection captured at `now`
    pub fn mint(now: DateTime<Utc>) -> Self {
        Self::mint_with(now, &mut rand::thread_rng())
    }

    pub fn mint_with<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        Self {
            micros: now.timestamp_micros(),
            nonce: rng.gen(),
        }
    }

    pub fn micros(&self) -> i64 {
        self.micros
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.micros, self.nonce)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (micros, nonce) = s
            .rsplit_once('-')
            .ok_or_else(|| format!("Malformed record id: {}", s))?;

        let micros = micros
            .parse::<i64>()
            .map_err(|e| format!("Malformed record id timestamp '{}': {}", micros, e))?;
        if nonce.len() != 8 {
            return Err(format!("Malformed record id nonce: {}", nonce));
        }
        let nonce = u32::from_str_radix(nonce, 16)
            .map_err(|e| format!("Malformed record id nonce '{}': {}", nonce, e))?;

        Ok(Self { micros, nonce })
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable output of one analysis run over one screenshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionRecord {
    pub id: RecordId,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
    pub regions: BTreeMap<String, bool>,
    pub combat_power: Option<String>,
}

impl DetectionRecord {
    /// Visibility of a named region, `None` if the region was not configured
    pub fn is_visible(&self, region: &str) -> Option<bool> {
        self.regions.get(region).copied()
    }
}
