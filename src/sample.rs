//! Excitement samples
//!
//! A `Sample` is one recorded reading, taken *after* the merge has been
//! applied. Samples are immutable once built and only ever shared by value
//! or behind an `Arc<[Sample]>` snapshot.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source id used when an inbound payload carries no `userId`
pub const ANONYMOUS_SOURCE: &str = "anonymous";

/// Coarse intensity label attached to each sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IntensityTag {
    Low,
    #[default]
    Medium,
    High,
}

impl IntensityTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityTag::Low => "low",
            IntensityTag::Medium => "medium",
            IntensityTag::High => "high",
        }
    }

    /// Parse a wire label; unknown labels yield `None` so the caller can default
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(IntensityTag::Low),
            "medium" => Some(IntensityTag::Medium),
            "high" => Some(IntensityTag::High),
            _ => None,
        }
    }
}

/// One excitement reading retained in the history buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSample")]
pub struct Sample {
    /// Wall-clock receipt time (unix millis). The clock may step backwards,
    /// so history order comes from insertion, not from this field.
    timestamp: i64,
    /// Resulting level in [0, 100]
    level: f64,
    source_id: String,
    intensity_tag: IntensityTag,
}

impl Sample {
    /// Build a sample stamped with the current local time.
    ///
    /// The level is clamped so a `Sample` can never hold an out-of-range value.
    pub fn new(level: f64, source_id: Option<String>, intensity_tag: Option<IntensityTag>) -> Self {
        Self::at(now_millis(), level, source_id, intensity_tag)
    }

    pub fn at(
        timestamp: i64,
        level: f64,
        source_id: Option<String>,
        intensity_tag: Option<IntensityTag>,
    ) -> Self {
        Self {
            timestamp,
            level: crate::intensity::clamp_level(level),
            source_id: source_id.unwrap_or_else(|| ANONYMOUS_SOURCE.to_string()),
            intensity_tag: intensity_tag.unwrap_or_default(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn intensity_tag(&self) -> IntensityTag {
        self.intensity_tag
    }
}

/// Wire shape of a sample before the level is clamped
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSample {
    timestamp: i64,
    level: f64,
    #[serde(default)]
    source_id: Option<String>,
    #[serde(default)]
    intensity_tag: Option<IntensityTag>,
}

impl From<RawSample> for Sample {
    fn from(raw: RawSample) -> Self {
        Sample::at(raw.timestamp, raw.level, raw.source_id, raw.intensity_tag)
    }
}

/// Current unix time in milliseconds (wall clock, not monotonic)
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
