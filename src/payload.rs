//! Wire payloads on the hype channel
//!
//! Inbound messages are untrusted. `InboundPayload::parse` is the only
//! validation step: anything without a numeric `level` is rejected and the
//! caller drops it. Rejection is a normal outcome, not an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::intensity::MergeMode;
use crate::sample::IntensityTag;

/// Validated inbound reading
#[derive(Debug, Clone, PartialEq)]
pub struct InboundPayload {
    pub level: f64,
    pub is_additive: bool,
    pub user_id: Option<String>,
    pub intensity: Option<IntensityTag>,
    /// Sender clock, informational only
    pub timestamp: Option<i64>,
}

impl InboundPayload {
    /// Absolute reading with no metadata
    pub fn absolute(level: f64) -> Self {
        Self {
            level,
            is_additive: false,
            user_id: None,
            intensity: None,
            timestamp: None,
        }
    }

    /// Additive reading with no metadata
    pub fn additive(level: f64) -> Self {
        Self {
            is_additive: true,
            ..Self::absolute(level)
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_intensity(mut self, tag: IntensityTag) -> Self {
        self.intensity = Some(tag);
        self
    }

    /// Validate a raw JSON message.
    ///
    /// `level` must be a finite JSON number. Optional fields of the wrong
    /// type are treated as absent.
    pub fn parse(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let level = obj.get("level")?.as_f64().filter(|l| l.is_finite())?;

        let is_additive = obj
            .get("isAdditive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let user_id = obj
            .get("userId")
            .and_then(Value::as_str)
            .map(str::to_string);
        let intensity = obj
            .get("intensity")
            .and_then(Value::as_str)
            .and_then(IntensityTag::parse);
        let timestamp = obj.get("timestamp").and_then(|t| {
            t.as_i64()
                .or_else(|| t.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        });

        Some(Self {
            level,
            is_additive,
            user_id,
            intensity,
            timestamp,
        })
    }

    /// Parse from a text frame; invalid JSON is a rejection like any other
    pub fn parse_str(text: &str) -> Option<Self> {
        serde_json::from_str::<Value>(text)
            .ok()
            .as_ref()
            .and_then(Self::parse)
    }

    pub fn merge_mode(&self) -> MergeMode {
        MergeMode::from_additive_flag(self.is_additive)
    }
}

/// Message published by the local participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPayload {
    pub user_id: String,
    pub level: i64,
    pub intensity: IntensityTag,
    pub timestamp: i64,
}

impl OutboundPayload {
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "userId": self.user_id,
            "level": self.level,
            "intensity": self.intensity.as_str(),
            "timestamp": self.timestamp,
        })
    }
}
