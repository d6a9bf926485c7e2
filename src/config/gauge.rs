//! Gauge Configuration
//!
//! Static tuning for the core: history size, decay cadence and amounts,
//! emission boost range and cool-down. Supplied once at start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::history::DEFAULT_HISTORY_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeConfig {
    /// Name of the real-time channel to subscribe and publish on
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    /// Maximum samples retained for trend display
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Decay tick interval (milliseconds)
    #[serde(default = "default_decay_interval_ms")]
    pub decay_interval_ms: u64,

    /// Base decay per tick is drawn from [decay_min, decay_max)
    #[serde(default = "default_decay_min")]
    pub decay_min: f64,
    #[serde(default = "default_decay_max")]
    pub decay_max: f64,

    /// Levels above this decay an extra `level * accel_factor` per tick
    #[serde(default = "default_accel_threshold")]
    pub accel_threshold: f64,
    #[serde(default = "default_accel_factor")]
    pub accel_factor: f64,

    /// Emission boost range (inclusive)
    #[serde(default = "default_boost_min")]
    pub boost_min: f64,
    #[serde(default = "default_boost_max")]
    pub boost_max: f64,

    /// Minimum time between two emissions from this participant (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Local participant id; a random one is generated when unset
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_channel_name() -> String {
    "hype".to_string()
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}
fn default_decay_interval_ms() -> u64 {
    500
}
fn default_decay_min() -> f64 {
    5.0
}
fn default_decay_max() -> f64 {
    12.0
}
fn default_accel_threshold() -> f64 {
    50.0
}
fn default_accel_factor() -> f64 {
    0.08
}
fn default_boost_min() -> f64 {
    10.0
}
fn default_boost_max() -> f64 {
    30.0
}
fn default_cooldown_ms() -> u64 {
    1000
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            history_capacity: default_history_capacity(),
            decay_interval_ms: default_decay_interval_ms(),
            decay_min: default_decay_min(),
            decay_max: default_decay_max(),
            accel_threshold: default_accel_threshold(),
            accel_factor: default_accel_factor(),
            boost_min: default_boost_min(),
            boost_max: default_boost_max(),
            cooldown_ms: default_cooldown_ms(),
            user_id: None,
        }
    }
}

impl GaugeConfig {
    pub fn decay_interval(&self) -> Duration {
        Duration::from_millis(self.decay_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_name.trim().is_empty() {
            return Err(ConfigError::Invalid("channel_name must not be empty".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be at least 1".into()));
        }
        if self.decay_interval_ms == 0 {
            return Err(ConfigError::Invalid("decay_interval_ms must be positive".into()));
        }
        // a zero minimum would let the level hover above zero forever
        if self.decay_min.is_nan() || self.decay_min <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "decay_min must be positive (got {})",
                self.decay_min
            )));
        }
        if self.decay_max < self.decay_min {
            return Err(ConfigError::Invalid(format!(
                "decay range inverted: {}..{}",
                self.decay_min, self.decay_max
            )));
        }
        if self.accel_factor < 0.0 || !self.accel_factor.is_finite() {
            return Err(ConfigError::Invalid("accel_factor must be >= 0".into()));
        }
        if self.boost_min < 0.0 || self.boost_max < self.boost_min {
            return Err(ConfigError::Invalid(format!(
                "boost range invalid: {}..={}",
                self.boost_min, self.boost_max
            )));
        }
        Ok(())
    }
}
