//! Configuration
//!
//! Loaded once by the binary from a JSON file (created with defaults when
//! missing), then overridden from `HYPE_*` environment variables. The gauge
//! core only ever sees the resulting `GaugeConfig` value.

mod gauge;
mod server;

pub use gauge::GaugeConfig;
pub use server::ServerConfig;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gauge: GaugeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load config from file, creating default if missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Override from environment variables; unparsable values are ignored
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| env::var(key).ok());
    }

    fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // HYPE_PORT
        if let Some(num) = var("HYPE_PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.server.port = num;
        }

        // HYPE_CORS_ANY
        if let Some(val) = var("HYPE_CORS_ANY") {
            self.server.cors_any = val.trim().eq_ignore_ascii_case("true") || val.trim() == "1";
        }

        // HYPE_CHANNEL
        if let Some(val) = var("HYPE_CHANNEL") {
            if !val.trim().is_empty() {
                self.gauge.channel_name = val.trim().to_string();
            }
        }

        // HYPE_HISTORY_CAPACITY
        if let Some(num) =
            var("HYPE_HISTORY_CAPACITY").and_then(|v| v.trim().parse::<usize>().ok())
        {
            self.gauge.history_capacity = num;
        }

        // HYPE_DECAY_INTERVAL_MS
        if let Some(num) =
            var("HYPE_DECAY_INTERVAL_MS").and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.gauge.decay_interval_ms = num;
        }

        // HYPE_COOLDOWN_MS
        if let Some(num) = var("HYPE_COOLDOWN_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.gauge.cooldown_ms = num;
        }

        // HYPE_USER_ID
        if let Some(val) = var("HYPE_USER_ID") {
            if !val.trim().is_empty() {
                self.gauge.user_id = Some(val.trim().to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gauge.validate()
    }
}
