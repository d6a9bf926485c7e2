//! Live-event hype gauge
//!
//! Folds a stream of crowd excitement readings from a real-time channel into
//! one bounded intensity level, decays it while the crowd is quiet, and keeps
//! a short history for trend display. Local participants can publish a
//! boosted reading back onto the same channel.

pub mod channel;
pub mod config;
pub mod decay;
pub mod emit;
pub mod error;
pub mod gauge;
pub mod history;
pub mod ingest;
pub mod intensity;
pub mod payload;
pub mod sample;
pub mod score;
pub mod server;

pub use channel::{ChannelMessage, LocalChannelHub, PublishOptions, RealtimeChannel};
pub use config::{AppConfig, GaugeConfig, ServerConfig};
pub use emit::{EmitOutcome, Emitter};
pub use error::{ChannelError, ConfigError, GaugeError};
pub use gauge::{GaugeReader, GaugeSnapshot, HypeGauge};
pub use payload::{InboundPayload, OutboundPayload};
pub use sample::{IntensityTag, Sample};
