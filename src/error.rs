use thiserror::Error;

/// Failures publishing to or subscribing on a real-time channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel '{0}' is closed")]
    Closed(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Failures starting the gauge core
#[derive(Error, Debug)]
pub enum GaugeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] ChannelError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
