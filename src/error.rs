use thiserror::Error;

/// Rejected configuration. Always fatal at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("warning threshold {warning}°C must be below critical threshold {critical}°C")]
    ThresholdOrder { warning: f32, critical: f32 },
    #[error("threshold {0} is not a finite temperature")]
    NonFiniteThreshold(&'static str),
    #[error("countdown start must be at least one second")]
    ZeroCountdown,
    #[error("max log entries {requested} outside 1..={limit}")]
    LogCapacity { requested: usize, limit: usize },
    #[error("poll interval must be non-zero")]
    ZeroPollInterval,
    #[error("simulation parameter {0} is out of range")]
    Simulation(&'static str),
    #[error("failed to read config file: {0}")]
    Io(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

/// Live transport could not be established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("transport {address} unavailable: {reason}")]
    Unavailable { address: String, reason: String },
}

/// Failure while talking to an open transport. Never fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("remote end closed the connection")]
    Closed,
    #[error("transport not open")]
    NotOpen,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("operator command queue full")]
    CommandQueueFull,
}
