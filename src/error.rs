//! Error handling for the phonehome telemetry agent.

/// A specialized `Result` type for telemetry agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// The main error type for telemetry agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A hardware or OS value could not be parsed
    #[error("Failed to parse telemetry source: {0}")]
    Parse(String),

    /// A probe's data source is missing or unreadable
    #[error("Probe unavailable: {0}")]
    Probe(String),

    /// Network operation failed
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new probe error
    pub fn probe_error(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
