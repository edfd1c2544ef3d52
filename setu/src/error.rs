//! Error types for Setu

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Setu error types
///
/// "Not tracked" and empty map snapshots are normal states and never surface
/// here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be parsed or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Incoming or outgoing frame exceeds the configured limit
    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge {
        /// Frame size in bytes
        size: usize,
        /// Configured maximum in bytes
        max: usize,
    },

    /// The peer end of an internal channel was dropped
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    /// A request did not complete in time
    #[error("Timeout after {0} ms")]
    Timeout(u64),

    /// Shutdown signal handler could not be installed
    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Service cannot answer right now
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<postcard::Error> for Error {
    fn from(e: postcard::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
