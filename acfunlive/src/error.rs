//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Streamer not found: no AcFun user with uid {uid}")]
    StreamerNotFound { uid: u64 },

    #[error("Streamer {uid} is not live")]
    NotLive { uid: u64 },

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Danmu error: {0}")]
    Danmu(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(uid: u64) -> Self {
        Self::StreamerNotFound { uid }
    }

    pub fn not_live(uid: u64) -> Self {
        Self::NotLive { uid }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Whether the error only concerns a single streamer.
    ///
    /// Everything except configuration errors is isolated to the task that
    /// produced it.
    pub fn is_entity_scoped(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}
