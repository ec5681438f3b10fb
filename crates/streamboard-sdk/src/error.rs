//! SDK error types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the SDK.
#[derive(Error, Debug)]
pub enum SdkError {
    /// A second call-handler was registered on a channel that already has
    /// one. This is a programming error, not a runtime condition.
    #[error("attempted to register a second handler for '{0}'")]
    DuplicateHandler(String),

    /// The transport refused or failed to carry an envelope.
    #[error("transport error: {0}")]
    Transport(String),

    /// A call with a configured timeout got no answer in time.
    #[error("no response on '{channel}' after {}s", timeout.as_secs())]
    NoResponse {
        /// Call channel.
        channel: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// The bus dropped a pending call before it was answered.
    #[error("channel closed")]
    ChannelClosed,

    /// A configuration file could not be used.
    #[error("config error: {0}")]
    Config(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, SdkError>;
