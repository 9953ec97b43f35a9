//! # Error Types
//!
//! Custom error types for the DShot encoder and channel layer using `thiserror`.

use thiserror::Error;

/// Main error type for DShot ESC
#[derive(Debug, Error)]
pub enum DshotError {
    /// Throttle value does not fit in 11 bits
    #[error("Invalid throttle value {0} (must be 0-2047)")]
    InvalidThrottle(u16),

    /// Resolution / baud rate combination cannot be represented
    #[error("Encoder configuration error: {0}")]
    Configuration(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Operation not allowed in the channel's current state
    #[error("Channel state error: {0}")]
    ChannelState(String),

    /// Pulse transmitter failures
    #[error("Transmit error: {0}")]
    Transmit(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame capture serialization errors
    #[error("Frame log error: {0}")]
    FrameLog(#[from] serde_json::Error),
}

/// Result type alias for DShot ESC
pub type Result<T> = std::result::Result<T, DshotError>;
