//! # Error Types
//!
//! Custom error types for Rover Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for Rover Bridge
#[derive(Debug, Error)]
pub enum RoverBridgeError {
    /// Serial port I/O errors after the port was opened
    #[error("Serial error: {0}")]
    Serial(String),

    /// No serial device could be opened
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),

    /// A command character that cannot be sent as a single drive code
    #[error("Invalid command character: {0:?}")]
    InvalidCommand(char),

    /// Configuration parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Session recorder misuse (e.g. metadata written twice)
    #[error("Recorder error: {0}")]
    Recorder(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Rover Bridge
pub type Result<T> = std::result::Result<T, RoverBridgeError>;
