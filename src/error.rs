//! Error types and handling.

use thiserror::Error;

use crate::config::ConfigError;

/// Driver-wide error type
#[derive(Error, Debug)]
pub enum DriverError {
    /// TCP connection or write failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Device did not accept a connection or write in time
    #[error("Device timeout: {0}")]
    Timeout(String),

    /// Frame could not be encoded (length mismatch, oversized field)
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Credential provider failed for a reason other than a missing session
    #[error("Auth error: {0}")]
    Auth(String),

    /// Rejected command request
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for DriverError
pub type Result<T> = std::result::Result<T, DriverError>;

impl DriverError {
    /// Create an encoding error with message
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create an auth error with message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create an invalid command error with message
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }
}
