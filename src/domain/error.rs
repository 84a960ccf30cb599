//! Domain error types

use thiserror::Error;

/// Errors that can occur while talking to the lightgun
#[derive(Error, Debug)]
pub enum LightgunError {
    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Reader error: {0}")]
    Reader(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for lightgun operations
pub type LightgunResult<T> = Result<T, LightgunError>;
