//! # Error Types
//!
//! This module defines error types used throughout the inkdither library.
//!
//! Only job construction can fail. Once a [`crate::dither::Dither`] exists,
//! every strategy is total over its state: there is no per-pixel error path.

use thiserror::Error;

/// Main error type for inkdither operations
#[derive(Debug, Error)]
pub enum DitherError {
    /// Malformed or missing ink, shade or option data
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dither matrix rejected at job start
    #[error("Invalid dither matrix: {0}")]
    Matrix(String),

    /// Scanline input that does not match the configured geometry
    #[error("Invalid scanline input: {0}")]
    Input(String),

    /// Image loading or encoding error (preview harness)
    #[error("Image error: {0}")]
    Image(String),

    /// Job description could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used by the configuration-time APIs.
pub type Result<T> = std::result::Result<T, DitherError>;
