//! Error types for volmarch-core

use thiserror::Error;

/// Result type alias using volmarch's core Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building volumes, colormaps or parameters
#[derive(Error, Debug)]
pub enum Error {
    /// A volume dimension was zero
    #[error("Invalid volume dimensions: {0}x{1}x{2}")]
    InvalidDimensions(u32, u32, u32),

    /// Sample buffer length does not match the declared dimensions
    #[error("Data size mismatch: expected {expected} samples, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed volume file header
    #[error("Malformed header: {0}")]
    Header(String),

    /// Valid file using a feature we do not read
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Colormap id that is not part of the configured set
    #[error("Unknown colormap: {0}")]
    UnknownColormap(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding/decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
