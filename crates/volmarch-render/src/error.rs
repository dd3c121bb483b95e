//! Error types for volmarch-render

use thiserror::Error;

/// Result type alias using the renderer's error type
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while building scenes or rendering frames
#[derive(Error, Debug)]
pub enum RenderError {
    /// Volume, colormap or parameter error from the core crate
    #[error(transparent)]
    Core(#[from] volmarch_core::Error),

    /// Node id that does not belong to the scene
    #[error("Unknown scene node {0}")]
    UnknownNode(usize),

    /// Width or height of zero
    #[error("Viewport must be non-empty, got {0}x{1}")]
    EmptyViewport(u32, u32),

    /// Instance whose world transform cannot be inverted
    #[error("Volume instance {0} has a singular transform")]
    SingularTransform(usize),

    /// No GPU adapter matched the request
    #[error("No suitable GPU adapter: {0}")]
    Adapter(String),

    /// Device creation failed
    #[error("GPU device error: {0}")]
    Device(String),

    /// Volume does not fit in one storage buffer binding
    #[error("Volume needs {bytes} bytes of storage, device allows {limit}")]
    VolumeTooLarge { bytes: u64, limit: u64 },

    /// Mapping the output buffer failed
    #[error("GPU readback failed: {0}")]
    Readback(String),
}
