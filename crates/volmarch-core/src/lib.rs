//! # Volmarch Core
//!
//! Data side of the volume renderer: scalar volumes, procedural fields,
//! volume file formats, colormaps and the render parameter snapshot.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use volmarch_core::prelude::*;
//!
//! let volume = io::nrrd::read("data/brain_256.nrrd")?.normalized();
//! let params = RenderParams::default()
//!     .with_mode(RenderMode::Iso)
//!     .with_iso_threshold(0.24);
//! ```
//!
//! ## Conventions
//!
//! - **Sample order**: x fastest, then y, then z (NRRD raw order)
//! - **Voxel space**: voxel centers sit at integer coordinates, the volume
//!   box spans `[-0.5, n - 0.5]` on each axis
//! - **Scalar domain**: parameters live in `[0, 1]`; use
//!   [`Volume::normalized`](volume::Volume::normalized) for raw scan values

pub mod colormap;
pub mod field;
pub mod io;
pub mod params;
pub mod presets;
pub mod volume;

mod error;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::colormap::{Colormap, ColormapId, ColormapSet, Interpolation};
    pub use crate::field::{ScalarField, primitives::*};
    pub use crate::io;
    pub use crate::params::{RenderMode, RenderParams};
    pub use crate::presets::OrganPreset;
    pub use crate::volume::{Aabb, Volume};

    // Math (re-export glam)
    pub use glam::{Mat4, Quat, UVec3, Vec3, Vec4};

    // Error handling
    pub use crate::{Error, Result};
}
