//! Procedural scalar fields
//!
//! Fields are defined over normalized coordinates in `[0, 1]^3` and can be
//! rasterized into a [`Volume`] at any resolution. They stand in for scan
//! data in demos and tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use volmarch_core::prelude::*;
//!
//! let blob = Sphere::new(Vec3::splat(0.5), 0.3, 0.1);
//! let volume = Volume::from_field(&blob, UVec3::splat(64))?;
//! ```

pub mod primitives;

use crate::Result;
use crate::volume::{Volume, sample_count};
use glam::{UVec3, Vec3};
use rayon::prelude::*;

/// Any type that can report an intensity at a normalized position
pub trait ScalarField: Send + Sync {
    /// Intensity at `uvw` in `[0, 1]^3`
    fn value(&self, uvw: Vec3) -> f32;
}

impl<F: ScalarField + ?Sized> ScalarField for &F {
    fn value(&self, uvw: Vec3) -> f32 {
        (**self).value(uvw)
    }
}

impl<F: ScalarField + ?Sized> ScalarField for Box<F> {
    fn value(&self, uvw: Vec3) -> f32 {
        (**self).value(uvw)
    }
}

impl Volume {
    /// Rasterize a field at voxel centers, `uvw = (i + 0.5) / n`.
    ///
    /// Uses Rayon to evaluate all samples in parallel.
    pub fn from_field<F: ScalarField + ?Sized>(field: &F, dims: UVec3) -> Result<Self> {
        let size = dims.as_vec3();
        let total = sample_count(dims)?;
        let nx = dims.x as usize;
        let ny = dims.y as usize;

        let data: Vec<f32> = (0..total)
            .into_par_iter()
            .map(|idx| {
                let x = idx % nx;
                let y = (idx / nx) % ny;
                let z = idx / (nx * ny);
                let uvw = (Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5)) / size;
                field.value(uvw)
            })
            .collect();

        Self::new(dims, data)
    }
}
