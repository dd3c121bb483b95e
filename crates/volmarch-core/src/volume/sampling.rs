//! Trilinear sampling, gradients and resampling

use super::{Volume, sample_count};
use crate::{Error, Result};
use glam::{UVec3, Vec3};
use rayon::prelude::*;

impl Volume {
    /// Trilinear interpolation in voxel coordinates.
    ///
    /// Voxel centers sit at integer coordinates. Coordinates are clamped to
    /// `[0, n - 1]` per axis (clamp-to-edge) and non-finite components are
    /// treated as zero, so this never reads out of bounds.
    pub fn sample(&self, p: Vec3) -> f32 {
        let max = (self.dims - UVec3::ONE).as_vec3();
        let p = finite_or_zero(p).clamp(Vec3::ZERO, max);

        let base = p.floor();
        let f = p - base;
        let x0 = base.x as u32;
        let y0 = base.y as u32;
        let z0 = base.z as u32;
        let x1 = (x0 + 1).min(self.dims.x - 1);
        let y1 = (y0 + 1).min(self.dims.y - 1);
        let z1 = (z0 + 1).min(self.dims.z - 1);

        let c00 = lerp(self.voxel(x0, y0, z0), self.voxel(x1, y0, z0), f.x);
        let c10 = lerp(self.voxel(x0, y1, z0), self.voxel(x1, y1, z0), f.x);
        let c01 = lerp(self.voxel(x0, y0, z1), self.voxel(x1, y0, z1), f.x);
        let c11 = lerp(self.voxel(x0, y1, z1), self.voxel(x1, y1, z1), f.x);

        let c0 = lerp(c00, c10, f.y);
        let c1 = lerp(c01, c11, f.y);
        lerp(c0, c1, f.z)
    }

    /// Sample at normalized texture coordinates.
    ///
    /// `uvw` is clamped to the unit cube; `0` and `1` are the outer faces of
    /// the box, not the first and last voxel centers.
    pub fn sample_texcoord(&self, uvw: Vec3) -> f32 {
        let uvw = finite_or_zero(uvw).clamp(Vec3::ZERO, Vec3::ONE);
        self.sample(uvw * self.dims.as_vec3() - Vec3::splat(0.5))
    }

    /// Central-difference gradient in voxel coordinates.
    ///
    /// A non-positive or non-finite `delta` falls back to one voxel.
    pub fn gradient(&self, p: Vec3, delta: f32) -> Vec3 {
        let delta = if delta.is_finite() && delta > 0.0 { delta } else { 1.0 };
        let dx = Vec3::new(delta, 0.0, 0.0);
        let dy = Vec3::new(0.0, delta, 0.0);
        let dz = Vec3::new(0.0, 0.0, delta);
        let inv = 0.5 / delta;
        Vec3::new(
            self.sample(p + dx) - self.sample(p - dx),
            self.sample(p + dy) - self.sample(p - dy),
            self.sample(p + dz) - self.sample(p - dz),
        ) * inv
    }

    /// Resample to `round(n * scale)` voxels per axis (at least one).
    ///
    /// Output voxel centers map back onto the source box, so a
    /// down-scaled volume covers the same extent with coarser voxels.
    pub fn resample(&self, scale: f32) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "resample scale must be positive, got {}",
                scale
            )));
        }

        let src = self.dims.as_vec3();
        let dims = (src * scale).round().max(Vec3::ONE).as_uvec3();
        let ratio = src / dims.as_vec3();

        let total = sample_count(dims)?;
        let nx = dims.x as usize;
        let ny = dims.y as usize;

        let data: Vec<f32> = (0..total)
            .into_par_iter()
            .map(|idx| {
                let x = idx % nx;
                let y = (idx / nx) % ny;
                let z = idx / (nx * ny);
                let dst = Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5);
                self.sample(dst * ratio - Vec3::splat(0.5))
            })
            .collect();

        tracing::debug!(
            "Resampled {}x{}x{} -> {}x{}x{}",
            self.dims.x,
            self.dims.y,
            self.dims.z,
            dims.x,
            dims.y,
            dims.z
        );

        Self::new(dims, data)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn finite_or_zero(p: Vec3) -> Vec3 {
    let f = |v: f32| if v.is_finite() { v } else { 0.0 };
    Vec3::new(f(p.x), f(p.y), f(p.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_x(n: u32) -> Volume {
        let data = (0..n * n * n).map(|i| (i % n) as f32).collect();
        Volume::new(UVec3::splat(n), data).unwrap()
    }

    #[test]
    fn sample_hits_voxel_centers_exactly() {
        let vol = ramp_x(4);
        assert_relative_eq!(vol.sample(Vec3::new(2.0, 1.0, 3.0)), 2.0);
    }

    #[test]
    fn sample_interpolates_between_centers() {
        let vol = ramp_x(4);
        assert_relative_eq!(vol.sample(Vec3::new(1.25, 0.5, 0.5)), 1.25);
    }

    #[test]
    fn sample_clamps_outside_the_grid() {
        let vol = ramp_x(4);
        assert_relative_eq!(vol.sample(Vec3::new(-3.0, 0.0, 0.0)), 0.0);
        assert_relative_eq!(vol.sample(Vec3::new(9.0, 0.0, 0.0)), 3.0);
        assert_relative_eq!(vol.sample(Vec3::new(f32::NAN, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn texcoords_address_box_faces() {
        let vol = ramp_x(4);
        // uvw 0.5 is the box center, halfway between voxels 1 and 2
        assert_relative_eq!(vol.sample_texcoord(Vec3::splat(0.5)), 1.5);
        assert_relative_eq!(vol.sample_texcoord(Vec3::new(2.0, 0.5, 0.5)), 3.0);
    }

    #[test]
    fn gradient_of_a_ramp_is_constant() {
        let vol = ramp_x(8);
        let g = vol.gradient(Vec3::new(3.5, 4.0, 4.0), 1.0);
        assert_relative_eq!(g.x, 1.0);
        assert_relative_eq!(g.y, 0.0);
        assert_relative_eq!(g.z, 0.0);
    }

    #[test]
    fn degenerate_gradient_delta_stays_finite() {
        let vol = ramp_x(8);
        for delta in [0.0, -2.0, f32::NAN] {
            let g = vol.gradient(Vec3::new(3.5, 4.0, 4.0), delta);
            assert!(g.is_finite());
            assert_relative_eq!(g.x, 1.0);
        }
    }

    #[test]
    fn oversized_resample_is_an_error() {
        let vol = ramp_x(8);
        assert!(matches!(vol.resample(1e12), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn resample_halves_dimensions() {
        let vol = ramp_x(8);
        let half = vol.resample(0.5).unwrap();
        assert_eq!(half.dims(), UVec3::splat(4));
        // Output voxel 0 covers source voxels 0 and 1
        assert_relative_eq!(half.voxel(0, 0, 0), 0.5);

        assert!(vol.resample(0.0).is_err());
        assert_eq!(vol.resample(1e-6).unwrap().dims(), UVec3::ONE);
    }
}
