//! Dense 3D scalar volumes
//!
//! A [`Volume`] is an immutable grid of `f32` intensities. Samples are stored
//! x-fastest (`index = x + nx * (y + ny * z)`), which is the payload order of
//! raw NRRD files, so loaders can hand their buffers over without reordering.

mod sampling;

use crate::{Error, Result};
use glam::{UVec3, Vec3};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Get the size of the bounding box
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the center of the bounding box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Eight corners, min corner first
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

/// A dense, immutable 3D scalar field
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: UVec3,
    data: Vec<f32>,
}

impl Volume {
    /// Create a volume from dimensions and an x-fastest sample buffer.
    ///
    /// Fails if any dimension is zero or the buffer length does not match.
    /// Non-finite samples are replaced by `0.0`.
    pub fn new(dims: UVec3, mut data: Vec<f32>) -> Result<Self> {
        let expected = sample_count(dims)?;
        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut replaced = 0usize;
        for v in &mut data {
            if !v.is_finite() {
                *v = 0.0;
                replaced += 1;
            }
        }
        if replaced > 0 {
            tracing::warn!("Replaced {} non-finite samples with 0.0", replaced);
        }

        Ok(Self { dims, data })
    }

    /// Collapse a stack of `frames` volumes by taking the per-voxel maximum.
    ///
    /// `data` holds the frames one after another, each x-fastest, so the
    /// frame index is the slowest axis.
    pub fn max_of_frames(dims: UVec3, frames: u32, data: Vec<f32>) -> Result<Self> {
        let count = sample_count(dims)?;
        let expected = count.checked_mul(frames as usize).ok_or_else(|| {
            Error::InvalidParameter(format!("{} frames of {} samples overflow", frames, count))
        })?;
        if frames == 0 || data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        if frames == 1 {
            return Self::new(dims, data);
        }

        let mut projected = data[..count].to_vec();
        for frame in data[count..].chunks_exact(count) {
            for (out, &v) in projected.iter_mut().zip(frame) {
                *out = out.max(v);
            }
        }
        tracing::info!("Max-projected {} frames", frames);
        Self::new(dims, projected)
    }

    /// Create a volume with every sample set to `value`
    pub fn filled(dims: UVec3, value: f32) -> Result<Self> {
        let count = sample_count(dims)?;
        Self::new(dims, vec![value; count])
    }

    /// Grid dimensions (X, Y, Z)
    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false, a volume holds at least one sample
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw sample buffer, x fastest
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Integer voxel fetch; coordinates are clamped to the grid
    pub fn voxel(&self, x: u32, y: u32, z: u32) -> f32 {
        let x = x.min(self.dims.x - 1) as usize;
        let y = y.min(self.dims.y - 1) as usize;
        let z = z.min(self.dims.z - 1) as usize;
        let nx = self.dims.x as usize;
        let ny = self.dims.y as usize;
        self.data[x + nx * (y + ny * z)]
    }

    /// Smallest and largest sample
    pub fn value_range(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Mean sample value
    pub fn mean(&self) -> f32 {
        let sum: f64 = self.data.iter().map(|&v| f64::from(v)).sum();
        (sum / self.data.len() as f64) as f32
    }

    /// Linearly remap the value range onto `[0, 1]`.
    ///
    /// A flat volume maps to all zeros.
    pub fn normalized(&self) -> Self {
        let (lo, hi) = self.value_range();
        let span = hi - lo;
        let data = if span > 0.0 {
            self.data.iter().map(|&v| (v - lo) / span).collect()
        } else {
            vec![0.0; self.data.len()]
        };
        Self {
            dims: self.dims,
            data,
        }
    }

    /// Local bounding box: voxel centers are inside, faces half a voxel out
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::splat(-0.5), self.dims.as_vec3() - Vec3::splat(0.5))
    }

    /// Center of the voxel grid in voxel coordinates
    pub fn center(&self) -> Vec3 {
        (self.dims.as_vec3() - Vec3::ONE) * 0.5
    }
}

/// Number of samples in a grid, failing on zero or overflowing dimensions
pub(crate) fn sample_count(dims: UVec3) -> Result<usize> {
    if dims.x == 0 || dims.y == 0 || dims.z == 0 {
        return Err(Error::InvalidDimensions(dims.x, dims.y, dims.z));
    }
    (dims.x as usize)
        .checked_mul(dims.y as usize)
        .and_then(|n| n.checked_mul(dims.z as usize))
        .ok_or_else(|| {
            Error::InvalidParameter(format!(
                "volume {}x{}x{} is too large",
                dims.x, dims.y, dims.z
            ))
        })
}
