//! Headerless volume dumps
//!
//! The caller supplies dimensions, sample type and byte order. A dump may
//! hold several frames back to back; they are max-projected into one volume.

use super::{Endian, ScalarType, decode_samples};
use crate::volume::{Volume, sample_count};
use crate::{Error, Result};
use glam::UVec3;
use std::path::Path;

/// Layout of a headerless payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLayout {
    pub dims: UVec3,
    /// Volumes stored one after another, at least 1
    pub frames: u32,
    pub scalar_type: ScalarType,
    pub endian: Endian,
}

/// Decode a raw sample buffer into a volume
pub fn decode(bytes: &[u8], layout: RawLayout) -> Result<Volume> {
    let dims = layout.dims;
    let count = sample_count(dims)?
        .checked_mul(layout.frames.max(1) as usize)
        .ok_or_else(|| Error::InvalidParameter("raw layout is too large".to_string()))?;
    let data = decode_samples(bytes, count, layout.scalar_type, layout.endian)?;
    Volume::max_of_frames(dims, layout.frames.max(1), data)
}

/// Read a raw dump from disk
pub fn read(path: impl AsRef<Path>, layout: RawLayout) -> Result<Volume> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let volume = decode(&bytes, layout)?;
    tracing::info!("Loaded raw volume {}", path.display());
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_int16_grid() {
        let bytes: Vec<u8> = [-3i16, 4, 5, 6].iter().flat_map(|v| v.to_le_bytes()).collect();
        let layout = RawLayout {
            dims: UVec3::new(2, 2, 1),
            frames: 1,
            scalar_type: ScalarType::Int16,
            endian: Endian::Little,
        };
        let vol = decode(&bytes, layout).unwrap();
        assert_eq!(vol.data(), &[-3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn stacked_frames_are_max_projected() {
        let layout = RawLayout {
            dims: UVec3::new(2, 1, 1),
            frames: 2,
            scalar_type: ScalarType::UInt8,
            endian: Endian::Little,
        };
        let vol = decode(&[3, 8, 6, 1], layout).unwrap();
        assert_eq!(vol.dims(), UVec3::new(2, 1, 1));
        assert_eq!(vol.data(), &[6.0, 8.0]);
    }

    #[test]
    fn huge_layouts_are_an_error() {
        let layout = RawLayout {
            dims: UVec3::splat(u32::MAX),
            frames: 1,
            scalar_type: ScalarType::UInt8,
            endian: Endian::Little,
        };
        assert!(matches!(decode(&[0; 4], layout), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn zero_dims_fail_before_decoding() {
        let layout = RawLayout {
            dims: UVec3::new(2, 0, 1),
            frames: 1,
            scalar_type: ScalarType::UInt8,
            endian: Endian::Little,
        };
        assert!(matches!(
            decode(&[], layout),
            Err(Error::InvalidDimensions(2, 0, 1))
        ));
    }
}
