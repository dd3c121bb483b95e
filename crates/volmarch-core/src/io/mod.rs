//! Volume file formats
//!
//! - [`nrrd`]: NRRD with raw or gzip payloads (read), raw float NRRD (write)
//! - [`raw`]: headerless sample dumps with caller-supplied layout

pub mod nrrd;
pub mod raw;

use crate::{Error, Result};

/// Storage type of samples in a file payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl ScalarType {
    /// Bytes per sample
    pub fn size(self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::UInt8 => 1,
            ScalarType::Int16 | ScalarType::UInt16 => 2,
            ScalarType::Int32 | ScalarType::UInt32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    /// Parse a type name, accepting the NRRD spellings
    pub fn parse(name: &str) -> Result<Self> {
        let ty = match name.trim().to_ascii_lowercase().as_str() {
            "signed char" | "int8" | "int8_t" | "char" => ScalarType::Int8,
            "uchar" | "unsigned char" | "uint8" | "uint8_t" => ScalarType::UInt8,
            "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
                ScalarType::Int16
            }
            "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                ScalarType::UInt16
            }
            "int" | "signed int" | "int32" | "int32_t" => ScalarType::Int32,
            "uint" | "unsigned int" | "uint32" | "uint32_t" => ScalarType::UInt32,
            "float" | "float32" => ScalarType::Float32,
            "double" | "float64" => ScalarType::Float64,
            other => return Err(Error::Unsupported(format!("sample type '{}'", other))),
        };
        Ok(ty)
    }
}

/// Byte order of multi-byte samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Decode `count` samples of type `ty` from the start of `bytes`
pub fn decode_samples(bytes: &[u8], count: usize, ty: ScalarType, endian: Endian) -> Result<Vec<f32>> {
    let needed = count
        .checked_mul(ty.size())
        .ok_or_else(|| Error::InvalidParameter("sample count overflows".to_string()))?;
    if bytes.len() < needed {
        return Err(Error::SizeMismatch {
            expected: count,
            actual: bytes.len() / ty.size(),
        });
    }
    if bytes.len() > needed {
        tracing::warn!(
            "Ignoring {} trailing payload bytes",
            bytes.len() - needed
        );
    }

    let chunks = bytes[..needed].chunks_exact(ty.size());
    let samples = match ty {
        ScalarType::Int8 => chunks.map(|c| f32::from(i8::from_le_bytes([c[0]]))).collect(),
        ScalarType::UInt8 => chunks.map(|c| f32::from(c[0])).collect(),
        ScalarType::Int16 => chunks
            .map(|c| {
                let b = [c[0], c[1]];
                f32::from(match endian {
                    Endian::Little => i16::from_le_bytes(b),
                    Endian::Big => i16::from_be_bytes(b),
                })
            })
            .collect(),
        ScalarType::UInt16 => chunks
            .map(|c| {
                let b = [c[0], c[1]];
                f32::from(match endian {
                    Endian::Little => u16::from_le_bytes(b),
                    Endian::Big => u16::from_be_bytes(b),
                })
            })
            .collect(),
        ScalarType::Int32 => chunks
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                (match endian {
                    Endian::Little => i32::from_le_bytes(b),
                    Endian::Big => i32::from_be_bytes(b),
                }) as f32
            })
            .collect(),
        ScalarType::UInt32 => chunks
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                (match endian {
                    Endian::Little => u32::from_le_bytes(b),
                    Endian::Big => u32::from_be_bytes(b),
                }) as f32
            })
            .collect(),
        ScalarType::Float32 => chunks
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3]];
                match endian {
                    Endian::Little => f32::from_le_bytes(b),
                    Endian::Big => f32::from_be_bytes(b),
                }
            })
            .collect(),
        ScalarType::Float64 => chunks
            .map(|c| {
                let b = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
                (match endian {
                    Endian::Little => f64::from_le_bytes(b),
                    Endian::Big => f64::from_be_bytes(b),
                }) as f32
            })
            .collect(),
    };
    Ok(samples)
}
