//! NRRD volumes with attached payloads
//!
//! Reads what the scan pipeline produces: three dimensions (or a 4D stack
//! that is max-projected down to three), an attached payload and `raw` or
//! `gzip` encoding. Orientation fields (`space`, `spacings`,
//! `space directions`, ...) are accepted and ignored.

use super::{Endian, ScalarType, decode_samples};
use crate::volume::{Volume, sample_count};
use crate::{Error, Result};
use flate2::read::GzDecoder;
use glam::UVec3;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

/// Payload encodings we can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Raw,
    Gzip,
}

/// Parsed header fields we act on
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: String,
    pub scalar_type: ScalarType,
    pub dims: UVec3,
    /// Length of the slowest axis of a 4D file, 1 for plain volumes
    pub frames: u32,
    pub endian: Endian,
    pub encoding: Encoding,
}

/// Read a NRRD file from disk
pub fn read(path: impl AsRef<Path>) -> Result<Volume> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let volume = parse(&bytes).map_err(|e| match e {
        Error::Header(msg) => Error::Header(format!("{}: {}", path.display(), msg)),
        other => other,
    })?;

    let dims = volume.dims();
    tracing::info!(
        "Loaded {} ({}x{}x{})",
        path.display(),
        dims.x,
        dims.y,
        dims.z
    );
    Ok(volume)
}

/// Parse an in-memory NRRD file
pub fn parse(bytes: &[u8]) -> Result<Volume> {
    let (header, payload) = parse_header(bytes)?;
    let count = sample_count(header.dims)?
        .checked_mul(header.frames as usize)
        .ok_or_else(|| Error::InvalidParameter("NRRD sizes are too large".to_string()))?;

    let payload = match header.encoding {
        Encoding::Raw => Cow::Borrowed(payload),
        Encoding::Gzip => {
            let mut inflated = Vec::new();
            GzDecoder::new(payload)
                .read_to_end(&mut inflated)
                .map_err(|e| Error::Header(format!("corrupt gzip payload: {}", e)))?;
            Cow::Owned(inflated)
        }
    };

    let data = decode_samples(&payload, count, header.scalar_type, header.endian)?;
    Volume::max_of_frames(header.dims, header.frames, data)
}

/// Split a NRRD file into its header and payload
pub fn parse_header(bytes: &[u8]) -> Result<(Header, &[u8])> {
    let (text, payload) = split_header(bytes)?;
    let mut lines = text.lines();

    let version = lines
        .next()
        .map(str::trim)
        .filter(|l| l.starts_with("NRRD000"))
        .ok_or_else(|| Error::Header("missing NRRD magic".to_string()))?
        .to_string();

    let mut fields = HashMap::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        // `key:=value` lines are free-form key/value pairs
        if line.contains(":=") {
            continue;
        }
        let Some((key, value)) = line.split_once(": ") else {
            return Err(Error::Header(format!("malformed field line '{}'", line)));
        };
        fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let field = |name: &str| {
        fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Header(format!("missing required field '{}'", name)))
    };

    if fields.contains_key("data file") || fields.contains_key("datafile") {
        return Err(Error::Unsupported("detached NRRD payloads".to_string()));
    }

    let encoding = match field("encoding")?.to_ascii_lowercase().as_str() {
        "raw" => Encoding::Raw,
        "gzip" | "gz" => Encoding::Gzip,
        other => return Err(Error::Unsupported(format!("NRRD encoding '{}'", other))),
    };

    let dimension: u32 = field("dimension")?
        .parse()
        .map_err(|_| Error::Header("dimension is not an integer".to_string()))?;
    if !(3..=4).contains(&dimension) {
        return Err(Error::Unsupported(format!(
            "{}-dimensional NRRD, expected 3 or 4",
            dimension
        )));
    }

    let sizes = field("sizes")?
        .split_whitespace()
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| Error::Header(format!("bad size '{}'", s)))
        })
        .collect::<Result<Vec<_>>>()?;
    let (x, y, z, frames) = match (dimension, sizes.as_slice()) {
        (3, &[x, y, z]) => (x, y, z, 1),
        (4, &[x, y, z, t]) => (x, y, z, t),
        _ => {
            return Err(Error::Header(format!(
                "expected {} sizes, found {}",
                dimension,
                sizes.len()
            )));
        }
    };
    if frames == 0 {
        return Err(Error::InvalidDimensions(x, y, z));
    }

    let scalar_type = ScalarType::parse(field("type")?)?;
    let endian = match fields.get("endian").map(|e| e.to_ascii_lowercase()) {
        None => Endian::Little,
        Some(e) if e == "little" => Endian::Little,
        Some(e) if e == "big" => Endian::Big,
        Some(e) => return Err(Error::Header(format!("unknown endian '{}'", e))),
    };

    let header = Header {
        version,
        scalar_type,
        dims: UVec3::new(x, y, z),
        frames,
        endian,
        encoding,
    };
    Ok((header, payload))
}

/// Header lines run up to the first empty line, `\n` or `\r\n` terminated
fn split_header(bytes: &[u8]) -> Result<(&str, &[u8])> {
    let mut start = 0;
    let mut end = None;
    while let Some(offset) = bytes[start..].iter().position(|&b| b == b'\n') {
        let line = &bytes[start..start + offset];
        if line.is_empty() || line == b"\r" {
            end = Some((start, start + offset + 1));
            break;
        }
        start += offset + 1;
    }
    let Some((header_end, payload_start)) = end else {
        return Err(Error::Header("header is not terminated by a blank line".to_string()));
    };

    let text = std::str::from_utf8(&bytes[..header_end])
        .map_err(|_| Error::Header("header is not valid text".to_string()))?;
    Ok((text, &bytes[payload_start..]))
}

/// Write a volume as `float`, little-endian, raw-encoded NRRD
pub fn write(path: impl AsRef<Path>, volume: &Volume) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut out = std::io::BufWriter::new(file);
    write_to(&mut out, volume)?;
    out.flush()?;

    tracing::info!("Wrote {}", path.display());
    Ok(())
}

/// Serialize a volume into any writer
pub fn write_to<W: Write>(out: &mut W, volume: &Volume) -> Result<()> {
    let dims = volume.dims();
    write!(
        out,
        "NRRD0004\n\
         # written by volmarch\n\
         type: float\n\
         dimension: 3\n\
         sizes: {} {} {}\n\
         endian: little\n\
         encoding: raw\n\n",
        dims.x, dims.y, dims.z
    )?;
    for v in volume.data() {
        out.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn reads_uchar_volume() {
        let bytes = file(
            "NRRD0004\n# comment\ntype: unsigned char\ndimension: 3\nsizes: 2 1 1\n\
             space: left-posterior-superior\nencoding: raw\n\n",
            &[7, 200],
        );
        let vol = parse(&bytes).unwrap();
        assert_eq!(vol.dims(), UVec3::new(2, 1, 1));
        assert_eq!(vol.data(), &[7.0, 200.0]);
    }

    #[test]
    fn reads_big_endian_floats() {
        let payload: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = file(
            "NRRD0005\ntype: float\ndimension: 3\nsizes: 1 2 1\nendian: big\nencoding: raw\n\n",
            &payload,
        );
        assert_eq!(parse(&bytes).unwrap().data(), &[1.5, -2.0]);
    }

    #[test]
    fn reads_gzip_payloads() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let raw: Vec<u8> = [0.5f32, 2.0, -1.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let bytes = file(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 3 1 1\nencoding: gzip\n\n",
            &encoder.finish().unwrap(),
        );
        assert_eq!(parse(&bytes).unwrap().data(), &[0.5, 2.0, -1.0]);

        let corrupt = file(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 1 1 1\nencoding: gzip\n\n",
            &[1, 2, 3, 4],
        );
        assert!(matches!(parse(&corrupt), Err(Error::Header(_))));
    }

    #[test]
    fn crlf_header_keeps_leading_newline_bytes() {
        let bytes = file(
            "NRRD0004\r\ntype: uchar\r\ndimension: 3\r\nsizes: 4 1 1\r\nencoding: raw\r\n\r\n",
            &[10, 10, 0xff, 0xfe],
        );
        assert_eq!(parse(&bytes).unwrap().data(), &[10.0, 10.0, 255.0, 254.0]);
    }

    #[test]
    fn four_dimensional_stacks_are_max_projected() {
        let bytes = file(
            "NRRD0004\ntype: uchar\ndimension: 4\nsizes: 2 1 1 3\nencoding: raw\n\n",
            &[1, 9, 7, 2, 3, 4],
        );
        let (header, _) = parse_header(&bytes).unwrap();
        assert_eq!(header.frames, 3);
        let vol = parse(&bytes).unwrap();
        assert_eq!(vol.dims(), UVec3::new(2, 1, 1));
        assert_eq!(vol.data(), &[7.0, 9.0]);
    }

    #[test]
    fn huge_sizes_are_an_error() {
        let bytes = file(
            "NRRD0004\ntype: uchar\ndimension: 3\nsizes: 4294967295 4294967295 4294967295\n\
             encoding: raw\n\n",
            &[0; 8],
        );
        assert!(matches!(parse(&bytes), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn rejects_unknown_encodings_and_detached_payloads() {
        let bz = file(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 1 1 1\nencoding: bzip2\n\n",
            &[],
        );
        assert!(matches!(parse(&bz), Err(Error::Unsupported(_))));

        let detached = file(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 1 1 1\nencoding: raw\ndata file: a.raw\n\n",
            &[],
        );
        assert!(matches!(parse(&detached), Err(Error::Unsupported(_))));
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(matches!(parse(b"P6\n\n"), Err(Error::Header(_))));
        let five_d = file(
            "NRRD0004\ntype: float\ndimension: 5\nsizes: 2 2 1 1 1\nencoding: raw\n\n",
            &[0; 16],
        );
        assert!(matches!(parse(&five_d), Err(Error::Unsupported(_))));
        let short = file(
            "NRRD0004\ntype: float\ndimension: 3\nsizes: 2 2 2\nencoding: raw\n\n",
            &[0; 16],
        );
        assert!(matches!(parse(&short), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn written_files_read_back() {
        let vol = Volume::new(UVec3::new(2, 2, 1), vec![0.0, 0.25, 0.5, 1.0]).unwrap();
        let mut bytes = Vec::new();
        write_to(&mut bytes, &vol).unwrap();
        assert_eq!(parse(&bytes).unwrap(), vol);
    }
}
