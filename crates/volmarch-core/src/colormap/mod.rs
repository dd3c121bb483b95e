//! Colormaps: lookup tables from a normalized scalar to a display color
//!
//! A [`Colormap`] is a strip of evenly spaced RGB samples over `[0, 1]`,
//! the CPU twin of a colormap texture. A [`ColormapSet`] is the fixed set a
//! render parameter snapshot can select from.

mod builtin;

use crate::{Error, Result};
use glam::Vec3;
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use builtin::{DEFAULT_RANDOM_HUE_ENTRIES, DEFAULT_RANDOM_HUE_SEED};

/// How lookups between two table entries are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Blend the two neighbouring entries
    #[default]
    Linear,
    /// Snap to the closest entry (label maps)
    Nearest,
}

/// A color lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct Colormap {
    /// Colormap name
    pub name: String,
    /// Color samples, evenly spaced from 0 to 1
    pub colors: Vec<Vec3>,
    /// Lookup mode
    pub interpolation: Interpolation,
}

impl Colormap {
    /// Create a linearly interpolated colormap
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
            interpolation: Interpolation::Linear,
        }
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Sample the colormap at `t`, clamped to `[0, 1]` (NaN reads as 0)
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

        match self.colors.len() {
            0 => Vec3::ZERO,
            1 => self.colors[0],
            len => {
                let n = len - 1;
                let x = t * n as f32;
                match self.interpolation {
                    Interpolation::Nearest => self.colors[(x.round() as usize).min(n)],
                    Interpolation::Linear => {
                        let idx = (x.floor() as usize).min(n - 1);
                        let frac = x - idx as f32;
                        self.colors[idx].lerp(self.colors[idx + 1], frac)
                    }
                }
            }
        }
    }

    /// Load a colormap strip image; the middle row is the table
    pub fn from_image(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.to_rgb8();
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::InvalidParameter(format!(
                "colormap image {} is empty",
                path.display()
            )));
        }

        let row = img.height() / 2;
        let colors = (0..img.width())
            .map(|x| {
                let Rgb([r, g, b]) = *img.get_pixel(x, row);
                Vec3::new(f32::from(r), f32::from(g), f32::from(b)) / 255.0
            })
            .collect();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().trim_start_matches("cm_").to_string())
            .unwrap_or_else(|| "custom".to_string());

        tracing::debug!("Loaded colormap '{}' from {}", name, path.display());
        Ok(Self::new(name, colors))
    }

    /// Bake the colormap into a horizontal strip texture
    pub fn to_image(&self, width: u32, height: u32) -> RgbImage {
        let denom = width.saturating_sub(1).max(1) as f32;
        RgbImage::from_fn(width, height, |x, _| {
            let c = self.sample(x as f32 / denom);
            Rgb([to_u8(c.x), to_u8(c.y), to_u8(c.z)])
        })
    }

    /// Save the baked strip (format from the file extension)
    pub fn save_image(&self, path: impl AsRef<Path>, width: u32, height: u32) -> Result<()> {
        self.to_image(width, height).save(path)?;
        Ok(())
    }

    /// Random fully saturated hues for label volumes, entry 0 black
    pub fn random_hue(entries: usize, seed: u64) -> Self {
        builtin::random_hue(entries, seed)
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Identifier of a selectable colormap
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ColormapId {
    Gray,
    #[default]
    Viridis,
    Plasma,
    Inferno,
    Turbo,
    RandomHue,
    /// A map registered at configuration time (e.g. loaded from a PNG)
    Custom(String),
}

impl ColormapId {
    /// All maps that ship with the renderer
    pub const BUILTIN: [ColormapId; 6] = [
        ColormapId::Gray,
        ColormapId::Viridis,
        ColormapId::Plasma,
        ColormapId::Inferno,
        ColormapId::Turbo,
        ColormapId::RandomHue,
    ];

    pub fn name(&self) -> &str {
        match self {
            ColormapId::Gray => "gray",
            ColormapId::Viridis => "viridis",
            ColormapId::Plasma => "plasma",
            ColormapId::Inferno => "inferno",
            ColormapId::Turbo => "turbo",
            ColormapId::RandomHue => "random_hue",
            ColormapId::Custom(name) => name,
        }
    }
}

impl fmt::Display for ColormapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColormapId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let id = match s.trim().to_ascii_lowercase().as_str() {
            "gray" | "grey" => ColormapId::Gray,
            "viridis" => ColormapId::Viridis,
            "plasma" => ColormapId::Plasma,
            "inferno" => ColormapId::Inferno,
            "turbo" => ColormapId::Turbo,
            "random_hue" | "random-hue" => ColormapId::RandomHue,
            _ => ColormapId::Custom(s.trim().to_string()),
        };
        Ok(id)
    }
}

impl From<String> for ColormapId {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }
}

impl From<ColormapId> for String {
    fn from(id: ColormapId) -> Self {
        id.name().to_string()
    }
}

/// The set of colormaps a frame can select from
#[derive(Debug, Clone, Default)]
pub struct ColormapSet {
    maps: HashMap<ColormapId, Colormap>,
}

impl ColormapSet {
    /// An empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin maps
    pub fn builtin() -> Self {
        let mut set = Self::new();
        for id in ColormapId::BUILTIN {
            let map = builtin::colormap(&id);
            set.register(id, map);
        }
        set
    }

    /// Add or replace a map
    pub fn register(&mut self, id: ColormapId, colormap: Colormap) {
        self.maps.insert(id, colormap);
    }

    /// Look up a map by id
    pub fn get(&self, id: &ColormapId) -> Result<&Colormap> {
        self.maps
            .get(id)
            .ok_or_else(|| Error::UnknownColormap(id.to_string()))
    }

    /// Registered ids, sorted by name
    pub fn ids(&self) -> Vec<&ColormapId> {
        let mut ids: Vec<_> = self.maps.keys().collect();
        ids.sort_by(|a, b| a.name().cmp(b.name()));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_tone() -> Colormap {
        Colormap::new("two", vec![Vec3::ZERO, Vec3::ONE])
    }

    #[test]
    fn linear_sampling_blends_neighbours() {
        let cm = two_tone();
        assert_relative_eq!(cm.sample(0.25).x, 0.25);
        assert_eq!(cm.sample(-1.0), Vec3::ZERO);
        assert_eq!(cm.sample(7.0), Vec3::ONE);
        assert_eq!(cm.sample(f32::NAN), Vec3::ZERO);
    }

    #[test]
    fn nearest_sampling_snaps() {
        let cm = two_tone().with_interpolation(Interpolation::Nearest);
        assert_eq!(cm.sample(0.4), Vec3::ZERO);
        assert_eq!(cm.sample(0.6), Vec3::ONE);
    }

    #[test]
    fn degenerate_tables() {
        assert_eq!(Colormap::new("empty", Vec::new()).sample(0.5), Vec3::ZERO);
        let single = Colormap::new("one", vec![Vec3::X]);
        assert_eq!(single.sample(0.9), Vec3::X);
    }

    #[test]
    fn ids_round_trip_through_strings() {
        for id in ColormapId::BUILTIN {
            assert_eq!(id.name().parse::<ColormapId>().unwrap(), id);
        }
        assert_eq!(
            "cm_custom".parse::<ColormapId>().unwrap(),
            ColormapId::Custom("cm_custom".to_string())
        );
    }

    #[test]
    fn unknown_custom_maps_are_errors() {
        let set = ColormapSet::builtin();
        assert!(set.get(&ColormapId::Turbo).is_ok());
        assert!(matches!(
            set.get(&ColormapId::Custom("nope".to_string())),
            Err(Error::UnknownColormap(_))
        ));
        assert_eq!(set.ids().len(), ColormapId::BUILTIN.len());
    }

    #[test]
    fn strip_image_matches_samples() {
        let cm = two_tone();
        let img = cm.to_image(3, 2);
        assert_eq!(img.get_pixel(0, 1), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(1, 0), &Rgb([128, 128, 128]));
        assert_eq!(img.get_pixel(2, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn strip_image_loads_back() {
        let path = std::env::temp_dir().join("volmarch_test_cm_strip.png");
        let cm = ColormapSet::builtin().get(&ColormapId::Viridis).unwrap().clone();
        cm.save_image(&path, 64, 4).unwrap();

        let loaded = Colormap::from_image(&path).unwrap();
        assert_eq!(loaded.colors.len(), 64);
        let (a, b) = (cm.sample(0.5), loaded.sample(0.5));
        assert!((a - b).abs().max_element() < 0.02);

        std::fs::remove_file(&path).ok();
    }
}
