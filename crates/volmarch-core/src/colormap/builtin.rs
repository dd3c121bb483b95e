//! Builtin colormap tables
//!
//! Sequential maps are stored as 11 control points (t = 0.0, 0.1, ... 1.0)
//! and blended linearly; turbo is baked from its polynomial fit.

#![allow(clippy::unreadable_literal)]
#![allow(clippy::excessive_precision)]

use super::{Colormap, ColormapId, Interpolation};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Table size of the label colormap
pub const DEFAULT_RANDOM_HUE_ENTRIES: usize = 1024;
/// Seed of the label colormap
pub const DEFAULT_RANDOM_HUE_SEED: u64 = 42;

const VIRIDIS: [[f32; 3]; 11] = [
    [0.267, 0.004, 0.329],
    [0.282, 0.140, 0.457],
    [0.253, 0.265, 0.529],
    [0.206, 0.371, 0.553],
    [0.163, 0.471, 0.558],
    [0.127, 0.566, 0.550],
    [0.134, 0.658, 0.517],
    [0.266, 0.749, 0.440],
    [0.477, 0.821, 0.318],
    [0.741, 0.873, 0.150],
    [0.993, 0.906, 0.144],
];

const PLASMA: [[f32; 3]; 11] = [
    [0.050, 0.030, 0.528],
    [0.254, 0.014, 0.615],
    [0.417, 0.001, 0.658],
    [0.562, 0.052, 0.642],
    [0.692, 0.165, 0.565],
    [0.798, 0.280, 0.470],
    [0.881, 0.393, 0.383],
    [0.949, 0.517, 0.295],
    [0.988, 0.652, 0.211],
    [0.988, 0.808, 0.145],
    [0.940, 0.975, 0.131],
];

const INFERNO: [[f32; 3]; 11] = [
    [0.001, 0.000, 0.014],
    [0.087, 0.045, 0.224],
    [0.258, 0.039, 0.406],
    [0.416, 0.090, 0.433],
    [0.578, 0.148, 0.404],
    [0.735, 0.216, 0.330],
    [0.865, 0.317, 0.226],
    [0.954, 0.469, 0.098],
    [0.988, 0.645, 0.040],
    [0.964, 0.843, 0.273],
    [0.988, 0.998, 0.645],
];

const TURBO_ENTRIES: usize = 256;

fn from_table(name: &str, table: &[[f32; 3]]) -> Colormap {
    Colormap::new(name, table.iter().map(|&c| Vec3::from_array(c)).collect())
}

/// Polynomial approximation of Google's turbo map
fn turbo(t: f32) -> Vec3 {
    let r = 0.13572138
        + t * (4.61539260 + t * (-42.66032258 + t * (132.13108234 + t * (-152.94239396 + t * 59.28637943))));
    let g = 0.09140261
        + t * (2.19418839 + t * (4.84296658 + t * (-14.18503333 + t * (4.27729857 + t * 2.82956604))));
    let b = 0.10667330
        + t * (12.64194608 + t * (-60.58204836 + t * (110.36276771 + t * (-89.90310912 + t * 27.34824973))));
    Vec3::new(r, g, b).clamp(Vec3::ZERO, Vec3::ONE)
}

/// HSV with full saturation and value
fn hue_to_rgb(h: f32) -> Vec3 {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let (q, t) = (1.0 - f, f);
    match sector as u32 {
        0 => Vec3::new(1.0, t, 0.0),
        1 => Vec3::new(q, 1.0, 0.0),
        2 => Vec3::new(0.0, 1.0, t),
        3 => Vec3::new(0.0, q, 1.0),
        4 => Vec3::new(t, 0.0, 1.0),
        _ => Vec3::new(1.0, 0.0, q),
    }
}

pub(super) fn random_hue(entries: usize, seed: u64) -> Colormap {
    let mut rng = StdRng::seed_from_u64(seed);
    let colors = (0..entries)
        .map(|i| {
            if i == 0 {
                Vec3::ZERO
            } else {
                hue_to_rgb(rng.r#gen::<f32>())
            }
        })
        .collect();
    Colormap::new("random_hue", colors).with_interpolation(Interpolation::Nearest)
}

pub(super) fn colormap(id: &ColormapId) -> Colormap {
    match id {
        ColormapId::Gray => Colormap::new("gray", vec![Vec3::ZERO, Vec3::ONE]),
        ColormapId::Viridis => from_table("viridis", &VIRIDIS),
        ColormapId::Plasma => from_table("plasma", &PLASMA),
        ColormapId::Inferno => from_table("inferno", &INFERNO),
        ColormapId::Turbo => {
            let denom = (TURBO_ENTRIES - 1) as f32;
            let colors = (0..TURBO_ENTRIES).map(|i| turbo(i as f32 / denom)).collect();
            Colormap::new("turbo", colors)
        }
        ColormapId::RandomHue => random_hue(DEFAULT_RANDOM_HUE_ENTRIES, DEFAULT_RANDOM_HUE_SEED),
        ColormapId::Custom(name) => {
            tracing::warn!("'{}' is not a builtin colormap, using gray", name);
            colormap(&ColormapId::Gray)
        }
    }
}
