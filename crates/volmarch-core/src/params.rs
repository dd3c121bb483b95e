//! Render parameter snapshots
//!
//! [`RenderParams`] is the record a host UI edits: contrast limits, render
//! mode, iso threshold, colormap and opacity. It is an immutable value; every `with_*`
//! call returns a new snapshot, and all values are clamped on the way in so
//! the marcher never sees anything outside `[0, 1]`.

use crate::colormap::ColormapId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How samples along a ray become a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Maximum-intensity projection
    Mip,
    /// First crossing of the iso threshold, lit
    #[default]
    Iso,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderMode::Mip => "mip",
            RenderMode::Iso => "iso",
        })
    }
}

impl FromStr for RenderMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mip" => Ok(RenderMode::Mip),
            "iso" => Ok(RenderMode::Iso),
            other => Err(crate::Error::InvalidParameter(format!(
                "render mode '{}' (expected 'mip' or 'iso')",
                other
            ))),
        }
    }
}

const DEFAULT_CLIM: [f32; 2] = [0.0, 1.0];
const DEFAULT_THRESHOLD: f32 = 0.5;
const DEFAULT_OPACITY: f32 = 1.0;

/// Immutable snapshot of the user-editable render parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "UncheckedParams")]
pub struct RenderParams {
    clim: [f32; 2],
    mode: RenderMode,
    iso_threshold: f32,
    colormap: ColormapId,
    opacity: f32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            clim: DEFAULT_CLIM,
            mode: RenderMode::Iso,
            iso_threshold: DEFAULT_THRESHOLD,
            colormap: ColormapId::Viridis,
            opacity: DEFAULT_OPACITY,
        }
    }
}

impl RenderParams {
    /// Build a snapshot, clamping every value into its domain
    pub fn new(clim: [f32; 2], mode: RenderMode, iso_threshold: f32, colormap: ColormapId) -> Self {
        Self::default()
            .with_clim(clim[0], clim[1])
            .with_mode(mode)
            .with_iso_threshold(iso_threshold)
            .with_colormap(colormap)
    }

    /// Contrast limits; clamped to `[0, 1]` and ordered
    pub fn with_clim(mut self, low: f32, high: f32) -> Self {
        let low = unit(low, DEFAULT_CLIM[0], "clim low");
        let high = unit(high, DEFAULT_CLIM[1], "clim high");
        self.clim = if low <= high { [low, high] } else { [high, low] };
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Iso threshold; clamped to `[0, 1]`
    pub fn with_iso_threshold(mut self, threshold: f32) -> Self {
        self.iso_threshold = unit(threshold, DEFAULT_THRESHOLD, "iso threshold");
        self
    }

    pub fn with_colormap(mut self, colormap: ColormapId) -> Self {
        self.colormap = colormap;
        self
    }

    /// Coverage of the volume's pixels over whatever lies behind; clamped to `[0, 1]`
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = unit(opacity, DEFAULT_OPACITY, "opacity");
        self
    }

    /// Lower and upper contrast limit
    pub fn clim(&self) -> (f32, f32) {
        (self.clim[0], self.clim[1])
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn iso_threshold(&self) -> f32 {
        self.iso_threshold
    }

    pub fn colormap(&self) -> &ColormapId {
        &self.colormap
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Map a raw sample onto `[0, 1]` through the contrast limits.
    ///
    /// With equal limits this is a step at `low`.
    pub fn normalize(&self, value: f32) -> f32 {
        let [low, high] = self.clim;
        let span = high - low;
        if span <= 0.0 {
            return if value >= low { 1.0 } else { 0.0 };
        }
        let t = (value - low) / span;
        if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
    }
}

fn unit(value: f32, fallback: f32, what: &str) -> f32 {
    if !value.is_finite() {
        tracing::warn!("{} is not finite, using {}", what, fallback);
        return fallback;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        tracing::warn!("{} {} clamped to {}", what, value, clamped);
    }
    clamped
}

/// Wire form; goes through the clamping constructors
#[derive(Deserialize)]
#[serde(default)]
struct UncheckedParams {
    clim: [f32; 2],
    mode: RenderMode,
    iso_threshold: f32,
    colormap: ColormapId,
    opacity: f32,
}

impl Default for UncheckedParams {
    fn default() -> Self {
        let d = RenderParams::default();
        Self {
            clim: d.clim,
            mode: d.mode,
            iso_threshold: d.iso_threshold,
            colormap: d.colormap,
            opacity: d.opacity,
        }
    }
}

impl From<UncheckedParams> for RenderParams {
    fn from(p: UncheckedParams) -> Self {
        RenderParams::new(p.clim, p.mode, p.iso_threshold, p.colormap).with_opacity(p.opacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn out_of_range_values_are_clamped() {
        let p = RenderParams::default()
            .with_iso_threshold(1.7)
            .with_clim(-0.5, 2.0);
        assert_eq!(p.iso_threshold(), 1.0);
        assert_eq!(p.clim(), (0.0, 1.0));

        let p = p.with_iso_threshold(f32::NAN);
        assert_eq!(p.iso_threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn opacity_is_clamped() {
        assert_eq!(RenderParams::default().opacity(), 1.0);
        assert_eq!(RenderParams::default().with_opacity(0.4).opacity(), 0.4);
        assert_eq!(RenderParams::default().with_opacity(-1.0).opacity(), 0.0);
        assert_eq!(RenderParams::default().with_opacity(f32::NAN).opacity(), 1.0);

        let p: RenderParams = serde_json::from_str(r#"{ "opacity": 7.0 }"#).unwrap();
        assert_eq!(p.opacity(), 1.0);
    }

    #[test]
    fn reversed_limits_are_swapped() {
        let p = RenderParams::default().with_clim(0.8, 0.2);
        assert_eq!(p.clim(), (0.2, 0.8));
    }

    #[test]
    fn normalize_remaps_and_clamps() {
        let p = RenderParams::default().with_clim(0.2, 0.6);
        assert_relative_eq!(p.normalize(0.4), 0.5);
        assert_eq!(p.normalize(0.0), 0.0);
        assert_eq!(p.normalize(0.9), 1.0);
    }

    #[test]
    fn equal_limits_are_a_step() {
        let p = RenderParams::default().with_clim(0.3, 0.3);
        assert_eq!(p.normalize(0.29), 0.0);
        assert_eq!(p.normalize(0.3), 1.0);
    }

    #[test]
    fn snapshots_are_independent() {
        let a = RenderParams::default();
        let b = a.clone().with_mode(RenderMode::Mip);
        assert_eq!(a.mode(), RenderMode::Iso);
        assert_eq!(b.mode(), RenderMode::Mip);
    }

    #[test]
    fn json_goes_through_clamping() {
        let p: RenderParams = serde_json::from_str(
            r#"{ "clim": [0.9, 0.1], "mode": "mip", "iso_threshold": 3.0, "colormap": "turbo" }"#,
        )
        .unwrap();
        assert_eq!(p.clim(), (0.1, 0.9));
        assert_eq!(p.mode(), RenderMode::Mip);
        assert_eq!(p.iso_threshold(), 1.0);
        assert_eq!(p.colormap(), &ColormapId::Turbo);

        let partial: RenderParams = serde_json::from_str(r#"{ "iso_threshold": 0.24 }"#).unwrap();
        assert_eq!(partial, RenderParams::default().with_iso_threshold(0.24));

        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""colormap":"turbo""#));
        assert!(json.contains(r#""mode":"mip""#));
    }

    #[test]
    fn parses_modes() {
        assert_eq!("MIP".parse::<RenderMode>().unwrap(), RenderMode::Mip);
        assert!("dvr".parse::<RenderMode>().is_err());
    }
}
