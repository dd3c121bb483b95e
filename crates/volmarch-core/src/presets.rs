//! Per-organ defaults for the scan gallery
//!
//! Thresholds were tuned by eye on the 256^3 organ scans; rotations turn each
//! scan upright when it is placed in front of the viewer.

use crate::colormap::ColormapId;
use crate::params::{RenderMode, RenderParams};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Organ scans with tuned render defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganPreset {
    Eye,
    Heart,
    Tongue,
    Brain,
    Kidney,
}

impl OrganPreset {
    pub const ALL: [OrganPreset; 5] = [
        OrganPreset::Kidney,
        OrganPreset::Heart,
        OrganPreset::Tongue,
        OrganPreset::Brain,
        OrganPreset::Eye,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OrganPreset::Eye => "eye",
            OrganPreset::Heart => "heart",
            OrganPreset::Tongue => "tongue",
            OrganPreset::Brain => "brain",
            OrganPreset::Kidney => "kidney",
        }
    }

    /// Iso threshold that isolates the organ surface
    pub fn iso_threshold(self) -> f32 {
        match self {
            OrganPreset::Eye => 0.20,
            OrganPreset::Heart | OrganPreset::Kidney => 0.40,
            OrganPreset::Tongue => 0.30,
            OrganPreset::Brain => 0.24,
        }
    }

    /// Placement rotation as XYZ Euler angles in degrees
    pub fn rotation_degrees(self) -> Vec3 {
        match self {
            OrganPreset::Eye => Vec3::new(-17.0, -120.0, -85.0),
            OrganPreset::Heart => Vec3::new(0.0, 80.0, 90.0),
            OrganPreset::Tongue => Vec3::new(-22.0, 0.0, 0.0),
            OrganPreset::Brain => Vec3::new(0.0, -90.0, 90.0),
            OrganPreset::Kidney => Vec3::new(108.0, 180.0, 0.0),
        }
    }

    pub fn rotation(self) -> Quat {
        let r = self.rotation_degrees();
        Quat::from_euler(
            EulerRot::XYZ,
            r.x.to_radians(),
            r.y.to_radians(),
            r.z.to_radians(),
        )
    }

    /// Iso rendering at the tuned threshold with the turbo colormap
    pub fn params(self) -> RenderParams {
        RenderParams::default()
            .with_mode(RenderMode::Iso)
            .with_iso_threshold(self.iso_threshold())
            .with_colormap(ColormapId::Turbo)
    }
}

impl fmt::Display for OrganPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrganPreset {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| crate::Error::InvalidParameter(format!("unknown organ preset '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_by_name() {
        for preset in OrganPreset::ALL {
            assert_eq!(preset.name().parse::<OrganPreset>().unwrap(), preset);
        }
        assert!("spleen".parse::<OrganPreset>().is_err());
    }

    #[test]
    fn preset_params_use_iso() {
        let p = OrganPreset::Brain.params();
        assert_eq!(p.mode(), RenderMode::Iso);
        assert_eq!(p.iso_threshold(), 0.24);
    }

    #[test]
    fn rotations_are_unit_quaternions() {
        for preset in OrganPreset::ALL {
            assert!(preset.rotation().is_normalized());
        }
    }
}
