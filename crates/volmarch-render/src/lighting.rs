//! Shading and sampling settings for iso-surface rendering
//!
//! These are renderer settings, not user parameters: they stay fixed while a
//! [`RenderParams`](volmarch_core::params::RenderParams) snapshot changes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Default distance between samples, in voxels
pub const DEFAULT_STEP_SIZE: f32 = 0.5;
/// Finest allowed sample spacing, in voxels
pub const MIN_STEP_SIZE: f32 = 0.05;
/// Coarsest allowed sample spacing, in voxels
pub const MAX_STEP_SIZE: f32 = 1.0;

/// Where the iso-surface light comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    /// Light travels along the view ray
    Headlight,
    /// Fixed world-space direction pointing towards the light
    Directional(Vec3),
}

/// Blinn-Phong terms for iso-surface shading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
    pub light: Light,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.2,
            diffuse: 0.8,
            specular: 0.3,
            shininess: 40.0,
            light: Light::Headlight,
        }
    }
}

impl Lighting {
    /// Light direction in a volume's local space, `None` for a headlight
    pub fn local_direction(&self, inv_model: &Mat4) -> Option<Vec3> {
        match self.light {
            Light::Headlight => None,
            Light::Directional(dir) => inv_model.transform_vector3(dir).try_normalize(),
        }
    }

    /// Blinn-Phong shading of `base` with unit `normal`, `view` and `light` vectors
    pub fn shade(&self, base: Vec3, normal: Vec3, view: Vec3, light: Vec3) -> Vec3 {
        let lambert = normal.dot(light).max(0.0);
        let half = (light + view).try_normalize().unwrap_or(Vec3::ZERO);
        let spec = normal.dot(half).max(0.0).powf(self.shininess);
        (base * (self.ambient + self.diffuse * lambert) + Vec3::splat(self.specular * spec))
            .clamp(Vec3::ZERO, Vec3::ONE)
    }
}

/// Everything a frame needs besides the scene, camera and colormaps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub lighting: Lighting,
    /// Color of pixels no volume contributes to (RGBA, 0-1)
    pub background: Vec4,
    step_size: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            lighting: Lighting::default(),
            background: Vec4::ZERO,
            step_size: DEFAULT_STEP_SIZE,
        }
    }
}

impl RenderSettings {
    /// Sample spacing in voxels, clamped to `[MIN_STEP_SIZE, MAX_STEP_SIZE]`.
    ///
    /// Smaller steps catch thinner features and alias less but cost
    /// proportionally more samples per ray.
    pub fn with_step_size(mut self, step_size: f32) -> Self {
        if !step_size.is_finite() {
            tracing::warn!("Step size {} is not finite, using {}", step_size, DEFAULT_STEP_SIZE);
            self.step_size = DEFAULT_STEP_SIZE;
            return self;
        }
        self.step_size = step_size.clamp(MIN_STEP_SIZE, MAX_STEP_SIZE);
        if (self.step_size - step_size).abs() > f32::EPSILON {
            tracing::warn!("Step size {} clamped to {}", step_size, self.step_size);
        }
        self
    }

    pub fn with_lighting(mut self, lighting: Lighting) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_background(mut self, background: Vec4) -> Self {
        self.background = background;
        self
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }
}

/// GPU-ready lighting terms
/// This struct must match the WGSL struct layout exactly
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniforms {
    /// Local-space direction towards the light (ignored for headlights)
    pub light_dir: [f32; 3],
    /// 1.0 when the light follows the view ray
    pub headlight: f32,
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
    pub background: [f32; 4],
}

impl LightingUniforms {
    /// Pack settings, with the light direction already in volume-local space
    pub fn new(settings: &RenderSettings, local_light_dir: Option<Vec3>) -> Self {
        let l = &settings.lighting;
        let (light_dir, headlight) = match local_light_dir {
            Some(dir) => (dir.to_array(), 0.0),
            None => ([0.0, 0.0, 0.0], 1.0),
        };
        Self {
            light_dir,
            headlight,
            ambient: l.ambient,
            diffuse: l.diffuse,
            specular: l.specular,
            shininess: l.shininess,
            background: settings.background.to_array(),
        }
    }
}
