//! Primitive scalar fields

use super::ScalarField;
use glam::{Vec2, Vec3};

/// Smooth 1 -> 0 ramp as `d` goes from `edge` to `edge + width`
fn falloff(d: f32, edge: f32, width: f32) -> f32 {
    if width <= 0.0 {
        return if d <= edge { 1.0 } else { 0.0 };
    }
    let t = ((d - edge) / width).clamp(0.0, 1.0);
    1.0 - t * t * (3.0 - 2.0 * t)
}

/// Same value everywhere
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    pub value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl ScalarField for Constant {
    fn value(&self, _uvw: Vec3) -> f32 {
        self.value
    }
}

/// Soft ball: 1 inside `radius`, fading to 0 over `falloff`
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub falloff: f32,
    pub intensity: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, falloff: f32) -> Self {
        Self {
            center,
            radius,
            falloff,
            intensity: 1.0,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }
}

impl ScalarField for Sphere {
    fn value(&self, uvw: Vec3) -> f32 {
        self.intensity * falloff(uvw.distance(self.center), self.radius, self.falloff)
    }
}

/// Linear ramp along one axis; the value equals the coordinate
#[derive(Debug, Clone, Copy)]
pub struct Gradient {
    pub axis: Vec3,
}

impl Gradient {
    pub fn new(axis: Vec3) -> Self {
        Self { axis }
    }

    pub fn x() -> Self {
        Self::new(Vec3::X)
    }

    pub fn z() -> Self {
        Self::new(Vec3::Z)
    }
}

impl ScalarField for Gradient {
    fn value(&self, uvw: Vec3) -> f32 {
        uvw.dot(self.axis)
    }
}

/// Soft ring in the XZ plane around the volume center
#[derive(Debug, Clone, Copy)]
pub struct Torus {
    pub major_radius: f32,
    pub minor_radius: f32,
    pub falloff: f32,
}

impl Torus {
    pub fn new(major_radius: f32, minor_radius: f32, falloff: f32) -> Self {
        Self {
            major_radius,
            minor_radius,
            falloff,
        }
    }
}

impl ScalarField for Torus {
    fn value(&self, uvw: Vec3) -> f32 {
        let p = uvw - Vec3::splat(0.5);
        let q = Vec2::new(Vec2::new(p.x, p.z).length() - self.major_radius, p.y);
        falloff(q.length(), self.minor_radius, self.falloff)
    }
}

/// Sum of soft spheres, clamped to `[0, 1]`
#[derive(Debug, Clone, Default)]
pub struct Blobs {
    pub spheres: Vec<Sphere>,
}

impl Blobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sphere: Sphere) -> Self {
        self.spheres.push(sphere);
        self
    }

    /// A lumpy, organ-like demo shape with a denser core
    pub fn organ() -> Self {
        Self::new()
            .with(Sphere::new(Vec3::new(0.5, 0.5, 0.5), 0.22, 0.12).with_intensity(0.45))
            .with(Sphere::new(Vec3::new(0.36, 0.58, 0.46), 0.14, 0.08).with_intensity(0.35))
            .with(Sphere::new(Vec3::new(0.64, 0.42, 0.55), 0.12, 0.08).with_intensity(0.35))
            .with(Sphere::new(Vec3::new(0.5, 0.5, 0.5), 0.06, 0.04).with_intensity(0.4))
    }
}

impl ScalarField for Blobs {
    fn value(&self, uvw: Vec3) -> f32 {
        self.spheres
            .iter()
            .map(|s| s.value(uvw))
            .sum::<f32>()
            .clamp(0.0, 1.0)
    }
}
