//! Per-ray volume marching
//!
//! A [`Marcher`] binds one volume instance (its voxels, inverse model matrix,
//! parameter snapshot and resolved colormap) and turns world-space rays into
//! [`RayOutcome`]s. Tracing only decides geometry; [`Marcher::shade`] applies
//! the colormap and lighting afterwards, so swapping colormaps can never move
//! a hit.
//!
//! All marching happens in local voxel space, where voxel centers sit at
//! integer coordinates and the volume box spans `[-0.5, n - 0.5]` per axis.
//! The local ray direction is not renormalized, so ray parameters stay in
//! world units and depths from different instances are comparable.

use crate::lighting::{Lighting, MIN_STEP_SIZE, RenderSettings};
use glam::{Mat4, Vec3, Vec4};
use volmarch_core::colormap::Colormap;
use volmarch_core::params::{RenderMode, RenderParams};
use volmarch_core::volume::Volume;

/// Upper bound on samples per ray.
///
/// Segments longer than `MAX_STEPS` times the step size are sampled more
/// coarsely than requested; the samples stay evenly spread over the segment.
pub const MAX_STEPS: u32 = 4096;
/// Refinement samples for MIP, bisection iterations for iso-surfaces
pub const REFINE_STEPS: u32 = 10;
/// Central-difference offset for surface normals, in voxels
pub const GRADIENT_DELTA: f32 = 1.0;

const MIN_DIRECTION: f32 = 1e-12;
const MIN_SEGMENT: f32 = 1e-6;
const MIN_GRADIENT: f32 = 1e-6;

/// A ray with a unit direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray; the direction is normalized (`-Z` if degenerate)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Z),
        }
    }

    /// Point at parameter `t`
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// What a ray found in one volume instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayOutcome {
    /// The ray never entered the box
    Miss,
    /// Maximum intensity along the ray
    Projection { value: f32, depth: f32 },
    /// First iso-surface crossing; `position` and `normal` are in voxel space
    Surface {
        position: Vec3,
        normal: Vec3,
        value: f32,
        depth: f32,
    },
    /// Entered the box but never reached the threshold
    NoSurface { depth: f32 },
}

impl RayOutcome {
    /// World-space distance of a contributing outcome
    pub fn depth(&self) -> Option<f32> {
        match *self {
            Self::Projection { depth, .. } | Self::Surface { depth, .. } => Some(depth),
            Self::Miss | Self::NoSurface { .. } => None,
        }
    }
}

/// Slab intersection of a ray with an axis-aligned box.
///
/// Returns `(t_enter, t_exit)` with `t_enter` clamped to zero, so an origin
/// inside the box enters immediately. `direction` need not be normalized.
pub fn intersect_box(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let mut t_near = f32::NEG_INFINITY;
    let mut t_far = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < MIN_DIRECTION {
            // Parallel to this slab: inside it or never
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (min[axis] - o) * inv;
        let mut t1 = (max[axis] - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_near = t_near.max(t0);
        t_far = t_far.min(t1);
    }

    let t_near = t_near.max(0.0);
    if !t_far.is_finite() || t_far <= t_near {
        return None;
    }
    Some((t_near, t_far))
}

/// The sampled part of a ray inside the box
struct Segment {
    entry: Vec3,
    step: Vec3,
    steps: u32,
    depth: f32,
    dir_len: f32,
}

impl Segment {
    /// Point at fractional sample index `s`
    fn point(&self, s: f32) -> Vec3 {
        self.entry + self.step * s
    }

    /// World-space distance of a point on the segment
    fn depth_at(&self, p: Vec3) -> f32 {
        self.depth + (p - self.entry).length() / self.dir_len
    }
}

/// Ray marcher for a single volume instance
pub struct Marcher<'a> {
    volume: &'a Volume,
    inv_model: Mat4,
    params: &'a RenderParams,
    colormap: &'a Colormap,
}

impl<'a> Marcher<'a> {
    /// `inv_model` maps world space to the volume's voxel space
    pub fn new(
        volume: &'a Volume,
        inv_model: Mat4,
        params: &'a RenderParams,
        colormap: &'a Colormap,
    ) -> Self {
        Self {
            volume,
            inv_model,
            params,
            colormap,
        }
    }

    /// March a world-space ray through the volume
    pub fn trace(&self, ray: &Ray, step_size: f32) -> RayOutcome {
        let origin = self.inv_model.transform_point3(ray.origin);
        let dir = self.inv_model.transform_vector3(ray.direction);
        let dir_len = dir.length();
        if !dir.is_finite() || !origin.is_finite() || dir_len < MIN_DIRECTION {
            return RayOutcome::Miss;
        }

        let bounds = self.volume.bounds();
        let Some((t_enter, t_exit)) = intersect_box(origin, dir, bounds.min, bounds.max) else {
            return RayOutcome::Miss;
        };

        let entry = origin + dir * t_enter;
        let segment = dir * (t_exit - t_enter);
        let length = segment.length();
        if length < MIN_SEGMENT {
            return RayOutcome::Miss;
        }

        let steps = sample_steps(length, step_size);
        let segment = Segment {
            entry,
            step: segment / steps as f32,
            steps,
            depth: t_enter,
            dir_len,
        };

        match self.params.mode() {
            RenderMode::Mip => self.march_mip(&segment),
            RenderMode::Iso => self.march_iso(&segment, -dir / dir_len),
        }
    }

    fn march_mip(&self, segment: &Segment) -> RayOutcome {
        let mut best = f32::NEG_INFINITY;
        let mut best_i = 0;
        for i in 0..=segment.steps {
            let value = self.volume.sample(segment.point(i as f32));
            if value > best {
                best = value;
                best_i = i;
            }
        }

        // One step around the best sample, kept inside the segment
        let lo = (best_i as f32 - 0.5).max(0.0);
        let hi = (best_i as f32 + 0.5).min(segment.steps as f32);
        for k in 0..=REFINE_STEPS {
            let s = lo + (hi - lo) * (k as f32 / REFINE_STEPS as f32);
            best = best.max(self.volume.sample(segment.point(s)));
        }

        RayOutcome::Projection {
            value: best,
            depth: segment.depth,
        }
    }

    fn march_iso(&self, segment: &Segment, view: Vec3) -> RayOutcome {
        let threshold = self.params.iso_threshold();

        for i in 0..=segment.steps {
            let value = self.volume.sample(segment.point(i as f32));
            if value < threshold {
                continue;
            }
            if i == 0 {
                return self.surface(segment, segment.entry, value, view);
            }

            // Bisect between the last sample below and this one
            let mut lo = (i - 1) as f32;
            let mut hi = i as f32;
            let mut hit_value = value;
            for _ in 0..REFINE_STEPS {
                let mid = 0.5 * (lo + hi);
                let v = self.volume.sample(segment.point(mid));
                if v >= threshold {
                    hi = mid;
                    hit_value = v;
                } else {
                    lo = mid;
                }
            }
            return self.surface(segment, segment.point(hi), hit_value, view);
        }

        RayOutcome::NoSurface {
            depth: segment.depth,
        }
    }

    fn surface(&self, segment: &Segment, position: Vec3, value: f32, view: Vec3) -> RayOutcome {
        let gradient = self.volume.gradient(position, GRADIENT_DELTA);
        let normal = if gradient.length() < MIN_GRADIENT {
            view
        } else {
            -gradient.normalize()
        };
        let normal = if normal.dot(view) < 0.0 { -normal } else { normal };

        RayOutcome::Surface {
            position,
            normal,
            value,
            depth: segment.depth_at(position),
        }
    }

    /// Color of a contributing outcome, `None` for background
    pub fn shade(&self, outcome: &RayOutcome, ray: &Ray, lighting: &Lighting) -> Option<Vec4> {
        match *outcome {
            RayOutcome::Miss | RayOutcome::NoSurface { .. } => None,
            RayOutcome::Projection { value, .. } => {
                let color = self.colormap.sample(self.params.normalize(value));
                Some(color.extend(self.params.opacity()))
            }
            RayOutcome::Surface { normal, value, .. } => {
                let view = (-self.inv_model.transform_vector3(ray.direction))
                    .try_normalize()
                    .unwrap_or(normal);
                let light = lighting.local_direction(&self.inv_model).unwrap_or(view);
                let base = self.colormap.sample(self.params.normalize(value));
                Some(lighting.shade(base, normal, view, light).extend(self.params.opacity()))
            }
        }
    }

    /// Trace and shade; returns the depth and color of a contribution.
    ///
    /// The color's alpha is the instance opacity, not premultiplied.
    pub fn evaluate(&self, ray: &Ray, settings: &RenderSettings) -> Option<(f32, Vec4)> {
        let outcome = self.trace(ray, settings.step_size());
        let depth = outcome.depth()?;
        let color = self.shade(&outcome, ray, &settings.lighting)?;
        Some((depth, color))
    }
}

/// Number of intervals a segment of `length` voxels is split into
fn sample_steps(length: f32, step_size: f32) -> u32 {
    let step_size = step_size.max(MIN_STEP_SIZE);
    ((length / step_size).ceil() as u32).clamp(1, MAX_STEPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::UVec3;
    use volmarch_core::colormap::ColormapId;

    /// 8x4x4 volume whose value rises linearly from 0 at x=0 to 1 at x=7
    fn ramp() -> Volume {
        let dims = UVec3::new(8, 4, 4);
        let data = (0..dims.x * dims.y * dims.z)
            .map(|i| (i % dims.x) as f32 / 7.0)
            .collect();
        Volume::new(dims, data).unwrap()
    }

    fn gray() -> Colormap {
        Colormap::new("gray", vec![Vec3::ZERO, Vec3::ONE])
    }

    fn x_ray() -> Ray {
        Ray::new(Vec3::new(-5.0, 1.5, 1.5), Vec3::X)
    }

    #[test]
    fn long_segments_are_capped_at_max_steps() {
        assert_eq!(sample_steps(10.0, 0.5), 20);
        assert_eq!(sample_steps(0.1, 0.5), 1);
        assert_eq!(sample_steps(10_000.0, 0.5), MAX_STEPS);
        // The cap stretches the effective spacing past the requested step
        assert!(10_000.0 / sample_steps(10_000.0, 0.5) as f32 > 0.5);
    }

    #[test]
    fn box_hit_from_outside() {
        let (t0, t1) =
            intersect_box(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, Vec3::splat(-1.0), Vec3::ONE).unwrap();
        assert_relative_eq!(t0, 4.0);
        assert_relative_eq!(t1, 6.0);
    }

    #[test]
    fn box_entry_clamps_inside_origin() {
        let (t0, t1) = intersect_box(Vec3::ZERO, Vec3::Y, Vec3::splat(-1.0), Vec3::ONE).unwrap();
        assert_eq!(t0, 0.0);
        assert_relative_eq!(t1, 1.0);
    }

    #[test]
    fn parallel_ray_outside_slab_misses() {
        let hit = intersect_box(Vec3::new(-5.0, 2.0, 0.0), Vec3::X, Vec3::splat(-1.0), Vec3::ONE);
        assert!(hit.is_none());
    }

    #[test]
    fn box_behind_ray_misses() {
        let hit = intersect_box(Vec3::new(5.0, 0.0, 0.0), Vec3::X, Vec3::splat(-1.0), Vec3::ONE);
        assert!(hit.is_none());
    }

    #[test]
    fn mip_finds_ramp_maximum() {
        let volume = ramp();
        let params = RenderParams::default().with_mode(RenderMode::Mip);
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let RayOutcome::Projection { value, depth } = marcher.trace(&x_ray(), 0.5) else {
            panic!("expected a projection");
        };
        assert_relative_eq!(value, 1.0);
        assert_relative_eq!(depth, 4.5);
    }

    #[test]
    fn iso_bisection_lands_on_crossing() {
        let volume = ramp();
        let params = RenderParams::default().with_iso_threshold(0.5);
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let RayOutcome::Surface {
            position,
            normal,
            value,
            depth,
        } = marcher.trace(&x_ray(), 1.0)
        else {
            panic!("expected a surface");
        };
        assert_relative_eq!(position.x, 3.5, epsilon = 1e-2);
        assert_relative_eq!(depth, 8.5, epsilon = 1e-2);
        assert!(value >= 0.5);
        assert_relative_eq!(normal.x, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn threshold_below_everything_hits_entry() {
        let volume = ramp();
        let params = RenderParams::default().with_iso_threshold(0.0);
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let outcome = marcher.trace(&x_ray(), 0.5);
        let RayOutcome::Surface { position, depth, .. } = outcome else {
            panic!("expected a surface");
        };
        assert_relative_eq!(position.x, -0.5);
        assert_relative_eq!(depth, 4.5);
    }

    #[test]
    fn threshold_above_everything_is_no_surface() {
        let volume = Volume::filled(UVec3::splat(4), 0.25).unwrap();
        let params = RenderParams::default().with_iso_threshold(0.9);
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let ray = Ray::new(Vec3::new(1.5, 1.5, -10.0), Vec3::Z);
        let outcome = marcher.trace(&ray, 0.5);
        assert!(matches!(outcome, RayOutcome::NoSurface { .. }));
        assert!(marcher.evaluate(&ray, &RenderSettings::default()).is_none());
    }

    #[test]
    fn scaled_instance_reports_world_depth() {
        let volume = ramp();
        let params = RenderParams::default().with_mode(RenderMode::Mip);
        let colormap = gray();
        // World is twice the voxel size
        let inv_model = Mat4::from_scale(Vec3::splat(2.0)).inverse();
        let marcher = Marcher::new(&volume, inv_model, &params, &colormap);

        let ray = Ray::new(Vec3::new(-10.0, 3.0, 3.0), Vec3::X);
        let depth = marcher.trace(&ray, 0.5).depth().unwrap();
        assert_relative_eq!(depth, 9.0, epsilon = 1e-4);
    }

    #[test]
    fn grazing_edge_ray_is_finite() {
        let volume = ramp();
        let params = RenderParams::default();
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let ray = Ray::new(Vec3::new(-5.0, -0.5, -0.5), Vec3::X);
        if let Some((depth, color)) = marcher.evaluate(&ray, &RenderSettings::default()) {
            assert!(depth.is_finite());
            assert!(color.is_finite());
        }
    }

    #[test]
    fn singular_inverse_is_a_miss() {
        let volume = ramp();
        let params = RenderParams::default();
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::ZERO, &params, &colormap);
        assert_eq!(marcher.trace(&x_ray(), 0.5), RayOutcome::Miss);
    }

    #[test]
    fn shading_uses_params_colormap_lookup() {
        let volume = Volume::filled(UVec3::splat(4), 0.5).unwrap();
        let params = RenderParams::default()
            .with_mode(RenderMode::Mip)
            .with_colormap(ColormapId::Gray);
        let colormap = gray();
        let marcher = Marcher::new(&volume, Mat4::IDENTITY, &params, &colormap);

        let ray = Ray::new(Vec3::new(1.5, 1.5, -10.0), Vec3::Z);
        let (_, color) = marcher.evaluate(&ray, &RenderSettings::default()).unwrap();
        assert_relative_eq!(color.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(color.w, 1.0);
    }
}
