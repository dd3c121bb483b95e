//! Camera and primary ray generation

use crate::raymarch::Ray;
use glam::Vec3;

const MIN_DISTANCE: f32 = 1e-3;

/// How pixels map to rays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Rays fan out from the camera position; vertical field of view in radians
    Perspective { fov: f32 },
    /// Parallel rays through a window `height` world units tall
    Orthographic { height: f32 },
}

/// An orbital camera that looks at a target point
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Point the camera is looking at
    pub target: Vec3,
    /// Up vector (usually Y-up)
    pub up: Vec3,
    /// Perspective or orthographic projection
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(2.0, 1.5, 2.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov: 45.0_f32.to_radians(),
            },
        }
    }
}

impl Camera {
    /// Create a camera looking at a target from a position
    pub fn look_at(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Get the forward direction (normalized, `-Z` if position == target)
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }

    /// Get the right direction (normalized)
    pub fn right(&self) -> Vec3 {
        let forward = self.forward();
        forward
            .cross(self.up)
            .try_normalize()
            .unwrap_or_else(|| forward.any_orthonormal_vector())
    }

    /// Get the actual up direction (may differ from self.up due to camera orientation)
    pub fn actual_up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Get distance from camera to target
    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    /// Primary ray through the center of pixel `(x, y)`; row 0 is the top
    pub fn ray_for_pixel(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        let ndc_x = (x as f32 + 0.5) / w * 2.0 - 1.0;
        let ndc_y = 1.0 - (y as f32 + 0.5) / h * 2.0;
        let aspect = w / h;

        let forward = self.forward();
        let right = self.right();
        let up = self.actual_up();

        match self.projection {
            Projection::Perspective { fov } => {
                let tan = (fov * 0.5).tan();
                let dir = forward + right * (ndc_x * tan * aspect) + up * (ndc_y * tan);
                Ray::new(self.position, dir)
            }
            Projection::Orthographic { height } => {
                let half = height * 0.5;
                let origin = self.position + right * (ndc_x * half * aspect) + up * (ndc_y * half);
                Ray::new(origin, forward)
            }
        }
    }

    /// Orbit around the target point
    ///
    /// - `delta_x`: Horizontal rotation (positive = rotate right)
    /// - `delta_y`: Vertical rotation (positive = rotate up, drag down to see top)
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = self.distance();
        if radius < MIN_DISTANCE {
            return;
        }

        // Get spherical coordinates
        let offset = self.position - self.target;
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-0.999, 0.999).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Zoom in/out
    ///
    /// Perspective cameras move towards the target; orthographic cameras
    /// shrink their window. Positive = zoom in.
    pub fn zoom(&mut self, delta: f32) {
        match &mut self.projection {
            Projection::Orthographic { height } => {
                *height = (*height - delta).max(MIN_DISTANCE);
            }
            Projection::Perspective { .. } => {
                let dir = (self.position - self.target)
                    .try_normalize()
                    .unwrap_or(Vec3::Z);
                let distance = (self.distance() - delta).max(MIN_DISTANCE);
                self.position = self.target + dir * distance;
            }
        }
    }

    /// Frame a bounding box (adjust camera to see the entire object)
    pub fn frame_bounds(&mut self, min: Vec3, max: Vec3, padding: f32) {
        let center = (min + max) * 0.5;
        let size = (max - min).max_element();
        let extent = size * (1.0 + padding);

        let distance = match &mut self.projection {
            Projection::Perspective { fov } => (extent * 0.5) / (*fov * 0.5).tan() + size * 0.5,
            Projection::Orthographic { height } => {
                *height = extent;
                extent * 2.0
            }
        };

        self.target = center;
        self.position = center + Vec3::new(0.7, 0.5, 0.7).normalize() * distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_orbit() {
        let mut camera = Camera::default();
        let initial_distance = camera.distance();

        camera.orbit(0.1, 0.0);

        // Distance should remain the same
        assert!((camera.distance() - initial_distance).abs() < 0.001);
    }

    #[test]
    fn test_camera_zoom() {
        let mut camera = Camera::default();
        let initial_distance = camera.distance();

        camera.zoom(0.5);
        assert!(camera.distance() < initial_distance);

        camera.zoom(1000.0);
        assert!(camera.distance() > 0.0);
    }

    #[test]
    fn orthographic_zoom_shrinks_window() {
        let mut camera = Camera::default().with_projection(Projection::Orthographic { height: 10.0 });
        camera.zoom(4.0);
        assert_eq!(camera.projection, Projection::Orthographic { height: 6.0 });
    }

    #[test]
    fn center_pixel_looks_forward() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let ray = camera.ray_for_pixel(1, 1, 3, 3);
        assert_relative_eq!(ray.direction.z, -1.0);
        assert_relative_eq!(ray.origin.z, 5.0);
    }

    #[test]
    fn top_row_points_up() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        let ray = camera.ray_for_pixel(0, 0, 4, 4);
        assert!(ray.direction.y > 0.0);
        assert!(ray.direction.x < 0.0);
    }

    #[test]
    fn orthographic_rays_are_parallel() {
        let camera = Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO)
            .with_projection(Projection::Orthographic { height: 2.0 });
        let a = camera.ray_for_pixel(0, 0, 2, 2);
        let b = camera.ray_for_pixel(1, 1, 2, 2);
        assert_eq!(a.direction, b.direction);
        assert_relative_eq!(a.origin.y, 0.5);
        assert_relative_eq!(b.origin.x, 0.5);
    }

    #[test]
    fn degenerate_camera_still_yields_unit_rays() {
        let camera = Camera::look_at(Vec3::ONE, Vec3::ONE);
        let ray = camera.ray_for_pixel(3, 2, 8, 8);
        assert!(ray.direction.is_finite());
        assert_relative_eq!(ray.direction.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn framing_targets_the_box_center() {
        let mut camera = Camera::default();
        camera.frame_bounds(Vec3::ZERO, Vec3::splat(2.0), 0.1);
        assert_eq!(camera.target, Vec3::ONE);
        assert!(camera.distance() > 1.0);
    }
}
