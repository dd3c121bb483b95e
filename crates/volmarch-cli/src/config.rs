//! JSON scene files for `render --scene` and `watch`

use anyhow::{Context, Result};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use volmarch_core::io;
use volmarch_core::params::RenderParams;
use volmarch_core::presets::OrganPreset;
use volmarch_core::volume::{Aabb, Volume};
use volmarch_render::{Camera, Light, Lighting, Projection, RenderSettings, Scene, Transform};

/// Where the camera sits relative to the framed scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Orbit around the vertical axis, degrees
    pub azimuth: f32,
    /// Orbit towards the top, degrees
    pub elevation: f32,
    /// Move closer (positive) or further away, world units
    pub zoom: f32,
    pub orthographic: bool,
    /// Vertical field of view, degrees
    pub fov: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.0,
            zoom: 0.0,
            orthographic: false,
            fov: 45.0,
        }
    }
}

impl CameraConfig {
    /// Frame `bounds`, then orbit and zoom
    pub fn build(&self, bounds: Option<Aabb>) -> Camera {
        let projection = if self.orthographic {
            Projection::Orthographic { height: 1.0 }
        } else {
            Projection::Perspective {
                fov: self.fov.clamp(1.0, 170.0).to_radians(),
            }
        };
        let mut camera = Camera::default().with_projection(projection);
        if let Some(bounds) = bounds {
            camera.frame_bounds(bounds.min, bounds.max, 0.1);
        }
        camera.orbit(self.azimuth.to_radians(), self.elevation.to_radians());
        camera.zoom(self.zoom);
        camera
    }
}

/// Shading terms as written in scene files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub shininess: f32,
    /// World direction towards the light; omitted means headlight
    pub direction: Option<[f32; 3]>,
    pub background: [f32; 4],
    pub step_size: Option<f32>,
}

impl Default for LightingConfig {
    fn default() -> Self {
        let lighting = Lighting::default();
        Self {
            ambient: lighting.ambient,
            diffuse: lighting.diffuse,
            specular: lighting.specular,
            shininess: lighting.shininess,
            direction: None,
            background: [0.0; 4],
            step_size: None,
        }
    }
}

impl LightingConfig {
    pub fn settings(&self) -> RenderSettings {
        let lighting = Lighting {
            ambient: self.ambient,
            diffuse: self.diffuse,
            specular: self.specular,
            shininess: self.shininess,
            light: self
                .direction
                .map_or(Light::Headlight, |d| Light::Directional(Vec3::from(d))),
        };
        let settings = RenderSettings::default()
            .with_lighting(lighting)
            .with_background(Vec4::from(self.background));
        match self.step_size {
            Some(step) => settings.with_step_size(step),
            None => settings,
        }
    }
}

/// One volume in a scene file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEntry {
    /// NRRD file, relative to the scene file
    pub path: PathBuf,
    /// Organ defaults for params and rotation
    #[serde(default)]
    pub preset: Option<OrganPreset>,
    /// Overrides the preset's parameters
    #[serde(default)]
    pub params: Option<RenderParams>,
    #[serde(default)]
    pub position: Option<[f32; 3]>,
    /// XYZ Euler angles; overrides the preset's rotation
    #[serde(default)]
    pub rotation_deg: Option<[f32; 3]>,
    #[serde(default)]
    pub scale: Option<f32>,
    /// Rescale raw values onto `[0, 1]` after loading
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

fn default_normalize() -> bool {
    true
}

impl VolumeEntry {
    pub fn params(&self) -> RenderParams {
        match (&self.params, self.preset) {
            (Some(params), _) => params.clone(),
            (None, Some(preset)) => preset.params(),
            (None, None) => RenderParams::default(),
        }
    }

    /// Outer node: position, turned towards `center` when placed on the ring
    pub fn yaw_transform(&self, ring_position: Option<Vec3>, center: Vec3) -> Transform {
        match (self.position, ring_position) {
            (Some(position), _) => Transform::from_translation(Vec3::from(position)),
            (None, Some(position)) => Transform::from_translation(position).looking_at(center),
            (None, None) => Transform::IDENTITY,
        }
    }

    /// Inner node: the organ's own orientation and size
    pub fn placing_transform(&self) -> Transform {
        let transform = match (self.rotation_deg, self.preset) {
            (Some(deg), _) => Transform::from_euler_degrees(Vec3::from(deg)),
            (None, Some(preset)) => Transform::IDENTITY.with_rotation(preset.rotation()),
            (None, None) => Transform::IDENTITY,
        };
        match self.scale {
            Some(scale) => transform.with_scale(Vec3::splat(scale)),
            None => transform,
        }
    }
}

/// A whole scene: camera, lighting and volumes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub camera: CameraConfig,
    pub lighting: LightingConfig,
    pub volumes: Vec<VolumeEntry>,
    /// Spread volumes without a position on a ring of this radius
    pub ring_radius: Option<f32>,
}

impl SceneConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid scene file {}", path.display()))
    }

    pub fn parse(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        if config.volumes.is_empty() {
            anyhow::bail!("scene has no volumes");
        }
        Ok(config)
    }

    /// Load every volume and build the scene graph.
    ///
    /// Each volume gets a yaw node (position, facing the ring center) with a
    /// placing child (preset rotation and scale). Relative paths resolve
    /// against `base_dir`; a file listed twice is read once and shared.
    pub fn build_scene(&self, base_dir: &Path) -> Result<Scene> {
        let center = Vec3::ZERO;
        let ring = self
            .ring_radius
            .map(|radius| volmarch_render::ring_positions(self.volumes.len(), radius, center));

        let mut loaded: HashMap<(PathBuf, bool), Arc<Volume>> = HashMap::new();
        let mut scene = Scene::new();

        for (i, entry) in self.volumes.iter().enumerate() {
            let path = base_dir.join(&entry.path);
            let volume = match loaded.get(&(path.clone(), entry.normalize)) {
                Some(volume) => volume.clone(),
                None => {
                    let volume = io::nrrd::read(&path)
                        .with_context(|| format!("Failed to load volume {}", path.display()))?;
                    let volume = Arc::new(if entry.normalize {
                        volume.normalized()
                    } else {
                        volume
                    });
                    loaded.insert((path.clone(), entry.normalize), volume.clone());
                    volume
                }
            };

            let name = entry
                .preset
                .map_or_else(|| format!("volume{}", i), |p| p.name().to_string());
            let ring_position = ring.as_ref().map(|r| r[i]);
            let yaw = scene.add_node(
                name.clone(),
                Scene::ROOT,
                entry.yaw_transform(ring_position, center),
            )?;
            let placing =
                scene.add_node(format!("{}/placing", name), yaw, entry.placing_transform())?;
            scene.add_volume(placing, volume, entry.params())?;
        }

        tracing::info!("Built scene with {} volume(s)", scene.instances().len());
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use volmarch_core::colormap::ColormapId;
    use volmarch_core::params::RenderMode;

    #[test]
    fn minimal_scene_uses_defaults() {
        let config = SceneConfig::parse(r#"{ "volumes": [ { "path": "brain.nrrd" } ] }"#).unwrap();
        assert_eq!(config.camera, CameraConfig::default());
        assert_eq!(config.volumes[0].params(), RenderParams::default());
        assert!(config.volumes[0].normalize);
    }

    #[test]
    fn empty_scene_is_rejected() {
        assert!(SceneConfig::parse(r#"{ "volumes": [] }"#).is_err());
    }

    #[test]
    fn preset_supplies_params_and_rotation() {
        let config = SceneConfig::parse(
            r#"{ "volumes": [ { "path": "heart.nrrd", "preset": "heart", "position": [1, 2, 3] } ] }"#,
        )
        .unwrap();
        let entry = &config.volumes[0];
        assert_eq!(entry.params(), OrganPreset::Heart.params());
        let yaw = entry.yaw_transform(Some(Vec3::X), Vec3::ZERO);
        assert_eq!(yaw.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(yaw.rotation, glam::Quat::IDENTITY);
        assert_eq!(entry.placing_transform().rotation, OrganPreset::Heart.rotation());
    }

    #[test]
    fn explicit_params_override_preset() {
        let config = SceneConfig::parse(
            r#"{
                "volumes": [ {
                    "path": "eye.nrrd",
                    "preset": "eye",
                    "params": { "mode": "mip", "colormap": "gray" },
                    "rotation_deg": [0, 90, 0],
                    "scale": 2.0
                } ]
            }"#,
        )
        .unwrap();
        let entry = &config.volumes[0];
        let params = entry.params();
        assert_eq!(params.mode(), RenderMode::Mip);
        assert_eq!(params.colormap(), &ColormapId::Gray);

        let yaw = entry.yaw_transform(Some(Vec3::X), Vec3::ZERO);
        assert_eq!(yaw.translation, Vec3::X);
        let t = entry.placing_transform();
        assert_eq!(t.scale, Vec3::splat(2.0));
        let z = t.rotation * Vec3::Z;
        assert_relative_eq!(z.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn lighting_direction_selects_directional_light() {
        let lighting = LightingConfig {
            direction: Some([0.0, 1.0, 0.0]),
            step_size: Some(0.25),
            ..Default::default()
        };
        let settings = lighting.settings();
        assert_eq!(settings.lighting.light, Light::Directional(Vec3::Y));
        assert_relative_eq!(settings.step_size(), 0.25);
        assert_eq!(LightingConfig::default().settings().lighting.light, Light::Headlight);
    }

    #[test]
    fn camera_orbit_keeps_framing_distance() {
        let bounds = Some(Aabb::new(Vec3::splat(-1.0), Vec3::ONE));
        let straight = CameraConfig::default().build(bounds);
        let turned = CameraConfig {
            azimuth: 90.0,
            elevation: 20.0,
            ..Default::default()
        }
        .build(bounds);
        assert_relative_eq!(straight.distance(), turned.distance(), epsilon = 1e-3);
        assert_eq!(turned.target, Vec3::ZERO);
    }

    #[test]
    fn scene_loads_volumes_relative_to_file() {
        let dir = std::env::temp_dir().join(format!("volmarch-scene-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let volume = Volume::filled(glam::UVec3::new(4, 3, 2), 2.0).unwrap();
        io::nrrd::write(dir.join("cube.nrrd"), &volume).unwrap();

        let config = SceneConfig::parse(
            r#"{
                "ring_radius": 10.0,
                "volumes": [
                    { "path": "cube.nrrd", "preset": "brain" },
                    { "path": "cube.nrrd", "normalize": false }
                ]
            }"#,
        )
        .unwrap();
        let scene = config.build_scene(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(scene.instances().len(), 2);
        assert_eq!(scene.name(volmarch_render::NodeId(1)).unwrap(), "brain");
        assert_eq!(scene.name(volmarch_render::NodeId(2)).unwrap(), "brain/placing");
        let world = scene.world_matrices();
        let first = world[2].transform_point3(Vec3::ZERO);
        assert_relative_eq!(first.z, -10.0, epsilon = 1e-4);
        assert_eq!(scene.instances()[1].volume.data()[0], 2.0);
    }

    #[test]
    fn ring_volumes_face_the_center() {
        let config = SceneConfig::parse(
            r#"{
                "ring_radius": 4.0,
                "volumes": [
                    { "path": "a.nrrd", "preset": "heart" },
                    { "path": "b.nrrd" },
                    { "path": "c.nrrd", "position": [1, 0, 0] }
                ]
            }"#,
        )
        .unwrap();
        let ring = volmarch_render::ring_positions(3, 4.0, Vec3::ZERO);

        for (i, entry) in config.volumes.iter().enumerate().take(2) {
            let yaw = entry.yaw_transform(Some(ring[i]), Vec3::ZERO);
            let facing = yaw.rotation * Vec3::Z;
            let to_center = (-ring[i]).normalize();
            assert_relative_eq!(facing.dot(to_center), 1.0, epsilon = 1e-5);
            assert_relative_eq!((yaw.rotation * Vec3::Y).y, 1.0, epsilon = 1e-5);
        }

        // The preset rotation rides on top of the yaw
        let mut scene = Scene::new();
        let entry = &config.volumes[0];
        let yaw = scene
            .add_node("yaw", Scene::ROOT, entry.yaw_transform(Some(ring[0]), Vec3::ZERO))
            .unwrap();
        let placing = scene.add_node("placing", yaw, entry.placing_transform()).unwrap();
        let world = scene.world_matrix(placing).unwrap();
        let expected = entry.yaw_transform(Some(ring[0]), Vec3::ZERO).rotation
            * OrganPreset::Heart.rotation()
            * Vec3::X;
        let actual = world.transform_vector3(Vec3::X);
        assert_relative_eq!(actual.dot(expected), 1.0, epsilon = 1e-5);

        // Explicit positions keep their orientation
        let fixed = config.volumes[2].yaw_transform(Some(ring[2]), Vec3::ZERO);
        assert_eq!(fixed.translation, Vec3::X);
        assert_eq!(fixed.rotation, glam::Quat::IDENTITY);
    }
}
