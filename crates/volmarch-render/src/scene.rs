//! Scene graph of transforms carrying volume instances
//!
//! Nodes form a tree rooted at [`Scene::ROOT`]. Every node has a local
//! [`Transform`]; world matrices are composed parent-first. Volumes hang off
//! nodes as [`VolumeInstance`]s, each with its own parameter snapshot.

use crate::error::{RenderError, Result};
use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use std::sync::Arc;
use volmarch_core::params::RenderParams;
use volmarch_core::volume::{Aabb, Volume};

/// Handle to a node in a [`Scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Translation, rotation and scale, applied scale-first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Rotation from XYZ Euler angles in degrees
    pub fn from_euler_degrees(degrees: Vec3) -> Self {
        Self {
            rotation: Quat::from_euler(
                EulerRot::XYZ,
                degrees.x.to_radians(),
                degrees.y.to_radians(),
                degrees.z.to_radians(),
            ),
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Turn so local `+Z` points from `translation` towards `target`,
    /// keeping local `+Y` as close to world up as possible
    pub fn looking_at(mut self, target: Vec3) -> Self {
        let Some(forward) = (target - self.translation).try_normalize() else {
            return self;
        };
        self.rotation = match Vec3::Y.cross(forward).try_normalize() {
            Some(right) => Quat::from_mat3(&Mat3::from_cols(right, forward.cross(right), forward)),
            // Looking straight up or down
            None => Quat::from_rotation_arc(Vec3::Z, forward),
        };
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    local: Transform,
}

/// A volume placed at a scene node
#[derive(Debug, Clone)]
pub struct VolumeInstance {
    pub node: NodeId,
    pub volume: Arc<Volume>,
    pub params: RenderParams,
    /// Shift the volume so its center sits at the node origin
    pub centered: bool,
}

impl VolumeInstance {
    /// Voxel space to node space
    pub fn local_offset(&self) -> Mat4 {
        if self.centered {
            Mat4::from_translation(-self.volume.center())
        } else {
            Mat4::IDENTITY
        }
    }
}

/// Transform hierarchy plus the volumes attached to it
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<Node>,
    instances: Vec<VolumeInstance>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub const ROOT: NodeId = NodeId(0);

    /// Create a scene holding only the root node
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: "root".to_string(),
                parent: None,
                local: Transform::IDENTITY,
            }],
            instances: Vec::new(),
        }
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(RenderError::UnknownNode(id.0))
        }
    }

    /// Add a child of `parent`
    pub fn add_node(&mut self, name: impl Into<String>, parent: NodeId, local: Transform) -> Result<NodeId> {
        self.check(parent)?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.into(),
            parent: Some(parent),
            local,
        });
        Ok(id)
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) -> Result<()> {
        self.check(id)?;
        self.nodes[id.0].local = local;
        Ok(())
    }

    pub fn local(&self, id: NodeId) -> Result<Transform> {
        self.check(id)?;
        Ok(self.nodes[id.0].local)
    }

    pub fn name(&self, id: NodeId) -> Result<&str> {
        self.check(id)?;
        Ok(&self.nodes[id.0].name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// World matrix of every node, indexed by `NodeId`.
    ///
    /// Parents are always created before their children, so one pass in
    /// insertion order suffices.
    pub fn world_matrices(&self) -> Vec<Mat4> {
        let mut world: Vec<Mat4> = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let local = node.local.matrix();
            let matrix = match node.parent {
                Some(parent) => world[parent.0] * local,
                None => local,
            };
            world.push(matrix);
        }
        world
    }

    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4> {
        self.check(id)?;
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(id);
        while let Some(node) = current {
            matrix = self.nodes[node.0].local.matrix() * matrix;
            current = self.nodes[node.0].parent;
        }
        Ok(matrix)
    }

    /// Attach a volume to a node, centered on it; returns the instance index
    pub fn add_volume(&mut self, node: NodeId, volume: Arc<Volume>, params: RenderParams) -> Result<usize> {
        self.check(node)?;
        self.instances.push(VolumeInstance {
            node,
            volume,
            params,
            centered: true,
        });
        Ok(self.instances.len() - 1)
    }

    pub fn instances(&self) -> &[VolumeInstance] {
        &self.instances
    }

    pub fn instance_mut(&mut self, index: usize) -> Option<&mut VolumeInstance> {
        self.instances.get_mut(index)
    }

    /// Model matrix (voxel space to world space) of every instance
    pub fn instance_models(&self) -> Vec<Mat4> {
        let world = self.world_matrices();
        self.instances
            .iter()
            .map(|instance| world[instance.node.0] * instance.local_offset())
            .collect()
    }

    /// World-space box around every instance, `None` for an empty scene
    pub fn bounds(&self) -> Option<Aabb> {
        let models = self.instance_models();
        let mut corners = self
            .instances
            .iter()
            .zip(&models)
            .flat_map(|(instance, model)| {
                instance
                    .volume
                    .bounds()
                    .corners()
                    .map(|c| model.transform_point3(c))
            });
        let first = corners.next()?;
        let (min, max) = corners.fold((first, first), |(min, max), c| (min.min(c), max.max(c)));
        Some(Aabb::new(min, max))
    }
}

/// Positions evenly spaced on a horizontal circle, starting at `-Z`
pub fn ring_positions(count: usize, radius: f32, center: Vec3) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Vec3::new(
                center.x + angle.sin() * radius,
                center.y,
                center.z - angle.cos() * radius,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::UVec3;

    fn volume() -> Arc<Volume> {
        Arc::new(Volume::filled(UVec3::new(4, 2, 2), 1.0).unwrap())
    }

    #[test]
    fn world_matrices_compose_parent_first() {
        let mut scene = Scene::new();
        let parent = scene
            .add_node("parent", Scene::ROOT, Transform::from_translation(Vec3::X))
            .unwrap();
        let child = scene
            .add_node(
                "child",
                parent,
                Transform::from_translation(Vec3::Y).with_scale(Vec3::splat(2.0)),
            )
            .unwrap();

        let world = scene.world_matrices();
        let p = world[child.0].transform_point3(Vec3::Z);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 1.0);
        assert_relative_eq!(p.z, 2.0);
        assert_eq!(scene.world_matrix(child).unwrap(), world[child.0]);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut scene = Scene::new();
        let err = scene.add_node("orphan", NodeId(7), Transform::IDENTITY);
        assert!(matches!(err, Err(RenderError::UnknownNode(7))));
        assert!(scene.add_volume(NodeId(3), volume(), RenderParams::default()).is_err());
    }

    #[test]
    fn centered_instance_bounds_surround_node() {
        let mut scene = Scene::new();
        let node = scene
            .add_node("organ", Scene::ROOT, Transform::from_translation(Vec3::new(10.0, 0.0, 0.0)))
            .unwrap();
        scene.add_volume(node, volume(), RenderParams::default()).unwrap();

        let bounds = scene.bounds().unwrap();
        assert_relative_eq!(bounds.center().x, 10.0);
        assert_relative_eq!(bounds.size().x, 4.0);
        assert_relative_eq!(bounds.size().y, 2.0);
    }

    #[test]
    fn empty_scene_has_no_bounds() {
        assert!(Scene::new().bounds().is_none());
    }

    #[test]
    fn ring_starts_in_front() {
        let ring = ring_positions(4, 2.0, Vec3::ZERO);
        assert_eq!(ring.len(), 4);
        assert_relative_eq!(ring[0].z, -2.0);
        assert_relative_eq!(ring[1].x, 2.0);
        assert!(ring_positions(0, 1.0, Vec3::ZERO).is_empty());
    }

    #[test]
    fn looking_at_turns_plus_z() {
        let t = Transform::from_translation(Vec3::ZERO).looking_at(Vec3::new(5.0, 0.0, 0.0));
        let z = t.rotation * Vec3::Z;
        assert_relative_eq!(z.x, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn looking_back_keeps_up_vector() {
        let t = Transform::from_translation(Vec3::new(0.0, 0.0, 10.0)).looking_at(Vec3::ZERO);
        let z = t.rotation * Vec3::Z;
        let y = t.rotation * Vec3::Y;
        assert_relative_eq!(z.z, -1.0, epsilon = 1e-5);
        assert_relative_eq!(y.y, 1.0, epsilon = 1e-5);

        let up = Transform::IDENTITY.looking_at(Vec3::new(0.0, 3.0, 0.0));
        assert_relative_eq!((up.rotation * Vec3::Z).y, 1.0, epsilon = 1e-5);
    }
}
