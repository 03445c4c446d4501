//! Minimal host object model.
//!
//! The planner consumes a scene of objects, each carrying a raw triangle
//! mesh, a list of placed instances and the user's support points in
//! object-local coordinates. Planning happens in world space: every
//! instance of every object is flattened into one combined mesh, and each
//! support point is transformed by its owning instance.
//!
//! Generated supports are published back into the same model as a new
//! object whose volumes are the individual primitive meshes.

use crate::geometry::Vec3;
use crate::mesh::TriangleMesh;
use crate::CoordF;
use serde::{Deserialize, Serialize};

/// Placement of one copy of an object: rotation about the vertical axis,
/// uniform scaling, then translation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelInstance {
    /// Rotation around the z axis (radians).
    pub rotation: CoordF,
    /// Uniform scaling factor.
    pub scaling_factor: CoordF,
    /// Translation applied after rotation and scaling.
    pub offset: Vec3,
}

impl Default for ModelInstance {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            scaling_factor: 1.0,
            offset: Vec3::zero(),
        }
    }
}

impl ModelInstance {
    /// Transform a local-space point into world space.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let (sin_r, cos_r) = self.rotation.sin_cos();
        let scaled = p * self.scaling_factor;
        Vec3::new(
            cos_r * scaled.x - sin_r * scaled.y,
            sin_r * scaled.x + cos_r * scaled.y,
            scaled.z,
        ) + self.offset
    }

    /// Transform a local-space mesh into world space.
    pub fn transform_mesh(&self, mesh: &TriangleMesh) -> TriangleMesh {
        let vertices = mesh
            .vertices()
            .iter()
            .map(|&v| self.transform_point(v))
            .collect();
        TriangleMesh::from_parts(vertices, mesh.indices().to_vec())
    }
}

/// An object in the scene: one or more mesh volumes, the instances placing
/// it in the world, and its support points in local coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelObject {
    name: String,
    volumes: Vec<TriangleMesh>,
    instances: Vec<ModelInstance>,
    support_points: Vec<Vec3>,
}

impl ModelObject {
    /// Create a named empty object.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The object's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a mesh volume.
    pub fn add_volume(&mut self, mesh: TriangleMesh) {
        self.volumes.push(mesh);
    }

    /// The object's mesh volumes.
    pub fn volumes(&self) -> &[TriangleMesh] {
        &self.volumes
    }

    /// Append an instance.
    pub fn add_instance(&mut self, instance: ModelInstance) {
        self.instances.push(instance);
    }

    /// The object's instances.
    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    /// Replace the object's support points (local coordinates).
    pub fn set_support_points(&mut self, points: Vec<Vec3>) {
        self.support_points = points;
    }

    /// Append a support point (local coordinates).
    pub fn add_support_point(&mut self, point: Vec3) {
        self.support_points.push(point);
    }

    /// The object's support points (local coordinates).
    pub fn support_points(&self) -> &[Vec3] {
        &self.support_points
    }

    /// The union of all volumes in local space.
    pub fn raw_mesh(&self) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        for volume in &self.volumes {
            mesh.merge(volume);
        }
        mesh
    }
}

/// A scene of objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    objects: Vec<ModelObject>,
}

impl Model {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty named object and return it for population.
    pub fn add_object(&mut self, name: impl Into<String>) -> &mut ModelObject {
        let idx = self.objects.len();
        self.objects.push(ModelObject::new(name));
        &mut self.objects[idx]
    }

    /// The objects of the scene.
    pub fn objects(&self) -> &[ModelObject] {
        &self.objects
    }

    /// Every instance of every object flattened into one world-space mesh.
    pub fn combined_mesh(&self) -> TriangleMesh {
        let mut combined = TriangleMesh::new();
        for object in &self.objects {
            let raw = object.raw_mesh();
            for instance in &object.instances {
                combined.merge(&instance.transform_mesh(&raw));
            }
        }
        combined
    }

    /// All support points transformed into world space, one copy per
    /// instance of the owning object.
    pub fn support_points(&self) -> Vec<Vec3> {
        let mut points = Vec::new();
        for object in &self.objects {
            for instance in &object.instances {
                for &p in &object.support_points {
                    points.push(instance.transform_point(p));
                }
            }
        }
        points
    }
}
