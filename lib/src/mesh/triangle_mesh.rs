//! Triangle mesh data structure.
//!
//! An indexed triangle set with floating-point vertices. Support primitives
//! are assembled by appending vertices and triangles, merged into combined
//! volumes, and rigidly placed in the world with [`TriangleMesh::translate`]
//! and [`TriangleMesh::rotate_translate`].

use crate::geometry::{Rotation3, Vec3};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single triangle defined by three vertex indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    /// Indices into the vertex array for the three corners.
    pub indices: [u32; 3],
}

impl Triangle {
    /// Create a new triangle from vertex indices.
    #[inline]
    pub const fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self {
            indices: [v0, v1, v2],
        }
    }

    /// Get the vertex index at position i (0, 1, or 2).
    #[inline]
    pub fn vertex(&self, i: usize) -> u32 {
        self.indices[i]
    }

    /// Check if this triangle is degenerate (has duplicate vertices).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.indices[0] == self.indices[1]
            || self.indices[1] == self.indices[2]
            || self.indices[2] == self.indices[0]
    }
}

impl fmt::Debug for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Triangle({}, {}, {})",
            self.indices[0], self.indices[1], self.indices[2]
        )
    }
}

impl From<[u32; 3]> for Triangle {
    #[inline]
    fn from(indices: [u32; 3]) -> Self {
        Self { indices }
    }
}

/// A 3D triangle mesh represented as an indexed triangle set.
///
/// Triangles are wound counter-clockwise when viewed from outside, so the
/// outward face normal is the normalized cross product of the first two
/// edges.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    /// Vertex positions (mm).
    vertices: Vec<Vec3>,
    /// Triangle indices into the vertex array.
    indices: Vec<Triangle>,
}

impl TriangleMesh {
    /// Create a new empty mesh.
    #[inline]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Create a mesh with preallocated capacity.
    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(triangle_count),
        }
    }

    /// Create a mesh from vertices and indices.
    pub fn from_parts(vertices: Vec<Vec3>, indices: Vec<Triangle>) -> Self {
        Self { vertices, indices }
    }

    /// Get the vertices of the mesh.
    #[inline]
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Get the triangle indices.
    #[inline]
    pub fn indices(&self) -> &[Triangle] {
        &self.indices
    }

    /// Get the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Check if the mesh is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.vertices.is_empty()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, v: Vec3) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(v);
        idx
    }

    /// Add a triangle from vertex indices.
    pub fn add_triangle(&mut self, v0: u32, v1: u32, v2: u32) {
        self.indices.push(Triangle::new(v0, v1, v2));
    }

    /// Get a vertex by index.
    #[inline]
    pub fn vertex(&self, idx: u32) -> Vec3 {
        self.vertices[idx as usize]
    }

    /// Get the three vertices of a triangle.
    #[inline]
    pub fn triangle_vertices(&self, tri_idx: usize) -> [Vec3; 3] {
        let tri = &self.indices[tri_idx];
        [
            self.vertices[tri.indices[0] as usize],
            self.vertices[tri.indices[1] as usize],
            self.vertices[tri.indices[2] as usize],
        ]
    }

    /// Unit outward normal of a triangle (CCW winding).
    pub fn triangle_normal(&self, tri_idx: usize) -> Vec3 {
        let [v0, v1, v2] = self.triangle_vertices(tri_idx);
        (v1 - v0).cross(&(v2 - v0)).normalized()
    }

    /// Append another mesh, shifting its indices past the current vertices.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|tri| {
            Triangle::new(
                tri.indices[0] + offset,
                tri.indices[1] + offset,
                tri.indices[2] + offset,
            )
        }));
    }

    /// Translate all vertices by the given vector.
    pub fn translate(&mut self, v: Vec3) {
        for p in &mut self.vertices {
            *p += v;
        }
    }

    /// Rotate all vertices, then translate them.
    pub fn rotate_translate(&mut self, rotation: &Rotation3, translation: Vec3) {
        for p in &mut self.vertices {
            *p = rotation.apply(*p) + translation;
        }
    }

    /// Minimum and maximum corner of the axis-aligned bounding box.
    pub fn bounding_box(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::new(CoordF::MAX, CoordF::MAX, CoordF::MAX);
        let mut max = Vec3::new(CoordF::MIN, CoordF::MIN, CoordF::MIN);
        for v in &self.vertices {
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    }

    /// Check whether every edge is shared by exactly two triangles.
    ///
    /// This is the watertightness criterion for the generated primitives: a
    /// closed 2-manifold without boundary.
    pub fn is_likely_manifold(&self) -> bool {
        if self.indices.is_empty() {
            return false;
        }
        let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();
        for tri in &self.indices {
            for i in 0..3 {
                let a = tri.indices[i];
                let b = tri.indices[(i + 1) % 3];
                let key = (a.min(b), a.max(b));
                *edge_counts.entry(key).or_insert(0) += 1;
            }
        }
        edge_counts.values().all(|&count| count == 2)
    }

    /// Axis-aligned cube of the given edge length with one corner at the
    /// origin. Used as a simple test fixture.
    pub fn cube(size: CoordF) -> Self {
        let s = size;
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(s, 0.0, 0.0),
            Vec3::new(s, s, 0.0),
            Vec3::new(0.0, s, 0.0),
            Vec3::new(0.0, 0.0, s),
            Vec3::new(s, 0.0, s),
            Vec3::new(s, s, s),
            Vec3::new(0.0, s, s),
        ];
        let indices = vec![
            // bottom (-z)
            Triangle::new(0, 2, 1),
            Triangle::new(0, 3, 2),
            // top (+z)
            Triangle::new(4, 5, 6),
            Triangle::new(4, 6, 7),
            // front (-y)
            Triangle::new(0, 1, 5),
            Triangle::new(0, 5, 4),
            // right (+x)
            Triangle::new(1, 2, 6),
            Triangle::new(1, 6, 5),
            // back (+y)
            Triangle::new(2, 3, 7),
            Triangle::new(2, 7, 6),
            // left (-x)
            Triangle::new(3, 0, 4),
            Triangle::new(3, 4, 7),
        ];
        Self::from_parts(vertices, indices)
    }
}

impl fmt::Debug for TriangleMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangleMesh({} vertices, {} triangles)",
            self.vertices.len(),
            self.indices.len()
        )
    }
}
