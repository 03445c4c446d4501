//! Ray/mesh interrogation over a balanced AABB tree.
//!
//! Every geometric decision in the support planner is gated by one of two
//! queries against the object surface:
//! - the first-hit distance of a ray (is there room for a pinhead, does a
//!   head reach the build plate, can a bridge be strung between pillars)
//! - the face owning a support point (to obtain its outward normal)
//!
//! [`MeshIndex`] packages a triangle mesh with a balanced AABB tree stored
//! in a flat array (children of node `i` at `2i+1` and `2i+2`), built by
//! recursive median splits along the longest box axis. Ray traversal uses
//! the slab method for boxes and Moller-Trumbore for triangles.

use crate::geometry::Vec3;
use crate::mesh::TriangleMesh;
use crate::{CoordF, Error, Result};

/// Sentinel index of inner tree nodes.
const INNER: usize = usize::MAX - 1;
/// Sentinel index of unused tree slots.
const NPOS: usize = usize::MAX;

/// Maximum distance at which a query point still counts as lying on the
/// surface (mm). Support points arrive through instance transforms, so a
/// small slack over exact incidence is required.
const ON_SURFACE_TOLERANCE: CoordF = 1e-4;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty (inverted) box.
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(CoordF::MAX, CoordF::MAX, CoordF::MAX),
            max: Vec3::new(CoordF::MIN, CoordF::MIN, CoordF::MIN),
        }
    }

    /// The bounding box of a triangle.
    pub fn from_triangle(v0: &Vec3, v1: &Vec3, v2: &Vec3) -> Self {
        Self {
            min: v0.min(v1).min(v2),
            max: v0.max(v1).max(v2),
        }
    }

    /// Grow the box to contain another box.
    pub fn extend_box(&mut self, other: &Aabb) {
        self.min = self.min.min(&other.min);
        self.max = self.max.max(&other.max);
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Uniformly inflate the box.
    pub fn inflate(&mut self, eps: CoordF) {
        self.min -= Vec3::new(eps, eps, eps);
        self.max += Vec3::new(eps, eps, eps);
    }

    /// Squared distance from a point to the box (zero inside).
    pub fn squared_exterior_distance(&self, p: &Vec3) -> CoordF {
        let mut d2 = 0.0;
        for axis in 0..3 {
            let v = p.component(axis);
            let lo = self.min.component(axis);
            let hi = self.max.component(axis);
            if v < lo {
                d2 += (lo - v) * (lo - v);
            } else if v > hi {
                d2 += (v - hi) * (v - hi);
            }
        }
        d2
    }
}

/// A node of the flat-array AABB tree.
#[derive(Debug, Clone, Copy)]
struct Node {
    bbox: Aabb,
    /// Leaf primitive index, `INNER` for inner nodes, `NPOS` when unused.
    idx: usize,
}

impl Node {
    fn empty() -> Self {
        Self {
            bbox: Aabb::empty(),
            idx: NPOS,
        }
    }

    #[inline]
    fn is_valid(&self) -> bool {
        self.idx != NPOS
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.idx < INNER
    }
}

struct BuildInput {
    idx: usize,
    bbox: Aabb,
    centroid: Vec3,
}

/// Result of a ray intersection test.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    /// Index of the hit triangle.
    pub triangle_idx: usize,
    /// Distance along the ray to the hit point.
    pub t: CoordF,
}

/// Result of a closest point query.
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    /// Index of the closest triangle.
    pub triangle_idx: usize,
    /// The closest point on that triangle.
    pub point: Vec3,
    /// Squared distance to the query point.
    pub squared_distance: CoordF,
}

impl ClosestPoint {
    /// Distance to the query point.
    pub fn distance(&self) -> CoordF {
        self.squared_distance.sqrt()
    }
}

/// A triangle mesh indexed for ray casting and closest point queries.
pub struct MeshIndex {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    nodes: Vec<Node>,
}

impl MeshIndex {
    /// Index a mesh for spatial queries.
    pub fn from_mesh(mesh: &TriangleMesh) -> Self {
        let vertices = mesh.vertices().to_vec();
        let triangles: Vec<[u32; 3]> = mesh.indices().iter().map(|t| t.indices).collect();
        Self::from_parts(vertices, triangles)
    }

    /// Index raw vertex and triangle arrays.
    pub fn from_parts(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        let mut index = Self {
            vertices,
            triangles,
            nodes: Vec::new(),
        };
        index.build();
        index
    }

    /// Number of indexed triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Check if the index holds no triangles.
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn triangle_vertices(&self, idx: usize) -> (&Vec3, &Vec3, &Vec3) {
        let tri = &self.triangles[idx];
        (
            &self.vertices[tri[0] as usize],
            &self.vertices[tri[1] as usize],
            &self.vertices[tri[2] as usize],
        )
    }

    /// Unit outward normal of an indexed triangle (CCW winding).
    pub fn triangle_normal(&self, idx: usize) -> Vec3 {
        let (v0, v1, v2) = self.triangle_vertices(idx);
        (*v1 - *v0).cross(&(*v2 - *v0)).normalized()
    }

    fn build(&mut self) {
        if self.triangles.is_empty() {
            return;
        }

        let mut input: Vec<BuildInput> = self
            .triangles
            .iter()
            .enumerate()
            .map(|(idx, tri)| {
                let v0 = &self.vertices[tri[0] as usize];
                let v1 = &self.vertices[tri[1] as usize];
                let v2 = &self.vertices[tri[2] as usize];
                let mut bbox = Aabb::from_triangle(v0, v1, v2);
                bbox.inflate(crate::EPSILON);
                let centroid = (*v0 + *v1 + *v2) / 3.0;
                BuildInput {
                    idx,
                    bbox,
                    centroid,
                }
            })
            .collect();

        let len = input.len();
        self.nodes = vec![Node::empty(); len.next_power_of_two() * 2 - 1];
        self.build_recursive(&mut input, 0, 0, len - 1);
    }

    fn build_recursive(&mut self, input: &mut [BuildInput], node_idx: usize, left: usize, right: usize) {
        debug_assert!(node_idx < self.nodes.len());
        debug_assert!(left <= right);

        if left == right {
            self.nodes[node_idx].idx = input[left].idx;
            self.nodes[node_idx].bbox = input[left].bbox;
            return;
        }

        let mut bbox = input[left].bbox;
        for item in &input[left + 1..=right] {
            bbox.extend_box(&item.bbox);
        }
        let dimension = bbox.longest_axis();

        // Partition around the median so the tree stays balanced.
        let center = (left + right) / 2;
        partition_input(input, dimension, left, right, center);

        self.nodes[node_idx].idx = INNER;
        self.nodes[node_idx].bbox = bbox;

        self.build_recursive(input, node_idx * 2 + 1, left, center);
        self.build_recursive(input, node_idx * 2 + 2, center + 1, right);
    }

    /// First-hit distance of a ray, or positive infinity when the ray
    /// misses the mesh entirely.
    ///
    /// `dir` must be unit length for the returned `t` to be a distance.
    pub fn ray_hit(&self, origin: Vec3, dir: Vec3) -> CoordF {
        self.ray_cast_first(origin, dir)
            .map(|hit| hit.t)
            .unwrap_or(CoordF::INFINITY)
    }

    /// Cast a ray and find the nearest intersection.
    pub fn ray_cast_first(&self, origin: Vec3, dir: Vec3) -> Option<RayHit> {
        if self.nodes.is_empty() {
            return None;
        }
        let inv_dir = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let eps = self.ray_epsilon();
        self.ray_cast_first_recursive(&origin, &dir, &inv_dir, 0, CoordF::MAX, eps)
    }

    /// Epsilon for the ray-triangle determinant test, scaled to mesh size.
    fn ray_epsilon(&self) -> CoordF {
        let mut eps = 1e-6;
        if let Some(root) = self.nodes.first() {
            let diag = root.bbox.max - root.bbox.min;
            let max_dim = diag.x.max(diag.y).max(diag.z);
            if max_dim > 0.0 {
                eps = 1e-6 / (max_dim * max_dim);
            }
        }
        eps
    }

    fn ray_cast_first_recursive(
        &self,
        origin: &Vec3,
        dir: &Vec3,
        inv_dir: &Vec3,
        node_idx: usize,
        mut min_t: CoordF,
        eps: CoordF,
    ) -> Option<RayHit> {
        let node = self.nodes.get(node_idx)?;
        if !node.is_valid() {
            return None;
        }
        if !ray_box_intersect(origin, inv_dir, &node.bbox, 0.0, min_t) {
            return None;
        }

        if node.is_leaf() {
            let (v0, v1, v2) = self.triangle_vertices(node.idx);
            if let Some(t) = ray_triangle_intersect(origin, dir, v0, v1, v2, eps) {
                if t > 0.0 && t < min_t {
                    return Some(RayHit {
                        triangle_idx: node.idx,
                        t,
                    });
                }
            }
            return None;
        }

        let mut best: Option<RayHit> = None;
        if let Some(hit) =
            self.ray_cast_first_recursive(origin, dir, inv_dir, node_idx * 2 + 1, min_t, eps)
        {
            min_t = hit.t;
            best = Some(hit);
        }
        if let Some(hit) =
            self.ray_cast_first_recursive(origin, dir, inv_dir, node_idx * 2 + 2, min_t, eps)
        {
            if hit.t < min_t {
                best = Some(hit);
            }
        }
        best
    }

    /// Find the closest point on the mesh to a query point.
    pub fn closest_point(&self, point: Vec3) -> Option<ClosestPoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut result = ClosestPoint {
            triangle_idx: NPOS,
            point: Vec3::zero(),
            squared_distance: CoordF::MAX,
        };
        self.closest_point_recursive(&point, 0, &mut result);
        (result.triangle_idx != NPOS).then_some(result)
    }

    fn closest_point_recursive(&self, point: &Vec3, node_idx: usize, result: &mut ClosestPoint) {
        let Some(node) = self.nodes.get(node_idx) else {
            return;
        };
        if !node.is_valid() {
            return;
        }
        if node.bbox.squared_exterior_distance(point) >= result.squared_distance {
            return;
        }

        if node.is_leaf() {
            let (v0, v1, v2) = self.triangle_vertices(node.idx);
            let candidate = closest_point_on_triangle(point, v0, v1, v2);
            let d2 = (candidate - *point).length_squared();
            if d2 < result.squared_distance {
                *result = ClosestPoint {
                    triangle_idx: node.idx,
                    point: candidate,
                    squared_distance: d2,
                };
            }
            return;
        }

        self.closest_point_recursive(point, node_idx * 2 + 1, result);
        self.closest_point_recursive(point, node_idx * 2 + 2, result);
    }

    /// Outward face normals for points lying on the surface.
    ///
    /// Each query point is matched to its owning triangle through a closest
    /// point lookup; a point farther than a small tolerance from the
    /// surface is invalid input and fails the whole query.
    pub fn face_normals(&self, points: &[Vec3]) -> Result<Vec<Vec3>> {
        let mut normals = Vec::with_capacity(points.len());
        for p in points {
            let hit = self
                .closest_point(*p)
                .filter(|cp| cp.distance() <= ON_SURFACE_TOLERANCE)
                .ok_or(Error::PointOffSurface(p.x, p.y, p.z))?;
            normals.push(self.triangle_normal(hit.triangle_idx));
        }
        Ok(normals)
    }
}

/// Partition `input[left..=right]` so the element at `k` is the median in
/// the given dimension (QuickSelect with median-of-three pivots).
fn partition_input(input: &mut [BuildInput], dimension: usize, mut left: usize, mut right: usize, k: usize) {
    while left < right {
        let center = (left + right) / 2;

        if input[left].centroid.component(dimension) > input[center].centroid.component(dimension) {
            input.swap(left, center);
        }
        if input[left].centroid.component(dimension) > input[right].centroid.component(dimension) {
            input.swap(left, right);
        }
        if input[center].centroid.component(dimension) > input[right].centroid.component(dimension) {
            input.swap(center, right);
        }

        let pivot = input[center].centroid.component(dimension);

        if right <= left + 2 {
            // The median-of-three pass already sorted the short range.
            break;
        }

        let mut i = left;
        let mut j = right - 1;
        input.swap(center, j);

        loop {
            loop {
                i += 1;
                if input[i].centroid.component(dimension) >= pivot {
                    break;
                }
            }
            loop {
                j -= 1;
                if input[j].centroid.component(dimension) <= pivot || i >= j {
                    break;
                }
            }
            if i >= j {
                break;
            }
            input.swap(i, j);
        }

        input.swap(i, right - 1);

        if k < i {
            right = i - 1;
        } else if k == i {
            break;
        } else {
            left = i + 1;
        }
    }
}

/// Ray-box intersection test using the slab method.
fn ray_box_intersect(origin: &Vec3, inv_dir: &Vec3, bbox: &Aabb, t0: CoordF, t1: CoordF) -> bool {
    let mut tmin;
    let mut tmax;

    if inv_dir.x >= 0.0 {
        tmin = (bbox.min.x - origin.x) * inv_dir.x;
        tmax = (bbox.max.x - origin.x) * inv_dir.x;
    } else {
        tmin = (bbox.max.x - origin.x) * inv_dir.x;
        tmax = (bbox.min.x - origin.x) * inv_dir.x;
    }

    let (tymin, tymax) = if inv_dir.y >= 0.0 {
        (
            (bbox.min.y - origin.y) * inv_dir.y,
            (bbox.max.y - origin.y) * inv_dir.y,
        )
    } else {
        (
            (bbox.max.y - origin.y) * inv_dir.y,
            (bbox.min.y - origin.y) * inv_dir.y,
        )
    };

    if tmin > tymax || tymin > tmax {
        return false;
    }
    tmin = tmin.max(tymin);
    tmax = tmax.min(tymax);

    let (tzmin, tzmax) = if inv_dir.z >= 0.0 {
        (
            (bbox.min.z - origin.z) * inv_dir.z,
            (bbox.max.z - origin.z) * inv_dir.z,
        )
    } else {
        (
            (bbox.max.z - origin.z) * inv_dir.z,
            (bbox.min.z - origin.z) * inv_dir.z,
        )
    };

    if tmin > tzmax || tzmin > tmax {
        return false;
    }
    tmin = tmin.max(tzmin);
    tmax = tmax.min(tzmax);

    tmin < t1 && tmax > t0
}

/// Moller-Trumbore ray-triangle intersection. Returns the distance along
/// the ray, or `None` when the ray misses or is parallel to the triangle.
fn ray_triangle_intersect(
    origin: &Vec3,
    dir: &Vec3,
    v0: &Vec3,
    v1: &Vec3,
    v2: &Vec3,
    eps: CoordF,
) -> Option<CoordF> {
    let edge1 = *v1 - *v0;
    let edge2 = *v2 - *v0;

    let pvec = dir.cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < eps {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = *origin - *v0;

    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = dir.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    (t > eps).then_some(t)
}

/// Closest point on a triangle to a given point.
///
/// Uses the algorithm from "Real-Time Collision Detection" by Christer
/// Ericson.
fn closest_point_on_triangle(p: &Vec3, a: &Vec3, b: &Vec3, c: &Vec3) -> Vec3 {
    let ab = *b - *a;
    let ac = *c - *a;
    let ap = *p - *a;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    let bp = *p - *b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return *a + ab * v;
    }

    let cp = *p - *c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return *a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return *b + (*c - *b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    *a + ab * v + ac * w
}
