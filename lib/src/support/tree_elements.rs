//! Support-tree elements: pinheads, pillars, junctions and bridges.
//!
//! Each element owns its triangulated mesh alongside the geometric
//! attributes the planner reasons about. A [`Head`] is the compound pinhead
//! pressed against the object; once placed it may grow a [`Tail`], the
//! truncated cone a [`Pillar`] shaft continues down from. [`Junction`]
//! spheres are lateral anchors on pillars, and [`Bridge`] cylinders tie
//! junctions together.
//!
//! Construction order matters: a head is built in a local frame with its
//! pin tip at the origin pointing straight down, then `transform` bakes its
//! world placement, `add_tail` attaches the taper, and only then can a
//! pillar be constructed from it.

use crate::geometry::{Rotation3, Vec3};
use crate::mesh::TriangleMesh;
use crate::support::primitives::{cylinder, sphere, stitch_rings};
use crate::CoordF;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Polygonal detail of every support primitive.
pub const STEPS: usize = 45;

/// Handle of a head stored in a support tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadId(pub usize);

/// Handle of a pillar stored in a support tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PillarId(pub usize);

/// Handle of a junction stored in a support tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JunctionId(pub usize);

/// Handle of a bridge stored in a support tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeId(pub usize);

/// The taper connecting the back of a pinhead to the top of its pillar.
#[derive(Debug, Clone)]
pub struct Tail {
    /// Truncated cone between the back sphere and the pillar top.
    pub mesh: TriangleMesh,
    /// Length of the taper.
    pub length: CoordF,
}

/// A pinhead: a small front sphere (the pin), a cylindrical waist and a
/// larger back sphere.
///
/// The untransformed mesh points straight down with the pin tip at the
/// origin; [`Head::transform`] rotates `(0, 0, -1)` onto `dir` and
/// translates by `tr`, after which the pin tip sits at `tr`.
#[derive(Debug, Clone)]
pub struct Head {
    mesh: TriangleMesh,
    tail: Option<Tail>,
    steps: usize,
    /// Unit direction the head points along.
    pub dir: Vec3,
    /// World position of the pin tip.
    pub tr: Vec3,
    /// Back sphere radius.
    pub r_back_mm: CoordF,
    /// Front (pin) sphere radius.
    pub r_pin_mm: CoordF,
    /// Waist length.
    pub width_mm: CoordF,
}

impl Head {
    /// Build a pinhead in its local frame.
    ///
    /// The two sphere patches are joined by a ruled surface along the line
    /// tangent to both spheres; the half-angle `phi` between the common
    /// axis and that tangent decides how much of each sphere stays visible.
    pub fn new(
        r_back_mm: CoordF,
        r_pin_mm: CoordF,
        width_mm: CoordF,
        dir: Vec3,
        tr: Vec3,
    ) -> Self {
        let steps = STEPS;
        let detail = 2.0 * PI / steps as CoordF;

        // Total height of the compound and the tangent half-angle.
        let h = r_back_mm + r_pin_mm + width_mm;
        let phi = PI / 2.0 - ((r_back_mm - r_pin_mm) / h).acos();

        let mut mesh = sphere(r_back_mm, (0.0, PI / 2.0 + phi), detail);
        let seam = mesh.vertex_count() as u32;

        let mut pin = sphere(r_pin_mm, (PI / 2.0 + phi, PI), detail);
        pin.translate(Vec3::new(0.0, 0.0, h));
        mesh.merge(&pin);

        // The boundary ring of the back patch is its last `steps` vertices,
        // the boundary ring of the pin patch its first `steps`; the ruled
        // surface between them is a plain quad strip.
        let n = steps as u32;
        stitch_rings(&mut mesh, seam, seam - n, n);

        // Drop the pin tip to the origin.
        mesh.translate(Vec3::new(0.0, 0.0, -(h + r_pin_mm)));

        Self {
            mesh,
            tail: None,
            steps,
            dir,
            tr,
            r_back_mm,
            r_pin_mm,
            width_mm,
        }
    }

    /// The head's mesh (local frame until [`Head::transform`] is called).
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    /// Consume the head, returning its mesh. Used when a head serves only
    /// as a terminator shape glued onto another element.
    pub fn into_mesh(self) -> TriangleMesh {
        self.mesh
    }

    /// The head's tail, if one was added.
    pub fn tail(&self) -> Option<&Tail> {
        self.tail.as_ref()
    }

    /// Polygonal detail of the head.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Bake the world placement into the mesh: rotate `(0, 0, -1)` onto
    /// `dir`, then translate by `tr`. Must be called at most once.
    pub fn transform(&mut self) {
        let rotation = Rotation3::from_two_vectors(Vec3::new(0.0, 0.0, -1.0), self.dir);
        self.mesh.rotate_translate(&rotation, self.tr);
    }

    /// Total axial extent of the head.
    pub fn fullwidth(&self) -> CoordF {
        2.0 * self.r_pin_mm + self.width_mm + 2.0 * self.r_back_mm
    }

    /// Centre of the back sphere, where downstream structure attaches.
    pub fn junction_point(&self) -> Vec3 {
        self.tr + self.dir * (2.0 * self.r_pin_mm + self.width_mm + self.r_back_mm)
    }

    /// The pillar radius to use for this head: the requested radius when it
    /// is positive and below the back sphere radius, otherwise a fixed
    /// fraction of the back sphere.
    pub fn request_pillar_radius(&self, radius: CoordF) -> CoordF {
        if radius > 0.0 && radius < self.r_back_mm {
            radius
        } else {
            self.r_back_mm * 0.65
        }
    }

    /// Attach the tail taper below the junction point.
    ///
    /// The cone narrows from `0.9 * r_back` down to the pillar radius
    /// selected by [`Head::request_pillar_radius`] over `0.8 * width`.
    /// Must be called at most once, after [`Head::transform`].
    pub fn add_tail(&mut self, radius: CoordF) {
        debug_assert!(self.tail.is_none(), "tail added twice");

        let length = 0.8 * self.width_mm;
        let c = self.junction_point();
        let r_top = 0.9 * self.r_back_mm;
        let r_low = self.request_pillar_radius(radius);

        let n = self.steps as u32;
        let a = 2.0 * PI / self.steps as CoordF;
        let mut mesh = TriangleMesh::with_capacity(2 * self.steps, 2 * self.steps);

        for i in 0..n {
            let phi = i as CoordF * a;
            mesh.add_vertex(Vec3::new(
                c.x + r_top * phi.cos(),
                c.y + r_top * phi.sin(),
                c.z,
            ));
        }
        for i in 0..n {
            let phi = i as CoordF * a;
            mesh.add_vertex(Vec3::new(
                c.x + r_low * phi.cos(),
                c.y + r_low * phi.sin(),
                c.z - length,
            ));
        }
        stitch_rings(&mut mesh, 0, n, n);

        self.tail = Some(Tail { mesh, length });
    }
}

/// A support pillar: a prism continuing its head's tail down to an
/// endpoint, optionally finished with a flared base.
#[derive(Debug, Clone)]
pub struct Pillar {
    mesh: TriangleMesh,
    base: Option<TriangleMesh>,
    /// Shaft radius.
    pub r: CoordF,
    steps: usize,
    /// Lower end of the shaft; `z = 0` for grounded pillars.
    pub endpoint: Vec3,
    /// The head this pillar hangs from.
    pub head: HeadId,
}

impl Pillar {
    /// Build a pillar shaft from the head's tail down to `endpoint`.
    ///
    /// The shaft continues the tail's lower ring, so the head must already
    /// carry a tail.
    pub(crate) fn new(head: &Head, head_id: HeadId, endpoint: Vec3, radius: CoordF) -> Self {
        let steps = head.steps();
        let r = head.request_pillar_radius(radius);
        let tail = head
            .tail()
            .expect("pillar construction requires the head's tail");

        let n = steps as u32;
        let mut mesh = TriangleMesh::with_capacity(2 * steps, 2 * steps);
        for i in n..2 * n {
            mesh.add_vertex(tail.mesh.vertex(i));
        }
        for i in n..2 * n {
            let v = tail.mesh.vertex(i);
            mesh.add_vertex(Vec3::new(v.x, v.y, endpoint.z));
        }
        stitch_rings(&mut mesh, 0, n, n);

        Self {
            mesh,
            base: None,
            r,
            steps,
            endpoint,
            head: head_id,
        }
    }

    /// The shaft mesh.
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    /// The base mesh, if one was attached.
    pub fn base(&self) -> Option<&TriangleMesh> {
        self.base.as_ref()
    }

    /// Whether the pillar carries a base.
    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    /// Attach a flared base at the endpoint: a frustum widening from the
    /// shaft radius at `endpoint.z + height` to `radius` on the build
    /// plate, closed with two disks. A non-positive height attaches
    /// nothing.
    pub fn add_base(&mut self, height: CoordF, radius: CoordF) {
        if height <= 0.0 {
            return;
        }
        let radius = radius.max(self.r);

        let n = self.steps as u32;
        let a = 2.0 * PI / self.steps as CoordF;
        let mut base = TriangleMesh::with_capacity(2 * self.steps + 2, 4 * self.steps);

        for i in 0..n {
            let phi = i as CoordF * a;
            base.add_vertex(Vec3::new(
                self.endpoint.x + self.r * phi.cos(),
                self.endpoint.y + self.r * phi.sin(),
                self.endpoint.z + height,
            ));
        }
        for i in 0..n {
            let phi = i as CoordF * a;
            base.add_vertex(Vec3::new(
                self.endpoint.x + radius * phi.cos(),
                self.endpoint.y + radius * phi.sin(),
                self.endpoint.z,
            ));
        }
        let lcenter = base.add_vertex(self.endpoint);
        let hcenter = base.add_vertex(self.endpoint + Vec3::new(0.0, 0.0, height));

        // Frustum wall, then the top and bottom disks.
        stitch_rings(&mut base, 0, n, n);
        for i in 0..n {
            let j = (i + 1) % n;
            base.add_triangle(i, j, hcenter);
            base.add_triangle(lcenter, n + j, n + i);
        }

        self.base = Some(base);
    }

    /// Replace the base mesh wholesale. Used for mesh-anchored pillars
    /// whose terminator is an inverted pinhead instead of a flared base.
    pub fn set_base_mesh(&mut self, mesh: TriangleMesh) {
        self.base = Some(mesh);
    }
}

/// A junction sphere: a lateral anchor on a pillar where bridges meet.
#[derive(Debug, Clone)]
pub struct Junction {
    mesh: TriangleMesh,
    /// Sphere radius.
    pub r: CoordF,
    /// World position of the sphere centre.
    pub pos: Vec3,
}

impl Junction {
    /// Build a junction sphere at `pos`.
    pub fn new(pos: Vec3, r_mm: CoordF) -> Self {
        let mut mesh = sphere(r_mm, (0.0, PI), 2.0 * PI / STEPS as CoordF);
        mesh.translate(pos);
        Self { mesh, r: r_mm, pos }
    }

    /// The junction's mesh.
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }
}

/// A bridge: a cylinder connecting two junction positions, tilted so it
/// descends slightly for printability.
#[derive(Debug, Clone)]
pub struct Bridge {
    mesh: TriangleMesh,
    /// Cylinder radius.
    pub r: CoordF,
    /// Start endpoint.
    pub sp: Vec3,
    /// End endpoint.
    pub ep: Vec3,
}

impl Bridge {
    /// Build a bridge between two endpoints. The cylinder axis is the
    /// normalized endpoint difference and its length the endpoint
    /// distance.
    pub fn new(sp: Vec3, ep: Vec3, r_mm: CoordF) -> Self {
        let dir = (ep - sp).normalized();
        let d = ep.distance(&sp);

        let mut mesh = cylinder(r_mm, d, 2.0 * PI / STEPS as CoordF);
        let rotation = Rotation3::from_two_vectors(Vec3::new(0.0, 0.0, 1.0), dir);
        mesh.rotate_translate(&rotation, sp);

        Self {
            mesh,
            r: r_mm,
            sp,
            ep,
        }
    }

    /// The bridge's mesh.
    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_head() -> Head {
        Head::new(
            0.5,
            0.2,
            1.0,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 10.0),
        )
    }

    #[test]
    fn test_head_junction_point() {
        let head = test_head();
        let expected = Vec3::new(0.0, 0.0, 10.0 - (2.0 * 0.2 + 1.0 + 0.5));
        assert!((head.junction_point() - expected).length() < 1e-9);
        assert!((head.fullwidth() - (2.0 * 0.2 + 1.0 + 2.0 * 0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_head_local_mesh_has_pin_tip_at_origin() {
        let head = test_head();
        let (min, max) = head.mesh().bounding_box();
        // The pin tip is the highest local vertex; the back sphere bottom
        // the lowest.
        assert!(max.z.abs() < 1e-9);
        assert!((min.z + (0.5 + 0.2 + 1.0 + 0.2 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_head_transform_is_rigid() {
        let mut head = test_head();
        let local_span = {
            let (min, max) = head.mesh().bounding_box();
            max - min
        };
        head.transform();
        let (min, max) = head.mesh().bounding_box();
        // Straight-down head: rotation is the identity, the mesh is only
        // translated to the anchor.
        assert!(((max - min) - local_span).length() < 1e-9);
        assert!((max.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_head_transform_straight_down_is_pure_translation() {
        let mut reference = Head::new(0.5, 0.2, 1.0, Vec3::new(0.0, 0.0, -1.0), Vec3::zero());
        let before: Vec<Vec3> = reference.mesh().vertices().to_vec();
        reference.transform();
        for (a, b) in before.iter().zip(reference.mesh().vertices()) {
            assert!((*a - *b).length() < 1e-12);
        }
    }

    #[test]
    fn test_request_pillar_radius() {
        let head = test_head();
        assert!((head.request_pillar_radius(0.3) - 0.3).abs() < 1e-12);
        // Out of range requests fall back to a fraction of the back sphere.
        assert!((head.request_pillar_radius(0.0) - 0.65 * 0.5).abs() < 1e-12);
        assert!((head.request_pillar_radius(0.9) - 0.65 * 0.5).abs() < 1e-12);
        assert!((head.request_pillar_radius(-1.0) - 0.65 * 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tail_geometry() {
        let mut head = test_head();
        head.transform();
        head.add_tail(0.3);

        let tail = head.tail().unwrap();
        assert!((tail.length - 0.8).abs() < 1e-12);
        let (min, max) = tail.mesh.bounding_box();
        let jz = head.junction_point().z;
        assert!((max.z - jz).abs() < 1e-9);
        assert!((min.z - (jz - 0.8)).abs() < 1e-9);
        // Upper ring at 0.9 * r_back, lower at the requested radius.
        assert!((max.x - 0.45).abs() < 1e-9);
        let lower = tail.mesh.vertex(STEPS as u32);
        assert!((lower.xy().length() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_pillar_reaches_endpoint() {
        let mut head = test_head();
        head.transform();
        head.add_tail(0.3);

        let endpoint = Vec3::new(0.0, 0.0, 0.0);
        let pillar = Pillar::new(&head, HeadId(0), endpoint, 0.3);
        assert!((pillar.r - 0.3).abs() < 1e-12);
        assert!(!pillar.has_base());

        let (min, max) = pillar.mesh().bounding_box();
        assert!(min.z.abs() < 1e-12);
        // The shaft starts at the tail's lower ring.
        let jz = head.junction_point().z;
        assert!((max.z - (jz - 0.8)).abs() < 1e-9);
    }

    #[test]
    fn test_pillar_base_flare() {
        let mut head = test_head();
        head.transform();
        head.add_tail(0.3);

        let mut pillar = Pillar::new(&head, HeadId(0), Vec3::zero(), 0.3);
        pillar.add_base(1.0, 1.0);
        assert!(pillar.has_base());

        let base = pillar.base().unwrap();
        assert!(base.is_likely_manifold());
        let (min, max) = base.bounding_box();
        assert!(min.z.abs() < 1e-12);
        assert!((max.z - 1.0).abs() < 1e-12);
        assert!((max.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pillar_base_ignores_degenerate_height() {
        let mut head = test_head();
        head.transform();
        head.add_tail(0.3);

        let mut pillar = Pillar::new(&head, HeadId(0), Vec3::zero(), 0.3);
        pillar.add_base(0.0, 1.0);
        assert!(!pillar.has_base());
    }

    #[test]
    fn test_junction_sphere() {
        let pos = Vec3::new(1.0, 2.0, 3.0);
        let junction = Junction::new(pos, 0.5);
        assert!(junction.mesh().is_likely_manifold());
        for v in junction.mesh().vertices() {
            assert!((v.distance(&pos) - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_bridge_axis_and_length() {
        let sp = Vec3::new(0.0, 0.0, 5.0);
        let ep = Vec3::new(3.0, 0.0, 2.0);
        let bridge = Bridge::new(sp, ep, 0.3);

        // The cylinder spans exactly the endpoint segment.
        let axis = (ep - sp).normalized();
        let len = ep.distance(&sp);
        let mut min_proj = CoordF::MAX;
        let mut max_proj = CoordF::MIN;
        for v in bridge.mesh().vertices() {
            let proj = (*v - sp).dot(&axis);
            min_proj = min_proj.min(proj);
            max_proj = max_proj.max(proj);
            // Every vertex stays within the cylinder radius of the axis.
            let radial = (*v - sp) - axis * proj;
            assert!(radial.length() < 0.3 + 1e-9);
        }
        assert!(min_proj.abs() < 1e-9);
        assert!((max_proj - len).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_junction_is_empty() {
        let junction = Junction::new(Vec3::zero(), 0.0);
        assert!(junction.mesh().is_empty());
    }
}
