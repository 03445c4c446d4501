//! Triangulated geometric primitives.
//!
//! Pure builders for the two base shapes every support element is
//! assembled from: a sphere patch bounded by polar angles, and a capped
//! cylinder. Both are produced in a local frame (sphere centred at the
//! origin, cylinder along +z starting at the origin) and placed in the
//! world by the caller.
//!
//! The azimuthal step is rounded so that an even number of segments closes
//! the ring exactly: `angle = 2*pi / floor(2*pi / fa)`. A sphere portion is
//! a pair of polar angles in `[0, pi]` measured from the -z pole; rings are
//! stacked at discrete polar angles with the same angular resolution and
//! stitched with two triangles per quad, and a triangle fan closes each cap
//! the portion touches.

use crate::geometry::Vec3;
use crate::mesh::TriangleMesh;
use crate::CoordF;
use std::f64::consts::PI;

/// Radii at or below this produce an empty mesh.
const MIN_RADIUS: CoordF = 1e-6;

/// Tolerance deciding whether a portion boundary touches a pole.
const POLE_TOLERANCE: CoordF = 1e-9;

/// Number of azimuthal segments for a requested step `fa`, the largest
/// count whose even step does not exceed `fa`. The epsilon keeps exact
/// divisors of the full circle from losing a segment to rounding.
fn segment_count(fa: CoordF) -> u32 {
    ((2.0 * PI / fa + 1e-9).floor() as u32).max(3)
}

/// Add two triangles connecting one quad of two equally sized vertex
/// rings, with wrap-around at the seam. `upper` and `lower` are the first
/// vertex indices of the rings; both rings hold `n` vertices at matching
/// azimuths.
pub(crate) fn stitch_rings(mesh: &mut TriangleMesh, upper: u32, lower: u32, n: u32) {
    for i in 0..n {
        let j = (i + 1) % n;
        mesh.add_triangle(upper + i, lower + i, lower + j);
        mesh.add_triangle(upper + i, lower + j, upper + j);
    }
}

/// Triangulate the surface patch of a sphere.
///
/// `rho` is the radius, `portion` the closed polar-angle interval
/// `[a, b] in [0, pi]` measured from the -z pole, and `fa` the requested
/// azimuthal step in radians. A degenerate radius or empty portion yields
/// an empty mesh.
pub fn sphere(rho: CoordF, portion: (CoordF, CoordF), fa: CoordF) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    if rho <= MIN_RADIUS {
        return mesh;
    }

    let n_az = segment_count(fa);
    let angle = 2.0 * PI / n_az as CoordF;

    let a = portion.0.clamp(0.0, PI);
    let b = portion.1.clamp(0.0, PI);
    if b - a <= POLE_TOLERANCE {
        return mesh;
    }

    let bottom_pole = a <= POLE_TOLERANCE;
    let top_pole = b >= PI - POLE_TOLERANCE;

    // Stack rings at the same angular resolution as the azimuth. Both caps
    // present requires at least one interior ring between the pole fans.
    let mut n_polar = (((b - a) / angle).ceil() as u32).max(1);
    if bottom_pole && top_pole {
        n_polar = n_polar.max(2);
    }

    let ring_z = |i: u32| -> CoordF {
        let theta = a + (b - a) * i as CoordF / n_polar as CoordF;
        -rho * theta.cos()
    };
    let ring_r = |i: u32| -> CoordF {
        let theta = a + (b - a) * i as CoordF / n_polar as CoordF;
        rho * theta.sin()
    };

    let first_ring = if bottom_pole { 1 } else { 0 };
    let last_ring = if top_pole { n_polar - 1 } else { n_polar };

    if bottom_pole {
        mesh.add_vertex(Vec3::new(0.0, 0.0, -rho * a.cos()));
    }

    let rings_start = mesh.vertex_count() as u32;
    for i in first_ring..=last_ring {
        let z = ring_z(i);
        let r = ring_r(i);
        for j in 0..n_az {
            let phi = j as CoordF * angle;
            mesh.add_vertex(Vec3::new(r * phi.cos(), r * phi.sin(), z));
        }
    }

    // Cap fan at the bottom pole.
    if bottom_pole {
        for j in 0..n_az {
            let k = (j + 1) % n_az;
            mesh.add_triangle(0, rings_start + k, rings_start + j);
        }
    }

    // Quad strips between consecutive rings.
    for i in 0..(last_ring - first_ring) {
        let lower = rings_start + i * n_az;
        let upper = lower + n_az;
        stitch_rings(&mut mesh, upper, lower, n_az);
    }

    // Cap fan at the top pole.
    if top_pole {
        let pole = mesh.add_vertex(Vec3::new(0.0, 0.0, -rho * b.cos()));
        let top = rings_start + (last_ring - first_ring) * n_az;
        for j in 0..n_az {
            let k = (j + 1) % n_az;
            mesh.add_triangle(top + j, top + k, pole);
        }
    }

    mesh
}

/// Triangulate a capped cylinder of radius `r` and height `h`, with its
/// axis along +z from the origin. `fa` is the requested azimuthal step.
pub fn cylinder(r: CoordF, h: CoordF, fa: CoordF) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    if r <= MIN_RADIUS || h <= MIN_RADIUS {
        return mesh;
    }

    let n = segment_count(fa);
    let angle = 2.0 * PI / n as CoordF;

    let bottom_center = mesh.add_vertex(Vec3::zero());
    let top_center = mesh.add_vertex(Vec3::new(0.0, 0.0, h));

    let bottom = mesh.vertex_count() as u32;
    for j in 0..n {
        let phi = j as CoordF * angle;
        mesh.add_vertex(Vec3::new(r * phi.cos(), r * phi.sin(), 0.0));
    }
    let top = mesh.vertex_count() as u32;
    for j in 0..n {
        let phi = j as CoordF * angle;
        mesh.add_vertex(Vec3::new(r * phi.cos(), r * phi.sin(), h));
    }

    // Side wall; the top ring leads the strip.
    stitch_rings(&mut mesh, top, bottom, n);

    for j in 0..n {
        let k = (j + 1) % n;
        mesh.add_triangle(bottom_center, bottom + k, bottom + j);
        mesh.add_triangle(top_center, top + j, top + k);
    }

    mesh
}
