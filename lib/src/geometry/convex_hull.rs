//! 2D convex hull by gift wrapping.
//!
//! The planner breaks grounded pillar positions into concentric rings by
//! repeatedly taking the convex hull of the remaining centroids; connecting
//! pillars ring by ring keeps bridges from crossing each other. Inputs are
//! index sets with an accessor, so hulls can be computed over any subset of
//! a point container without copying it.

use crate::geometry::Vec2;

/// Colinearity tolerance for the orientation predicate.
const ERR: f64 = 1e-6;

/// Orientation of the triple (p, q, r): 0 when colinear, 1 when clockwise,
/// 2 when counter-clockwise.
fn orientation(p: Vec2, q: Vec2, r: Vec2) -> u8 {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val.abs() < ERR {
        0
    } else if val > ERR {
        1
    } else {
        2
    }
}

/// Convex hull of an indexed point set, in counter-clockwise order.
///
/// `point_of` maps an element of `indices` to its 2D position. Fewer than
/// three input points are returned unchanged. The wrap starts at the
/// leftmost point (ties broken by the lower y coordinate).
pub fn convex_hull_2d<F>(indices: &[usize], point_of: F) -> Vec<usize>
where
    F: Fn(usize) -> Vec2,
{
    let n = indices.len();
    if n < 3 {
        return indices.to_vec();
    }

    let points: Vec<Vec2> = indices.iter().map(|&i| point_of(i)).collect();

    // Find the leftmost point.
    let mut l = 0;
    for i in 1..n {
        if (points[i].x - points[l].x).abs() < ERR {
            if points[i].y < points[l].y {
                l = i;
            }
        } else if points[i].x < points[l].x {
            l = i;
        }
    }

    // Keep moving counter-clockwise until the start point is reached again.
    let mut hull = Vec::new();
    let mut p = l;
    loop {
        hull.push(indices[p]);

        // Pick q so that no point is more counter-clockwise than it with
        // respect to p.
        let mut q = (p + 1) % n;
        for i in 0..n {
            if orientation(points[p], points[i], points[q]) == 2 {
                q = i;
            }
        }
        p = q;

        if p == l {
            break;
        }
    }

    hull
}
