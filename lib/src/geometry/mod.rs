//! Geometric foundations for support planning.
//!
//! This module provides the vector types used throughout the crate, the
//! AABB-tree accelerated ray/mesh interrogator that gates every placement
//! decision in the planner, and the 2D convex hull used to peel grounded
//! pillars into concentric rings.

mod aabb_tree;
mod convex_hull;
mod point;

pub use aabb_tree::{ClosestPoint, MeshIndex, RayHit};
pub use convex_hull::convex_hull_2d;
pub use point::{Rotation3, Vec2, Vec3};
