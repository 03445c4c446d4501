//! Support-tree generation for SLA resin printing.
//!
//! Given a printable object (a triangular surface mesh) and a set of support
//! points on its surface, this crate synthesises the auxiliary geometry that
//! raises the part off the build plate: pinheads touching the object, pillars
//! reaching the plate (or terminating on the object), junction spheres on the
//! pillars and diagonal bridge cylinders tying the pillars together.
//!
//! The crate is organised as follows:
//! - [`geometry`] - vector math, the AABB-tree ray/mesh interrogator and the
//!   2D convex hull used for ring weaving
//! - [`mesh`] - the indexed triangle mesh type shared by all primitives
//! - [`model`] - a minimal host object model (objects, instances, support
//!   points) the planner consumes and publishes into
//! - [`support`] - the support-tree planner itself: geometric primitives,
//!   clustering, the spatial index, the tree model and the staged,
//!   pausable/cancellable generation pipeline
//!
//! The main entry points are [`support::SupportGenerator`] and the
//! convenience routine [`support::add_sla_supports`].

pub mod geometry;
pub mod mesh;
pub mod model;
pub mod support;

use thiserror::Error;

/// Floating-point coordinate type. All lengths are millimetres.
pub type CoordF = f64;

/// General geometric tolerance (mm).
pub const EPSILON: CoordF = 1e-6;

/// Errors surfaced by the support generation library.
///
/// Recoverable geometric conditions (an unsupportable surface tilt, not
/// enough space for a pinhead, degenerate primitive radii) never become
/// errors; they are absorbed by the planner. What remains is invalid input
/// and I/O around configuration files.
#[derive(Debug, Error)]
pub enum Error {
    /// A support point does not lie on the model surface.
    #[error("support point ({0:.3}, {1:.3}, {2:.3}) does not lie on the model surface")]
    PointOffSurface(CoordF, CoordF, CoordF),

    /// A mesh failed validation.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// IO error while reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a configuration file.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
