//! Support-tree generation.
//!
//! This module turns user-picked support points into a tree of printable
//! support geometry:
//! - pinheads pressed against the object surface
//! - pillars dropping to the build plate (with a flared base) or
//!   terminating on the object (with an inverted pinhead)
//! - junction spheres on the pillars
//! - tilted bridge cylinders tying pillars together
//!
//! # Algorithm Overview
//!
//! 1. **Filter**: near-coincident picks are deduplicated, surface normals
//!    are saturated to a printable tilt, and a visibility ray verifies the
//!    pinhead fits; points that fail keep a record in the headless set.
//! 2. **Pinheads**: one head is appended per surviving point.
//! 3. **Classify**: a straight-down ray from each head decides grounded
//!    versus mesh-anchored; grounded heads are clustered in the XY plane.
//! 4. **Routing to ground**: each cluster elects a centroid whose pillar
//!    carries the group, side heads bridge onto it, and the centroids are
//!    peeled into convex-hull rings laced with bridges.
//!
//! Key submodules:
//! - `config`: the [`SupportConfig`] parameter set
//! - `primitives`: sphere and cylinder triangulation
//! - `tree_elements`: heads, pillars, junctions and bridges
//! - `tree`: the append-only [`SupportTree`] container
//! - `cluster` / `point_grid`: grouping and spatial lookup utilities
//! - `generator`: the staged, controllable planning pipeline

pub mod cluster;
pub mod config;
pub mod generator;
pub mod point_grid;
pub mod primitives;
pub mod tree;
pub mod tree_elements;

pub use cluster::{cluster, cluster_centroid};
pub use config::SupportConfig;
pub use generator::{
    add_sla_supports, AutoController, ChannelController, Command, Controller, GeneratedSupports,
    Step, SupportGenerator,
};
pub use point_grid::PointGrid;
pub use primitives::{cylinder, sphere};
pub use tree::SupportTree;
pub use tree_elements::{
    Bridge, BridgeId, Head, HeadId, Junction, JunctionId, Pillar, PillarId, Tail, STEPS,
};
