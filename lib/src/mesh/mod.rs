//! Triangle mesh data structures.
//!
//! This module provides the indexed triangle mesh used both for the input
//! object surface and for every generated support primitive:
//! - [`TriangleMesh`] - the main mesh data structure
//! - [`Triangle`] - a single indexed triangle

mod triangle_mesh;

pub use triangle_mesh::{Triangle, TriangleMesh};
