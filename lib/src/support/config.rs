//! Support generation configuration.

use crate::{CoordF, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;
use std::fs;
use std::path::Path;

/// Parameters controlling the generated support geometry.
///
/// All lengths are millimetres; `tilt` is a signed angle in radians.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportConfig {
    /// Radius of the pinhead's front sphere, the pin pressed against the
    /// object.
    pub head_front_radius_mm: CoordF,
    /// Radius of the pinhead's back sphere, where the pillar attaches.
    pub head_back_radius_mm: CoordF,
    /// Length of the cylindrical waist between the two pinhead spheres.
    pub head_width_mm: CoordF,
    /// Default pillar radius. Values outside `(0, head_back_radius_mm)` fall
    /// back to a fraction of the back sphere radius.
    pub pillar_radius_mm: CoordF,
    /// Radius of the flared base where a pillar meets the build plate.
    pub base_radius_mm: CoordF,
    /// Height of the flared base.
    pub base_height_mm: CoordF,
    /// Bridge slope: a bridge spanning 2D distance `d` descends by
    /// `d * sin(-tilt)`.
    pub tilt: CoordF,
    /// Reserved spacing between consecutive junctions on a pillar.
    pub junction_distance: CoordF,
    /// Also weave a bridge between the last and first pillar of each ring.
    pub close_ring: bool,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            head_front_radius_mm: 0.2,
            head_back_radius_mm: 0.5,
            head_width_mm: 1.0,
            pillar_radius_mm: 0.3,
            base_radius_mm: 1.0,
            base_height_mm: 1.0,
            tilt: FRAC_PI_4,
            junction_distance: 1.0,
            close_ring: false,
        }
    }
}

impl SupportConfig {
    /// Load a configuration from a JSON file. Missing fields keep their
    /// default values.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
