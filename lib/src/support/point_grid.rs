//! Uniform hash-grid point index.
//!
//! The planner keeps the junctions it creates in a spatial index so that
//! later ring-weaving passes can find existing anchors on a pillar.
//! [`PointGrid`] buckets points into cubic cells keyed in a sorted map, so
//! every query visits entries in a deterministic order regardless of
//! insertion history.

use crate::geometry::Vec3;
use crate::CoordF;
use std::collections::BTreeMap;

type Cell = (i64, i64, i64);

/// A point index over uniform cubic cells.
///
/// Entries are `(position, id)` pairs; the same id may be stored once per
/// distinct position.
#[derive(Debug, Clone)]
pub struct PointGrid {
    cell_size: CoordF,
    cells: BTreeMap<Cell, Vec<(Vec3, u32)>>,
    len: usize,
}

impl PointGrid {
    /// Create an index with the given cell edge length. The cell size
    /// should be on the order of the expected query radius.
    pub fn new(cell_size: CoordF) -> Self {
        debug_assert!(cell_size > 0.0);
        Self {
            cell_size,
            cells: BTreeMap::new(),
            len: 0,
        }
    }

    fn cell_of(&self, p: &Vec3) -> Cell {
        (
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        )
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a point with its id.
    pub fn insert(&mut self, point: Vec3, id: u32) {
        let cell = self.cell_of(&point);
        self.cells.entry(cell).or_default().push((point, id));
        self.len += 1;
    }

    /// Remove the entry with the given id from the point's cell. Returns
    /// whether an entry was removed.
    pub fn remove(&mut self, point: Vec3, id: u32) -> bool {
        let cell = self.cell_of(&point);
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(idx) = bucket.iter().position(|&(_, entry_id)| entry_id == id) {
                bucket.remove(idx);
                self.len -= 1;
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
                return true;
            }
        }
        false
    }

    /// All entries satisfying a predicate. The visiting order is
    /// unspecified.
    pub fn query<F>(&self, predicate: F) -> Vec<(Vec3, u32)>
    where
        F: Fn(&Vec3, u32) -> bool,
    {
        self.cells
            .values()
            .flatten()
            .filter(|(p, id)| predicate(p, *id))
            .copied()
            .collect()
    }

    /// All entries within `radius` of `center`, visiting only the cells a
    /// sphere of that radius can overlap.
    pub fn query_radius(&self, center: Vec3, radius: CoordF) -> Vec<(Vec3, u32)> {
        let mut result = Vec::new();
        if radius < 0.0 {
            return result;
        }
        let lo = self.cell_of(&(center - Vec3::new(radius, radius, radius)));
        let hi = self.cell_of(&(center + Vec3::new(radius, radius, radius)));
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                for cz in lo.2..=hi.2 {
                    if let Some(bucket) = self.cells.get(&(cx, cy, cz)) {
                        for &(p, id) in bucket {
                            if p.distance(&center) < radius {
                                result.push((p, id));
                            }
                        }
                    }
                }
            }
        }
        result
    }

    /// The `k` entries nearest to `point`, closest first; equal distances
    /// are broken by ascending id.
    pub fn nearest(&self, point: Vec3, k: usize) -> Vec<(Vec3, u32)> {
        let mut entries: Vec<(CoordF, Vec3, u32)> = self
            .cells
            .values()
            .flatten()
            .map(|&(p, id)| (p.distance(&point), p, id))
            .collect();
        entries.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        });
        entries
            .into_iter()
            .take(k)
            .map(|(_, p, id)| (p, id))
            .collect()
    }
}
