//! The in-memory support-tree model.
//!
//! [`SupportTree`] owns every generated element in append-only containers.
//! Builders return typed handles that stay valid for the lifetime of the
//! tree; a pillar references its head through such a handle, so there are
//! no ownership cycles. All mutation happens from the planner's single
//! worker.

use crate::geometry::Vec3;
use crate::support::tree_elements::{
    Bridge, BridgeId, Head, HeadId, Junction, JunctionId, Pillar, PillarId,
};
use crate::CoordF;

/// The abstract graph of support primitives produced by the planner.
#[derive(Debug, Clone, Default)]
pub struct SupportTree {
    heads: Vec<Head>,
    pillars: Vec<Pillar>,
    junctions: Vec<Junction>,
    bridges: Vec<Bridge>,
}

impl SupportTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pinhead and return its handle.
    pub fn add_head(
        &mut self,
        r_back_mm: CoordF,
        r_pin_mm: CoordF,
        width_mm: CoordF,
        dir: Vec3,
        tr: Vec3,
    ) -> HeadId {
        let id = HeadId(self.heads.len());
        self.heads
            .push(Head::new(r_back_mm, r_pin_mm, width_mm, dir, tr));
        id
    }

    /// Append a pillar hanging from `head` down to `endpoint` and return
    /// its handle. The head must already carry a tail.
    pub fn add_pillar(&mut self, head: HeadId, endpoint: Vec3, radius: CoordF) -> PillarId {
        let id = PillarId(self.pillars.len());
        let pillar = Pillar::new(&self.heads[head.0], head, endpoint, radius);
        self.pillars.push(pillar);
        id
    }

    /// Append a junction sphere and return its handle.
    pub fn add_junction(&mut self, pos: Vec3, r_mm: CoordF) -> JunctionId {
        let id = JunctionId(self.junctions.len());
        self.junctions.push(Junction::new(pos, r_mm));
        id
    }

    /// Append a bridge between two junctions and return its handle.
    pub fn add_bridge(&mut self, from: JunctionId, to: JunctionId, r_mm: CoordF) -> BridgeId {
        let id = BridgeId(self.bridges.len());
        let sp = self.junctions[from.0].pos;
        let ep = self.junctions[to.0].pos;
        self.bridges.push(Bridge::new(sp, ep, r_mm));
        id
    }

    /// A head by handle.
    pub fn head(&self, id: HeadId) -> &Head {
        &self.heads[id.0]
    }

    /// Mutable access to a head, for `transform` and `add_tail`.
    pub fn head_mut(&mut self, id: HeadId) -> &mut Head {
        &mut self.heads[id.0]
    }

    /// All heads in insertion order.
    pub fn heads(&self) -> &[Head] {
        &self.heads
    }

    /// A pillar by handle.
    pub fn pillar(&self, id: PillarId) -> &Pillar {
        &self.pillars[id.0]
    }

    /// Mutable access to a pillar, for base attachment.
    pub fn pillar_mut(&mut self, id: PillarId) -> &mut Pillar {
        &mut self.pillars[id.0]
    }

    /// All pillars in insertion order.
    pub fn pillars(&self) -> &[Pillar] {
        &self.pillars
    }

    /// A junction by handle.
    pub fn junction(&self, id: JunctionId) -> &Junction {
        &self.junctions[id.0]
    }

    /// All junctions in insertion order.
    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    /// All bridges in insertion order.
    pub fn bridges(&self) -> &[Bridge] {
        &self.bridges
    }

    /// Whether the tree holds no elements at all.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
            && self.pillars.is_empty()
            && self.junctions.is_empty()
            && self.bridges.is_empty()
    }
}
