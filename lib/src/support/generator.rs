//! The support-tree planning pipeline.
//!
//! Planning is a staged state machine driven by commands from the host:
//!
//! 1. **Filter**: deduplicate near-coincident picks, correct surface
//!    normals to a printable tilt and check there is room for a pinhead.
//! 2. **Pinheads**: append a head for every surviving point.
//! 3. **Classify**: a straight-down ray from each head's junction point
//!    decides whether its pillar reaches the build plate or terminates on
//!    the object; grounded heads are clustered so neighbours can share one
//!    pillar, mesh-anchored heads get their short pillar immediately.
//! 4. **Routing to ground**: every cluster elects a centroid that becomes
//!    the main based pillar; the other members hang side pillars bridged
//!    onto it. The centroids are then peeled into concentric convex-hull
//!    rings and consecutive ring members are tied together with tilted
//!    bridges wherever a visibility ray grants clearance.
//!
//! Two further stages (`RoutingNonground`, `Headless`) are reserved
//! extension points: they keep their transitions and progress reports but
//! perform no geometry.
//!
//! The host steers the pipeline through a [`Controller`]: `StartResume`
//! advances one stage, `Pause` parks the machine in `Halt` until it is
//! resumed, `Stop` aborts, and `Synch` rewinds to the beginning. Commands
//! are observed at exactly one suspension point between stages, so a stage
//! always runs to completion and a `Stop` between stages aborts cleanly
//! without publishing a partial tree.

use crate::geometry::{convex_hull_2d, MeshIndex, Vec3};
use crate::model::{Model, ModelInstance};
use crate::support::cluster::{cluster, cluster_centroid};
use crate::support::config::SupportConfig;
use crate::support::point_grid::PointGrid;
use crate::support::tree::SupportTree;
use crate::support::tree_elements::{Head, HeadId, PillarId};
use crate::{CoordF, Result};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

/// Support points closer than this are aliases of a single pick (mm).
const D_SP: CoordF = 0.1;

/// Cell edge of the junction index; on the order of the lateral query
/// radius around a pillar (mm).
const JUNCTION_GRID_CELL: CoordF = 1.0;

/// A control command posted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the pipeline, or advance/resume it by one stage.
    StartResume,
    /// Park the pipeline until the next command.
    Pause,
    /// Abort the pipeline.
    Stop,
    /// Rewind to the beginning.
    Synch,
}

/// Host-side steering and progress reporting.
///
/// `next_command` is called once between stages; with `block` set (the
/// pipeline is paused) it must wait for the next command instead of
/// returning a default. `status` receives a percentage and a stage label
/// after every transition.
pub trait Controller {
    /// Fetch the next command, blocking when `block` is set.
    fn next_command(&self, block: bool) -> Command;

    /// Progress callback, invoked synchronously from the planning worker.
    fn status(&self, percent: u32, message: &str);
}

/// A free-running controller: never pauses, ignores progress.
#[derive(Debug, Default)]
pub struct AutoController;

impl Controller for AutoController {
    fn next_command(&self, _block: bool) -> Command {
        Command::StartResume
    }

    fn status(&self, _percent: u32, _message: &str) {}
}

/// A controller fed from a channel, allowing any thread to steer the
/// planning worker.
///
/// While the pipeline runs, an empty channel means "carry on"; while it is
/// paused the worker blocks on the channel, and a disconnected channel
/// turns into `Stop` so an abandoned worker cannot hang.
pub struct ChannelController {
    commands: Mutex<Receiver<Command>>,
    status: Box<dyn Fn(u32, &str) + Send + Sync>,
}

impl ChannelController {
    /// Create a controller and the sender used to post commands to it.
    pub fn new<F>(status: F) -> (Self, Sender<Command>)
    where
        F: Fn(u32, &str) + Send + Sync + 'static,
    {
        let (tx, rx) = channel();
        (
            Self {
                commands: Mutex::new(rx),
                status: Box::new(status),
            },
            tx,
        )
    }
}

impl Controller for ChannelController {
    fn next_command(&self, block: bool) -> Command {
        let Ok(commands) = self.commands.lock() else {
            return Command::Stop;
        };
        if block {
            commands.recv().unwrap_or(Command::Stop)
        } else {
            commands.try_recv().unwrap_or(Command::StartResume)
        }
    }

    fn status(&self, percent: u32, message: &str) {
        (self.status)(percent, message);
    }
}

/// The stages of the planning pipeline. `Done` and `Abort` are terminal;
/// `Halt` parks the machine between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Begin,
    Filter,
    Pinheads,
    Classify,
    RoutingGround,
    RoutingNonground,
    Headless,
    Done,
    Halt,
    Abort,
}

impl Step {
    /// Progress percentage reported on entering the step.
    pub fn progress(self) -> u32 {
        match self {
            Step::Begin => 0,
            Step::Filter => 10,
            Step::Pinheads => 30,
            Step::Classify => 50,
            Step::RoutingGround => 60,
            Step::RoutingNonground => 70,
            Step::Headless => 80,
            Step::Done => 100,
            Step::Halt | Step::Abort => 0,
        }
    }

    /// Progress label reported on entering the step.
    pub fn label(self) -> &'static str {
        match self {
            Step::Begin => "",
            Step::Filter => "Filtering",
            Step::Pinheads => "Generate pinheads",
            Step::Classify => "Classification",
            Step::RoutingGround => "Routing to ground",
            Step::RoutingNonground => "Routing supports to model surface",
            Step::Headless => "Processing small holes",
            Step::Done => "Done",
            Step::Halt => "Halt",
            Step::Abort => "Abort",
        }
    }
}

/// Pure transition function of the state machine. `prev` is the resume
/// point stashed by `Pause`; the returned pair is the new state and the
/// new resume point.
fn next_step(step: Step, prev: Step, cmd: Command) -> (Step, Step) {
    match cmd {
        Command::StartResume => {
            let next = match step {
                Step::Begin => Step::Filter,
                Step::Filter => Step::Pinheads,
                Step::Pinheads => Step::Classify,
                Step::Classify => Step::RoutingGround,
                Step::RoutingGround => Step::RoutingNonground,
                Step::RoutingNonground => Step::Headless,
                Step::Headless => Step::Done,
                Step::Halt => prev,
                Step::Done | Step::Abort => step,
            };
            (next, prev)
        }
        Command::Pause => (Step::Halt, step),
        Command::Stop => (Step::Abort, prev),
        Command::Synch => (Step::Begin, prev),
    }
}

/// The outcome of a planning run.
#[derive(Debug)]
pub struct GeneratedSupports {
    /// The planned support tree. Empty when the run aborted.
    pub tree: SupportTree,
    /// Points with no room for a pinhead, left for future headless
    /// handling.
    pub headless_positions: Vec<Vec3>,
    /// Whether the run terminated in `Abort`.
    pub aborted: bool,
}

/// Intermediate per-run state shared by the stage workers.
#[derive(Debug, Default)]
struct PlannerData {
    /// Raw world-space support points.
    points: Vec<Vec3>,
    /// Positions that passed filtering, one head each.
    head_positions: Vec<Vec3>,
    /// Corrected normals, parallel to `head_positions`.
    head_normals: Vec<Vec3>,
    /// Positions with no room for a pinhead.
    headless_positions: Vec<Vec3>,
    /// Head indices whose straight-down ray reaches the build plate.
    ground_heads: Vec<usize>,
    /// Head indices whose straight-down ray hits the object.
    noground_heads: Vec<usize>,
    /// Straight-down hit distance per head (infinite for grounded ones).
    ground_heights: Vec<CoordF>,
    /// Clusters over the grounded subset (indices into `ground_heads`).
    ground_clusters: Vec<Vec<usize>>,
}

impl PlannerData {
    fn new(points: Vec<Vec3>) -> Self {
        Self {
            points,
            ..Default::default()
        }
    }

    fn reset(&mut self) {
        self.head_positions.clear();
        self.head_normals.clear();
        self.headless_positions.clear();
        self.ground_heads.clear();
        self.noground_heads.clear();
        self.ground_heights.clear();
        self.ground_clusters.clear();
    }

    /// Filter stage: deduplicate picks, correct normals, verify pinhead
    /// space.
    fn filter(&mut self, cfg: &SupportConfig, mesh: &MeshIndex) -> Result<()> {
        self.head_positions.clear();
        self.head_normals.clear();
        self.headless_positions.clear();

        // Near-coincident picks collapse to the first point of each pair.
        let aliases = cluster(&self.points, |a, b| a.distance(b) < D_SP, 2);
        let filtered: Vec<Vec3> = aliases.iter().map(|group| self.points[group[0]]).collect();

        let normals = mesh.face_normals(&filtered)?;

        let w = cfg.head_width_mm + cfg.head_back_radius_mm + 2.0 * cfg.head_front_radius_mm;
        for (&point, normal) in filtered.iter().zip(&normals) {
            let (polar, azimuth) = normal.spherical();

            // An upward-facing surface cannot hold a pinhead.
            if polar < FRAC_PI_2 {
                continue;
            }

            // Saturate the tilt to at most 45 degrees off vertical and
            // reassemble the corrected normal.
            let polar = polar.max(3.0 * PI / 4.0);
            let corrected = Vec3::from_spherical(polar, azimuth);

            // There must be room for the lower and upper pinhead along the
            // corrected normal; a miss (infinite distance) passes.
            let t = mesh.ray_hit(point + corrected * 0.1, corrected);
            if t > 2.0 * w {
                self.head_positions.push(point);
                self.head_normals.push(corrected);
            } else {
                self.headless_positions.push(point);
            }
        }

        debug!(
            "filter: {} picks -> {} heads, {} headless",
            self.points.len(),
            self.head_positions.len(),
            self.headless_positions.len()
        );
        Ok(())
    }

    /// Pinhead stage: append an untransformed head per filtered position.
    fn pinheads(&self, cfg: &SupportConfig, tree: &mut SupportTree) {
        for (position, normal) in self.head_positions.iter().zip(&self.head_normals) {
            tree.add_head(
                cfg.head_back_radius_mm,
                cfg.head_front_radius_mm,
                cfg.head_width_mm,
                *normal,
                *position,
            );
        }
    }

    /// Classify stage: split heads into grounded and mesh-anchored ones,
    /// cluster the grounded subset, and build the short mesh-anchored
    /// pillars right away.
    fn classify(&mut self, cfg: &SupportConfig, mesh: &MeshIndex, tree: &mut SupportTree) {
        self.ground_heads.clear();
        self.noground_heads.clear();
        self.ground_heights.clear();
        self.ground_clusters.clear();

        for (i, head) in tree.heads().iter().enumerate() {
            let t = mesh.ray_hit(head.junction_point(), Vec3::new(0.0, 0.0, -1.0));
            self.ground_heights.push(t);
            if t.is_infinite() {
                self.ground_heads.push(i);
            } else {
                self.noground_heads.push(i);
            }
        }

        // Grounded heads close together in XY can share a pillar; the
        // cluster size cap bounds how many picks one pillar serves.
        let gnd: Vec<Vec3> = self
            .ground_heads
            .iter()
            .map(|&i| self.head_positions[i])
            .collect();
        let d_base = 4.0 * cfg.base_radius_mm;
        self.ground_clusters = cluster(&gnd, |a, b| a.xy().distance(&b.xy()) < d_base, 4);

        debug!(
            "classify: {} grounded in {} clusters, {} mesh-anchored",
            self.ground_heads.len(),
            self.ground_clusters.len(),
            self.noground_heads.len()
        );

        // Mesh-anchored heads get a short pillar down to the surface hit,
        // terminated by an inverted pinhead glued on where it meets the
        // object.
        for &idx in &self.noground_heads {
            let head_id = HeadId(idx);
            {
                let head = tree.head_mut(head_id);
                head.transform();
                head.add_tail(cfg.pillar_radius_mm);
            }
            let (headend, stub, r_pin) = {
                let head = tree.head(head_id);
                (
                    head.junction_point(),
                    head.fullwidth() - head.r_back_mm,
                    head.r_pin_mm,
                )
            };
            let gh = self.ground_heights[idx];

            let mut terminator = Head::new(
                cfg.head_back_radius_mm,
                cfg.head_front_radius_mm,
                cfg.head_width_mm,
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(headend.x, headend.y, headend.z - gh - r_pin),
            );
            terminator.transform();

            let pillar_id = tree.add_pillar(
                head_id,
                Vec3::new(headend.x, headend.y, headend.z - gh + stub),
                cfg.pillar_radius_mm,
            );
            tree.pillar_mut(pillar_id).set_base_mesh(terminator.into_mesh());
        }
    }

    /// Routing stage for grounded heads: one based main pillar per
    /// cluster, side pillars bridged onto it, then ring weaving across
    /// cluster centroids.
    fn route_ground(&self, cfg: &SupportConfig, mesh: &MeshIndex, tree: &mut SupportTree) {
        let hbr = cfg.head_back_radius_mm;
        let descent = (-cfg.tilt).sin();
        let gnd_head_pt = |i: usize| self.head_positions[self.ground_heads[i]];

        let mut centroids: Vec<usize> = Vec::new();
        let mut centroid_pillars: BTreeMap<usize, PillarId> = BTreeMap::new();

        for group in &self.ground_clusters {
            let Some(local) = cluster_centroid(group, gnd_head_pt, |a, b| {
                a.xy().distance(&b.xy())
            }) else {
                continue;
            };
            let centroid = group[local];
            centroids.push(centroid);

            // The centroid's head carries the cluster's main pillar,
            // grounded and flared.
            let main_id = HeadId(self.ground_heads[centroid]);
            {
                let head = tree.head_mut(main_id);
                head.transform();
                head.add_tail(cfg.pillar_radius_mm);
            }
            let jh = tree.head(main_id).junction_point();
            let main_pillar = tree.add_pillar(main_id, Vec3::new(jh.x, jh.y, 0.0), cfg.pillar_radius_mm);
            tree.pillar_mut(main_pillar)
                .add_base(cfg.base_height_mm, cfg.base_radius_mm);
            centroid_pillars.insert(centroid, main_pillar);

            for (k, &member) in group.iter().enumerate() {
                if k == local {
                    continue;
                }
                let side_id = HeadId(self.ground_heads[member]);
                {
                    let head = tree.head_mut(side_id);
                    head.transform();
                    head.add_tail(cfg.pillar_radius_mm);
                }
                let (r_pillar, jstep, junction) = {
                    let side = tree.head(side_id);
                    (
                        side.request_pillar_radius(cfg.pillar_radius_mm),
                        side.fullwidth(),
                        side.junction_point(),
                    )
                };

                // Candidate anchor one junction step below the side head,
                // and its tilted landing point on the main pillar.
                let jp = junction - Vec3::new(0.0, 0.0, jstep);
                let d = jp.xy().distance(&jh.xy());
                let jn = Vec3::new(jh.x, jh.y, jp.z + d * descent);

                if jn.z > 0.0 {
                    let jjp = tree.add_junction(jp, hbr);
                    tree.add_pillar(side_id, jp, cfg.pillar_radius_mm);
                    let jjn = tree.add_junction(jn, hbr);
                    tree.add_bridge(jjp, jjn, r_pillar);
                } else {
                    // No space above ground for the connection: a
                    // dedicated grounded pillar serves this pick.
                    let pid = tree.add_pillar(side_id, Vec3::new(jp.x, jp.y, 0.0), cfg.pillar_radius_mm);
                    tree.pillar_mut(pid)
                        .add_base(cfg.base_height_mm, cfg.base_radius_mm);
                }
            }
        }

        // Peel the centroids into concentric rings and weave bridges along
        // each ring; connecting only ring neighbours keeps bridges from
        // crossing.
        let mut junction_index = PointGrid::new(JUNCTION_GRID_CELL);
        for (i, junction) in tree.junctions().iter().enumerate() {
            junction_index.insert(Vec3::new(junction.pos.x, junction.pos.y, 0.0), i as u32);
        }

        let mut rem = centroids;
        while !rem.is_empty() {
            rem.sort_unstable();
            let ring = convex_hull_2d(&rem, |i| gnd_head_pt(i).xy());
            debug!("pillar ring: {:?}", ring);

            let mut edges: Vec<(usize, usize)> = ring.windows(2).map(|w| (w[0], w[1])).collect();
            if cfg.close_ring && ring.len() > 2 {
                edges.push((ring[ring.len() - 1], ring[0]));
            }

            for (cur, next) in edges {
                let (Some(&cur_pillar), Some(&next_pillar)) =
                    (centroid_pillars.get(&cur), centroid_pillars.get(&next))
                else {
                    continue;
                };
                weave_bridges(cfg, mesh, tree, &mut junction_index, cur_pillar, next_pillar);
            }

            rem.retain(|i| !ring.contains(i));
        }
    }
}

/// Weave tilted bridges from `cur` towards `next`, descending junction by
/// junction while both pillars last and the visibility ray grants at least
/// the pillar separation in clearance.
fn weave_bridges(
    cfg: &SupportConfig,
    mesh: &MeshIndex,
    tree: &mut SupportTree,
    junction_index: &mut PointGrid,
    cur: PillarId,
    next: PillarId,
) {
    let (cur_r, cur_end, cur_head_junction) = {
        let pillar = tree.pillar(cur);
        (
            pillar.r,
            pillar.endpoint,
            tree.head(pillar.head).junction_point(),
        )
    };
    let (next_end, next_start_z) = {
        let pillar = tree.pillar(next);
        (
            pillar.endpoint,
            tree.head(pillar.head).junction_point().z,
        )
    };

    // Start from the highest junction already sitting on this pillar, or
    // from the head's junction point when there is none yet.
    let query_center = Vec3::new(cur_end.x, cur_end.y, 0.0);
    let mut best: Option<(CoordF, u32)> = None;
    for (_, id) in junction_index.query_radius(query_center, 2.0 * cur_r) {
        let z = tree.junctions()[id as usize].pos.z;
        let better = match best {
            None => true,
            Some((best_z, best_id)) => z > best_z || (z == best_z && id < best_id),
        };
        if better {
            best = Some((z, id));
        }
    }
    let mut sj = match best {
        Some((_, id)) => tree.junctions()[id as usize].pos,
        None => cur_head_junction,
    };

    let mut ej = next_end;
    let pillar_dist = sj.xy().distance(&ej.xy());
    if pillar_dist < crate::EPSILON {
        // Coincident pillar axes, nothing to weave.
        return;
    }
    let descent = (-cfg.tilt).sin();
    ej.z = sj.z + pillar_dist * descent;

    while next_end.z < ej.z && cur_end.z < sj.z {
        let clearance = mesh.ray_hit(sj, (ej - sj).normalized());
        if clearance >= pillar_dist && next_start_z > ej.z {
            let a = tree.add_junction(sj, cfg.head_back_radius_mm);
            let b = tree.add_junction(ej, cfg.head_back_radius_mm);
            tree.add_bridge(a, b, cur_r);
            junction_index.insert(Vec3::new(sj.x, sj.y, 0.0), a.0 as u32);
            junction_index.insert(Vec3::new(ej.x, ej.y, 0.0), b.0 as u32);
        }
        std::mem::swap(&mut sj, &mut ej);
        ej.z = sj.z + pillar_dist * descent;
    }
}

/// The support-tree generator: configuration plus the planning worker.
#[derive(Debug, Clone, Default)]
pub struct SupportGenerator {
    config: SupportConfig,
}

impl SupportGenerator {
    /// Create a generator with the given configuration.
    pub fn new(config: SupportConfig) -> Self {
        Self { config }
    }

    /// The generator's configuration.
    pub fn config(&self) -> &SupportConfig {
        &self.config
    }

    /// Plan a support tree for every instance of every object in `model`.
    ///
    /// Runs the staged pipeline to completion (or abort) on the calling
    /// thread, observing `controller` commands between stages.
    pub fn generate(&self, model: &Model, controller: &dyn Controller) -> GeneratedSupports {
        let mesh = MeshIndex::from_mesh(&model.combined_mesh());
        let mut data = PlannerData::new(model.support_points());
        let mut tree = SupportTree::new();

        let mut step = Step::Begin;
        let mut prev = Step::Begin;

        while step < Step::Done || step == Step::Halt {
            let cmd = controller.next_command(step == Step::Halt);
            let (next, next_prev) = next_step(step, prev, cmd);
            step = next;
            prev = next_prev;
            if cmd != Command::Synch {
                controller.status(step.progress(), step.label());
            }

            let outcome = match step {
                Step::Begin => {
                    data.reset();
                    tree = SupportTree::new();
                    Ok(())
                }
                Step::Filter => data.filter(&self.config, &mesh),
                Step::Pinheads => {
                    data.pinheads(&self.config, &mut tree);
                    Ok(())
                }
                Step::Classify => {
                    data.classify(&self.config, &mesh, &mut tree);
                    Ok(())
                }
                Step::RoutingGround => {
                    data.route_ground(&self.config, &mesh, &mut tree);
                    Ok(())
                }
                // Reserved stages and the control states do nothing.
                Step::RoutingNonground
                | Step::Headless
                | Step::Done
                | Step::Halt
                | Step::Abort => Ok(()),
            };

            if let Err(err) = outcome {
                warn!("support planning aborted: {err}");
                step = Step::Abort;
                controller.status(step.progress(), step.label());
            }
        }

        GeneratedSupports {
            tree,
            headless_positions: data.headless_positions,
            aborted: step == Step::Abort,
        }
    }
}

/// Generate supports for `model` and publish them as a new object whose
/// volumes are the individual primitive meshes.
///
/// Nothing is published when the run aborts. Returns whether it aborted.
pub fn add_sla_supports(
    model: &mut Model,
    cfg: &SupportConfig,
    controller: &dyn Controller,
) -> bool {
    let generated = SupportGenerator::new(cfg.clone()).generate(model, controller);
    if generated.aborted {
        return true;
    }

    let tree = &generated.tree;
    let object = model.add_object("supports");
    object.add_instance(ModelInstance::default());

    for head in tree.heads() {
        object.add_volume(head.mesh().clone());
        if let Some(tail) = head.tail() {
            object.add_volume(tail.mesh.clone());
        }
    }
    for pillar in tree.pillars() {
        object.add_volume(pillar.mesh().clone());
        if let Some(base) = pillar.base() {
            object.add_volume(base.clone());
        }
    }
    for junction in tree.junctions() {
        object.add_volume(junction.mesh().clone());
    }
    for bridge in tree.bridges() {
        object.add_volume(bridge.mesh().clone());
    }

    false
}
