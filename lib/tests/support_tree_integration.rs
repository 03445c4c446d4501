//! Support Tree Integration Tests
//!
//! These tests run the full planning pipeline against small fixture
//! scenes and validate the structural properties of the generated trees:
//! pillar grounding, cluster routing, ring weaving, control flow and
//! determinism.

use sla_support::geometry::Vec3;
use sla_support::mesh::TriangleMesh;
use sla_support::model::{Model, ModelInstance};
use sla_support::support::{
    add_sla_supports, AutoController, Command, Controller, SupportConfig, SupportGenerator,
};
use std::cell::RefCell;
use std::collections::VecDeque;

/// A square plate facing downwards (outward normal (0, 0, -1)), the
/// canonical overhang to hang supports from.
fn downward_plate(center: Vec3, half: f64) -> TriangleMesh {
    let mut mesh = TriangleMesh::new();
    let v0 = mesh.add_vertex(center + Vec3::new(-half, -half, 0.0));
    let v1 = mesh.add_vertex(center + Vec3::new(-half, half, 0.0));
    let v2 = mesh.add_vertex(center + Vec3::new(half, half, 0.0));
    let v3 = mesh.add_vertex(center + Vec3::new(half, -half, 0.0));
    mesh.add_triangle(v0, v1, v2);
    mesh.add_triangle(v0, v2, v3);
    mesh
}

/// A model holding one plate object with the given support points (local
/// coordinates equal world coordinates, one default instance).
fn plate_model(center: Vec3, half: f64, points: &[Vec3]) -> Model {
    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(downward_plate(center, half));
    object.add_instance(ModelInstance::default());
    object.set_support_points(points.to_vec());
    model
}

fn standard_config() -> SupportConfig {
    SupportConfig::default()
}

/// Surface the planner's debug output when running with RUST_LOG set.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A controller replaying a fixed command script, then free-running.
struct ScriptedController {
    commands: RefCell<VecDeque<Command>>,
    statuses: RefCell<Vec<(u32, String)>>,
}

impl ScriptedController {
    fn new(script: &[Command]) -> Self {
        Self {
            commands: RefCell::new(script.iter().copied().collect()),
            statuses: RefCell::new(Vec::new()),
        }
    }
}

impl Controller for ScriptedController {
    fn next_command(&self, _block: bool) -> Command {
        self.commands
            .borrow_mut()
            .pop_front()
            .unwrap_or(Command::StartResume)
    }

    fn status(&self, percent: u32, message: &str) {
        self.statuses
            .borrow_mut()
            .push((percent, message.to_string()));
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_empty_support_points_give_empty_tree() {
    let model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[]);
    let controller = ScriptedController::new(&[]);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &controller);

    assert!(!generated.aborted);
    assert!(generated.tree.is_empty());
    assert!(generated.headless_positions.is_empty());
    let last = controller.statuses.borrow().last().cloned().unwrap();
    assert_eq!(last, (100, "Done".to_string()));
}

#[test]
fn test_single_point_grounded_pillar() {
    let model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(0.0, 0.0, 10.0)]);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.heads().len(), 1);
    assert_eq!(tree.pillars().len(), 1);
    assert!(tree.junctions().is_empty());
    assert!(tree.bridges().is_empty());

    // The overhang normal points straight down; the head hangs beneath
    // the pick.
    let head = &tree.heads()[0];
    assert!((head.dir - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-9);
    assert!((head.tr - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-9);

    // One grounded pillar with a flared base.
    let pillar = &tree.pillars()[0];
    assert!(pillar.endpoint.z.abs() < 1e-12);
    assert!(pillar.has_base());
    assert!((pillar.r - 0.3).abs() < 1e-12);
}

#[test]
fn test_near_coincident_picks_are_deduplicated() {
    let model = plate_model(
        Vec3::new(0.0, 0.0, 10.0),
        5.0,
        &[Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.05, 0.0, 10.0)],
    );
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    assert_eq!(generated.tree.heads().len(), 1);
    // The first point of the pair survives.
    assert!((generated.tree.heads()[0].tr - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-9);
}

#[test]
fn test_grounded_cluster_routes_through_centroid() {
    init_logging();
    // Three grounded picks chained within the clustering distance form one
    // cluster served by a single based pillar; the middle pick has the
    // smallest total 2D distance and is elected centroid.
    let points = [
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(2.0, 0.0, 10.0),
        Vec3::new(4.0, 0.0, 10.0),
    ];
    let model = plate_model(Vec3::new(2.0, 0.0, 10.0), 6.0, &points);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.heads().len(), 3);
    assert_eq!(tree.pillars().len(), 3);

    // Exactly one pillar (the centroid's) carries the flared base.
    let based: Vec<_> = tree.pillars().iter().filter(|p| p.has_base()).collect();
    assert_eq!(based.len(), 1);
    let main = based[0];
    assert!((main.endpoint.x - 2.0).abs() < 1e-9);
    assert!((main.endpoint.y - 0.0).abs() < 1e-9);

    // Each side head contributes one junction on itself and one landing
    // junction on the main pillar, tied by a bridge.
    assert_eq!(tree.junctions().len(), 4);
    assert_eq!(tree.bridges().len(), 2);
    let on_main = tree
        .junctions()
        .iter()
        .filter(|j| j.pos.xy().distance(&main.endpoint.xy()) < 1e-9)
        .count();
    assert_eq!(on_main, 2);

    // Bridges descend towards the main pillar.
    for bridge in tree.bridges() {
        assert!(bridge.ep.z < bridge.sp.z);
    }
}

#[test]
fn test_far_clusters_are_ring_woven() {
    // Two grounded picks beyond the clustering distance become separate
    // pillars; ring weaving ties them with one tilted bridge.
    let points = [Vec3::new(0.0, 0.0, 10.0), Vec3::new(10.0, 0.0, 10.0)];
    let model = plate_model(Vec3::new(5.0, 0.0, 10.0), 8.0, &points);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.pillars().len(), 2);
    assert!(tree.pillars().iter().all(|p| p.has_base()));
    assert_eq!(tree.bridges().len(), 1);
    assert_eq!(tree.junctions().len(), 2);

    // The woven bridge descends by the 2D span times sin(tilt).
    let bridge = &tree.bridges()[0];
    let span = bridge.sp.xy().distance(&bridge.ep.xy());
    let drop = bridge.sp.z - bridge.ep.z;
    assert!((drop - span * standard_config().tilt.sin()).abs() < 1e-9);
}

#[test]
fn test_obstructed_bridge_is_not_woven() {
    // A vertical wall between the two pillars blocks the tilted
    // visibility ray, so ring weaving must not create a bridge.
    let mut wall = TriangleMesh::new();
    let v0 = wall.add_vertex(Vec3::new(5.0, -2.0, 0.0));
    let v1 = wall.add_vertex(Vec3::new(5.0, 2.0, 0.0));
    let v2 = wall.add_vertex(Vec3::new(5.0, 2.0, 9.0));
    let v3 = wall.add_vertex(Vec3::new(5.0, -2.0, 9.0));
    wall.add_triangle(v0, v1, v2);
    wall.add_triangle(v0, v2, v3);

    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(downward_plate(Vec3::new(5.0, 0.0, 10.0), 8.0));
    object.add_volume(wall);
    object.add_instance(ModelInstance::default());
    object.set_support_points(vec![Vec3::new(0.0, 0.0, 10.0), Vec3::new(10.0, 0.0, 10.0)]);

    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.pillars().len(), 2);
    assert!(tree.bridges().is_empty());
    assert!(tree.junctions().is_empty());
}

#[test]
fn test_close_ring_adds_the_last_edge() {
    let points = [
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(10.0, 0.0, 10.0),
        Vec3::new(5.0, 8.66, 10.0),
    ];
    let model = plate_model(Vec3::new(5.0, 3.0, 10.0), 9.0, &points);

    let open = SupportGenerator::new(standard_config()).generate(&model, &AutoController);
    let mut closed_cfg = standard_config();
    closed_cfg.close_ring = true;
    let closed = SupportGenerator::new(closed_cfg).generate(&model, &AutoController);

    assert!(!open.aborted && !closed.aborted);
    assert!(closed.tree.bridges().len() > open.tree.bridges().len());
}

#[test]
fn test_mesh_anchored_pillar_terminates_on_object() {
    // A second, larger plate below the picks catches the straight-down
    // ray, so the pillar terminates on the object instead of the plate.
    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(downward_plate(Vec3::new(0.0, 0.0, 10.0), 3.0));
    object.add_volume(downward_plate(Vec3::new(0.0, 0.0, 5.0), 8.0));
    object.add_instance(ModelInstance::default());
    object.set_support_points(vec![Vec3::new(0.0, 0.0, 10.0)]);

    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.heads().len(), 1);
    assert_eq!(tree.pillars().len(), 1);
    assert!(tree.junctions().is_empty());

    // The pillar stops a stub length above the surface hit, and its base
    // is the inverted pinhead terminator rather than a flared disk.
    let head = &tree.heads()[0];
    let pillar = &tree.pillars()[0];
    let stub = head.fullwidth() - head.r_back_mm;
    let hit_z = 5.0;
    assert!((pillar.endpoint.z - (hit_z + stub)).abs() < 1e-9);
    assert!(pillar.has_base());
    let (base_min, _) = pillar.base().unwrap().bounding_box();
    assert!(base_min.z > 4.0 && base_min.z < 6.0);
}

#[test]
fn test_blocked_pinhead_goes_headless() {
    // A plate right below the pick leaves no room for the pinhead.
    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(downward_plate(Vec3::new(0.0, 0.0, 10.0), 3.0));
    object.add_volume(downward_plate(Vec3::new(0.0, 0.0, 8.0), 8.0));
    object.add_instance(ModelInstance::default());
    object.set_support_points(vec![Vec3::new(0.0, 0.0, 10.0)]);

    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    assert!(generated.tree.heads().is_empty());
    assert_eq!(generated.headless_positions.len(), 1);
}

#[test]
fn test_upward_facing_point_is_discarded() {
    // A cube's top face points upward: the pick is dropped entirely, not
    // routed to the headless set.
    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(TriangleMesh::cube(10.0));
    object.add_instance(ModelInstance::default());
    object.set_support_points(vec![Vec3::new(5.0, 5.0, 10.0)]);

    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    assert!(generated.tree.is_empty());
    assert!(generated.headless_positions.is_empty());
}

#[test]
fn test_point_off_surface_aborts() {
    let model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(0.0, 0.0, 3.0)]);
    let controller = ScriptedController::new(&[]);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &controller);

    assert!(generated.aborted);
    let last = controller.statuses.borrow().last().cloned().unwrap();
    assert_eq!(last, (0, "Abort".to_string()));
}

#[test]
fn test_instance_transform_places_supports() {
    let mut model = Model::new();
    let object = model.add_object("part");
    object.add_volume(downward_plate(Vec3::new(0.0, 0.0, 10.0), 5.0));
    object.add_instance(ModelInstance {
        offset: Vec3::new(20.0, 0.0, 0.0),
        ..Default::default()
    });
    object.set_support_points(vec![Vec3::new(0.0, 0.0, 10.0)]);

    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    let tree = &generated.tree;
    assert_eq!(tree.heads().len(), 1);
    assert!((tree.heads()[0].tr.x - 20.0).abs() < 1e-9);
    assert!((tree.pillars()[0].endpoint.x - 20.0).abs() < 1e-9);
}

// ============================================================================
// Structural invariants
// ============================================================================

#[test]
fn test_pillars_end_below_their_heads() {
    let points = [
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(3.5, 0.0, 10.0),
        Vec3::new(1.75, 3.0, 10.0),
        Vec3::new(12.0, 0.0, 10.0),
    ];
    let model = plate_model(Vec3::new(4.0, 1.5, 10.0), 12.0, &points);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    for pillar in generated.tree.pillars() {
        let head = generated.tree.head(pillar.head);
        assert!(pillar.endpoint.z <= head.junction_point().z + 1e-9);
    }
}

#[test]
fn test_head_junction_point_identity() {
    let model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(1.0, -1.0, 10.0)]);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    for head in generated.tree.heads() {
        let expected =
            head.tr + head.dir * (2.0 * head.r_pin_mm + head.width_mm + head.r_back_mm);
        assert!((head.junction_point() - expected).length() < 1e-9);
    }
}

#[test]
fn test_bridge_geometry_matches_junctions() {
    let points = [Vec3::new(0.0, 0.0, 10.0), Vec3::new(3.5, 0.0, 10.0)];
    let model = plate_model(Vec3::new(1.75, 0.0, 10.0), 6.0, &points);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &AutoController);

    assert!(!generated.aborted);
    assert!(!generated.tree.bridges().is_empty());
    for bridge in generated.tree.bridges() {
        // Both endpoints coincide with junction spheres.
        for endpoint in [bridge.sp, bridge.ep] {
            assert!(generated
                .tree
                .junctions()
                .iter()
                .any(|j| j.pos.distance(&endpoint) < 1e-9));
        }
        assert!(!bridge.mesh().is_empty());
    }
}

#[test]
fn test_generation_is_deterministic() {
    init_logging();
    let points = [
        Vec3::new(0.0, 0.0, 10.0),
        Vec3::new(3.5, 0.0, 10.0),
        Vec3::new(1.75, 3.0, 10.0),
        Vec3::new(12.0, 1.0, 10.0),
        Vec3::new(11.0, 9.0, 10.0),
    ];
    let model = plate_model(Vec3::new(5.0, 4.0, 10.0), 14.0, &points);
    let generator = SupportGenerator::new(standard_config());

    let first = generator.generate(&model, &AutoController);
    let second = generator.generate(&model, &AutoController);

    assert_eq!(first.tree.heads().len(), second.tree.heads().len());
    assert_eq!(first.tree.pillars().len(), second.tree.pillars().len());
    assert_eq!(first.tree.junctions().len(), second.tree.junctions().len());
    assert_eq!(first.tree.bridges().len(), second.tree.bridges().len());

    for (a, b) in first
        .tree
        .junctions()
        .iter()
        .zip(second.tree.junctions().iter())
    {
        assert_eq!(a.pos, b.pos);
    }
    for (a, b) in first.tree.bridges().iter().zip(second.tree.bridges().iter()) {
        assert_eq!(a.sp, b.sp);
        assert_eq!(a.ep, b.ep);
    }
}

// ============================================================================
// Control flow and publication
// ============================================================================

#[test]
fn test_pause_resume_completes() {
    let model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(0.0, 0.0, 10.0)]);
    let controller = ScriptedController::new(&[
        Command::StartResume, // Begin -> Filter
        Command::Pause,       // -> Halt
        Command::StartResume, // Halt -> Filter
    ]);
    let generated = SupportGenerator::new(standard_config()).generate(&model, &controller);

    assert!(!generated.aborted);
    assert_eq!(generated.tree.heads().len(), 1);

    let statuses = controller.statuses.borrow();
    assert!(statuses.contains(&(0, "Halt".to_string())));
    assert_eq!(statuses.last().unwrap(), &(100, "Done".to_string()));
}

#[test]
fn test_stop_aborts_and_publishes_nothing() {
    let mut model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(0.0, 0.0, 10.0)]);
    let controller =
        ScriptedController::new(&[Command::StartResume, Command::Pause, Command::Stop]);

    let aborted = add_sla_supports(&mut model, &standard_config(), &controller);
    assert!(aborted);
    assert_eq!(model.objects().len(), 1);
}

#[test]
fn test_add_sla_supports_publishes_volumes() {
    let mut model = plate_model(Vec3::new(0.0, 0.0, 10.0), 5.0, &[Vec3::new(0.0, 0.0, 10.0)]);

    let aborted = add_sla_supports(&mut model, &standard_config(), &AutoController);
    assert!(!aborted);
    assert_eq!(model.objects().len(), 2);

    let supports = &model.objects()[1];
    assert_eq!(supports.name(), "supports");
    assert_eq!(supports.instances().len(), 1);
    // One head, its tail, the pillar shaft and the flared base.
    assert_eq!(supports.volumes().len(), 4);
    assert!(supports.volumes().iter().all(|v| !v.is_empty()));
}
