use engine::boundaries::{BoundaryState, BoundaryType};
use engine::topology::TopologyEvent;
use engine::{SimulationParams, World};

fn topology_params() -> SimulationParams {
    let mut params = SimulationParams::default();
    params.toggles.plate_topology_changes = true;
    params.toggles.rift_propagation = true;
    params
}

#[test]
fn mature_rift_splits_the_parent_plate() {
    let mut world = World::new(topology_params()).unwrap();
    world.step_once().unwrap();

    // Promote a currently divergent boundary straight to a mature rift.
    let key = *world
        .boundaries
        .map
        .iter()
        .find(|(_, b)| b.boundary_type == BoundaryType::Divergent)
        .map(|(k, _)| k)
        .expect("a divergent boundary exists");
    {
        let b = world.boundaries.map.get_mut(&key).unwrap();
        b.state = BoundaryState::Rifting;
        b.rift_width_m = 1.0e9;
    }
    let plates_before = world.plates.len();
    let topo_before = world.topology_version;

    let stats = world.step_once().unwrap();
    let split = stats
        .events
        .iter()
        .find(|e| matches!(e, TopologyEvent::Split { .. }))
        .expect("split event fired");
    let TopologyEvent::Split { parent, children, .. } = split else { unreachable!() };
    assert_eq!(parent.0, key.0);
    assert!(world.plates.get(*parent).is_none());
    assert!(world.plates.get(children[0]).is_some());
    assert!(world.plates.get(children[1]).is_some());
    assert!(children[0].0 > parent.0 && children[1].0 > parent.0);
    assert_eq!(world.plates.len(), plates_before + 1);
    assert!(world.topology_version > topo_before);
    // Ownership was redistributed; no vertex points at a retired plate.
    for &a in &world.assignments {
        assert!(world.plates.get(engine::plates::PlateId(a)).is_some());
    }
}

#[test]
fn sustained_divergence_alone_produces_splits() {
    // Rift propagation stays off; fast divergence held past the duration
    // threshold must split on its own.
    let mut params = SimulationParams::default();
    params.toggles.plate_topology_changes = true;
    params.split_velocity_threshold = 0.01;
    params.split_duration_threshold_my = 10.0;
    let mut world = World::new(params).unwrap();

    let mut splits = 0usize;
    let mut merges = 0usize;
    for _ in 0..15 {
        let stats = world.step_once().unwrap();
        splits += stats.events.iter().filter(|e| matches!(e, TopologyEvent::Split { .. })).count();
        merges += stats.events.iter().filter(|e| matches!(e, TopologyEvent::Merge { .. })).count();
    }
    assert!(splits >= 1, "no split in 15 steps");
    assert_eq!(world.plates.len(), 20 + splits - merges);
    for e in &world.events {
        if let TopologyEvent::Split { parent, children, .. } = e {
            assert_ne!(children[0], children[1]);
            assert_ne!(*parent, children[0]);
            assert_ne!(*parent, children[1]);
        }
    }
}

#[test]
fn overstressed_convergent_boundary_merges_plates() {
    let mut params = topology_params();
    params.toggles.rift_propagation = false;
    params.merge_stress_threshold_mpa = 50.0;
    params.merge_area_ratio_threshold = 1.0;
    let mut world = World::new(params).unwrap();
    world.step_once().unwrap();

    let convergent: Vec<(u32, u32)> = world
        .boundaries
        .map
        .iter()
        .filter(|(_, b)| b.boundary_type == BoundaryType::Convergent)
        .map(|(&k, _)| k)
        .collect();
    assert!(!convergent.is_empty(), "a convergent boundary exists");
    for key in &convergent {
        world.boundaries.map.get_mut(key).unwrap().accumulated_stress_mpa = 100.0;
    }
    let plates_before = world.plates.len();

    let stats = world.step_once().unwrap();
    let merge = stats
        .events
        .iter()
        .find(|e| matches!(e, TopologyEvent::Merge { .. }))
        .expect("merge event fired");
    let TopologyEvent::Merge { winner, loser, .. } = merge else { unreachable!() };
    assert_eq!(world.plates.len(), plates_before - 1);
    assert!(world.plates.get(*loser).is_none());
    assert!(world.plates.get(*winner).is_some());
    assert!(world.assignments.iter().all(|&a| a != loser.0));
}

#[test]
fn events_accumulate_in_the_session_log() {
    let mut world = World::new(topology_params()).unwrap();
    world.step_once().unwrap();
    let key = *world
        .boundaries
        .map
        .iter()
        .find(|(_, b)| b.boundary_type == BoundaryType::Divergent)
        .map(|(k, _)| k)
        .expect("a divergent boundary exists");
    {
        let b = world.boundaries.map.get_mut(&key).unwrap();
        b.state = BoundaryState::Rifting;
        b.rift_width_m = 1.0e9;
    }
    world.step_once().unwrap();
    assert!(world
        .events
        .iter()
        .any(|e| matches!(e, TopologyEvent::Split { .. })));
}
