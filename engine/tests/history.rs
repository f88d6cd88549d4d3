use engine::{Session, SimulationParams};

fn params() -> SimulationParams {
    let mut params = SimulationParams::default();
    params.toggles.continental_erosion = true;
    params.toggles.sediment_transport = true;
    params
}

#[test]
fn undo_redo_restores_bit_identical_fields() {
    let mut session = Session::new(params()).unwrap();
    session.advance_steps(4).unwrap();
    let elevation = session.world().fields.elevation_m.clone();
    let offsets = session.world().fields.surface_offset_m.clone();
    let assignments = session.world().assignments.clone();

    session.advance_steps(2).unwrap();
    assert!(session.undo());
    assert!(session.undo());
    assert_eq!(session.world().clock.step, 4);
    assert_eq!(session.world().fields.elevation_m, elevation);
    assert_eq!(session.world().fields.surface_offset_m, offsets);
    assert_eq!(session.world().assignments, assignments);

    assert!(session.redo());
    assert!(session.redo());
    assert!(!session.redo());
    assert_eq!(session.world().clock.step, 6);
}

#[test]
fn resuming_from_an_undone_state_replays_identically() {
    let mut session = Session::new(params()).unwrap();
    session.advance_steps(6).unwrap();
    let at_six = session.world().fields.elevation_m.clone();

    session.undo();
    session.undo();
    session.advance_steps(2).unwrap();
    assert_eq!(session.world().clock.step, 6);
    assert_eq!(session.world().fields.elevation_m, at_six);
    // The redo branch was truncated by the replay.
    assert!(!session.redo());
}

#[test]
fn ring_capacity_bounds_retained_snapshots() {
    let mut p = params();
    p.history_capacity = 5;
    let mut session = Session::new(p).unwrap();
    session.advance_steps(12).unwrap();
    let (len, cursor) = session.history_len();
    assert_eq!(len, 5);
    assert_eq!(cursor, 4);
    // Only four undos are possible once older snapshots were evicted.
    let mut undos = 0;
    while session.undo() {
        undos += 1;
    }
    assert_eq!(undos, 4);
    assert_eq!(session.world().clock.step, 8);
}

#[test]
fn jump_lands_on_the_requested_snapshot() {
    let mut session = Session::new(params()).unwrap();
    session.advance_steps(5).unwrap();
    assert!(session.jump_to_history_index(0));
    assert_eq!(session.world().clock.step, 0);
    assert!(session.jump_to_history_index(3));
    assert_eq!(session.world().clock.step, 3);
    assert!(!session.jump_to_history_index(99));
    assert_eq!(session.world().clock.step, 3);
}

#[test]
fn reset_rebuilds_the_initial_state() {
    let mut session = Session::new(params()).unwrap();
    session.advance_steps(4).unwrap();
    let initial = Session::new(params()).unwrap().world().fields.elevation_m.clone();
    session.reset().unwrap();
    assert_eq!(session.world().clock.step, 0);
    assert_eq!(session.world().fields.elevation_m, initial);
    assert_eq!(session.history_len(), (1, 0));
    assert!(session.metrics().is_empty());
}
