use engine::fields::MANTLE_BASELINE_K;
use engine::{Session, SimulationParams};

fn surface_params() -> SimulationParams {
    let mut params = SimulationParams::default();
    params.toggles.continental_erosion = true;
    params.toggles.oceanic_dampening = true;
    params.toggles.sediment_transport = true;
    params.toggles.hydraulic_erosion = true;
    params
}

#[test]
fn steps_commit_in_order_with_consistent_stats() {
    let mut session = Session::new(surface_params()).unwrap();
    let stats = session.advance_steps(5).unwrap();
    assert_eq!(stats.len(), 5);
    for (k, s) in stats.iter().enumerate() {
        assert_eq!(s.step, k as u64 + 1);
        assert_eq!(s.time_my, 2.0 * (k as f64 + 1.0));
        assert!(s.surface.mass_balance_error() <= 0.05);
        assert!(s.hydraulic.mass_balance_error() <= 0.05);
        assert_eq!(s.hydraulic.unrouted_vertices, 0);
        let w = session.world();
        let classes = s.boundaries.divergent + s.boundaries.convergent + s.boundaries.transform;
        assert_eq!(w.plates.len(), s.plate_count);
        assert!(classes as usize <= w.boundaries.map.len());
    }
    assert_eq!(session.world().clock.step, 5);
    assert_eq!(session.world().clock.time_my, 10.0);
}

#[test]
fn fields_stay_physical_over_a_run() {
    let mut session = Session::new(surface_params()).unwrap();
    session.advance_steps(10).unwrap();
    let w = session.world();
    for &e in &w.fields.elevation_m {
        assert!(e.abs() <= w.params.max_elevation_m);
    }
    for &s in &w.fields.stress_mpa {
        assert!((0.0..=100.0).contains(&s));
    }
    for &t in &w.fields.temperature_k {
        assert!(t >= MANTLE_BASELINE_K);
    }
    for &a in &w.fields.crust_age_my {
        assert!(a >= 0.0);
    }
    for &s in &w.fields.sediment_m {
        assert!(s >= 0.0);
    }
    assert!(w.fields.erosion_rate_m_my.iter().any(|&r| r != 0.0));
}

#[test]
fn amplified_equals_base_when_amplification_inactive() {
    let mut session = Session::new(SimulationParams::default()).unwrap();
    session.advance_steps(3).unwrap();
    let w = session.world();
    assert_eq!(w.fields.amplified_elevation_m, w.fields.elevation_m);
    assert!(w.stageb_ready());
}

#[test]
fn default_toggles_produce_no_topology_events() {
    let mut session = Session::new(SimulationParams::default()).unwrap();
    session.advance_steps(8).unwrap();
    assert!(session.world().events.is_empty());
    assert_eq!(session.world().topology_version, 0);
    assert_eq!(session.world().surface_version, 8);
}

#[test]
fn disabled_surface_toggles_leave_offsets_untouched() {
    let mut session = Session::new(SimulationParams::default()).unwrap();
    session.advance_steps(4).unwrap();
    let w = session.world();
    assert!(w.fields.surface_offset_m.iter().all(|&o| o == 0.0));
    assert!(w.fields.sediment_m.iter().all(|&s| s == 0.0));
}
