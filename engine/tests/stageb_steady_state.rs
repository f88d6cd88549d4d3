use engine::plates::CrustType;
use engine::{Session, SimulationParams, World};

fn amplified_params() -> SimulationParams {
    let mut params = SimulationParams::default();
    params.toggles.oceanic_amplification = true;
    params.toggles.oceanic_anisotropy = true;
    params.min_amplification_lod = 3;
    params
}

#[test]
fn ridge_cache_settles_once_the_surface_stops_moving() {
    let mut world = World::new(amplified_params()).unwrap();
    // Freeze the plates and age the floor so per-step elevation deltas fall
    // below the dirty threshold.
    for p in &mut world.plates.plates {
        p.angular_velocity_rad_my = 0.0;
    }
    for a in &mut world.fields.crust_age_my {
        *a = 400.0;
    }
    for _ in 0..8 {
        world.step_once().unwrap();
    }
    let stats = world.step_once().unwrap();
    assert!(stats.ridge.evaluated > 0);
    assert!(
        stats.ridge.hit_rate() >= 0.99,
        "hit rate {} with {} evaluated",
        stats.ridge.hit_rate(),
        stats.ridge.evaluated
    );
    assert!(stats.ridge.motion_rate() <= 0.001);
}

#[test]
fn amplification_only_touches_oceanic_floor() {
    let mut session = Session::new(amplified_params()).unwrap();
    session.advance_steps(2).unwrap();
    let w = session.world();
    assert!(w.stageb_ready());
    let mut changed = 0usize;
    for (i, (&amp, &base)) in
        w.fields.amplified_elevation_m.iter().zip(&w.fields.elevation_m).enumerate()
    {
        let oceanic = w
            .plates
            .get(engine::plates::PlateId(w.assignments[i]))
            .map(|p| p.crust_type)
            == Some(CrustType::Oceanic);
        if amp != base {
            changed += 1;
            assert!(oceanic, "continental vertex {i} was amplified");
            assert!(amp <= w.params.sea_level_m);
        }
    }
    assert!(changed > 0);
}

#[test]
fn skip_toggle_passes_base_through_the_whole_pipeline() {
    let mut params = amplified_params();
    params.toggles.skip_cpu_amplification = true;
    let mut session = Session::new(params).unwrap();
    session.advance_steps(2).unwrap();
    let w = session.world();
    assert_eq!(w.fields.amplified_elevation_m, w.fields.elevation_m);
}

#[test]
fn manual_topology_change_stales_the_amplified_field() {
    let mut params = amplified_params();
    params.render_subdivision_level = 4;
    let mut session = Session::new(params).unwrap();
    session.advance_steps(1).unwrap();
    assert!(session.world().stageb_ready());

    let w = session.world();
    let plate = w
        .plates
        .plates
        .iter()
        .find(|p| p.crust_type == CrustType::Continental)
        .expect("a continental plate exists")
        .id;
    let region: Vec<u32> = (0..w.render_mesh.vertices.len() as u32)
        .filter(|&v| w.assignments[v as usize] == plate.0)
        .collect();
    session.extract_terrane(&region).unwrap();
    assert!(!session.world().stageb_ready());

    session.advance_steps(1).unwrap();
    assert!(session.world().stageb_ready());
}
