//! Plate topology events: divergence-driven splits and stress-driven merges.
//!
//! At most one split and one merge fire per step, selected deterministically
//! (widest rift, highest stress; BTreeMap key order breaks ties). Plate ids
//! only grow; retired ids are never reused within a session.

use orogen_geo::{rotate_about_axis, Vec3};

use crate::boundaries::{Boundaries, BoundaryState, BoundaryType};
use crate::config::SimulationParams;
use crate::plates::{plate_areas_km2, Plate, PlateId, Plates};
use crate::mesh::IcosphereMesh;

/// Angular offset between a split parent's centroid and each child centroid.
const SPLIT_CENTROID_OFFSET_RAD: f64 = 2.0 * std::f64::consts::PI / 180.0;

/// A discrete change to the plate census, recorded in the step log.
#[derive(Clone, Debug, PartialEq)]
pub enum TopologyEvent {
    /// A rift crossed the split threshold and the parent plate divided.
    Split {
        /// Retired parent plate.
        parent: PlateId,
        /// The two freshly allocated children.
        children: [PlateId; 2],
        /// Simulation time of the event (My).
        time_my: f64,
    },
    /// A small plate was absorbed across an over-stressed convergent boundary.
    Merge {
        /// Surviving plate.
        winner: PlateId,
        /// Retired plate.
        loser: PlateId,
        /// Simulation time of the event (My).
        time_my: f64,
    },
    /// A terrane was lifted off its source plate.
    TerraneExtracted {
        /// Terrane identifier.
        terrane: u32,
        /// Plate it was carved from.
        source: PlateId,
        /// Simulation time of the event (My).
        time_my: f64,
    },
    /// A terrane was sutured onto a target plate.
    TerraneReattached {
        /// Terrane identifier.
        terrane: u32,
        /// Plate it accreted onto.
        target: PlateId,
        /// Simulation time of the event (My).
        time_my: f64,
    },
}

/// Detect the strongest qualifying divergent boundary and split the
/// smaller-id plate of its pair into two children. A boundary qualifies with
/// a mature rift (width over threshold) or with fast divergence sustained
/// past the duration threshold; the velocity arm fires with or without rift
/// propagation enabled. Returns the event, or `None` when nothing qualifies.
/// At most one split per call.
///
/// The children's angular-velocity vectors sum to twice the parent's, so the
/// split conserves the pair's net rotation; the divergence component is added
/// along the rift tangent.
pub fn detect_and_apply_split(
    plates: &mut Plates,
    boundaries: &Boundaries,
    params: &SimulationParams,
    t_my: f64,
) -> Option<TopologyEvent> {
    if !params.toggles.plate_topology_changes {
        return None;
    }
    let mut best: Option<(&(u32, u32), (f64, f64))> = None;
    for (key, b) in &boundaries.map {
        let rift_mature = b.state == BoundaryState::Rifting
            && b.rift_width_m >= params.rift_split_threshold_m;
        let sustained_fast = b.boundary_type == BoundaryType::Divergent
            && b.relative_velocity_rad_my > params.split_velocity_threshold
            && b.divergent_duration_my > params.split_duration_threshold_my;
        if !rift_mature && !sustained_fast {
            continue;
        }
        // Widest rift first, fastest divergence second; strictly-greater
        // keeps the first (lowest) key on ties.
        let score = (b.rift_width_m, b.relative_velocity_rad_my);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((key, score));
        }
    }
    let (&(ia, _ib), _) = best?;
    let boundary = &boundaries.map[&(ia, _ib)];

    let parent_id = PlateId(ia);
    let parent = plates.get(parent_id)?.clone();

    let tangent = boundary.tangent;
    let omega_parent = parent.omega();
    let delta = tangent.scale(0.5 * params.split_velocity_threshold);
    let omega_a = omega_parent.add(delta);
    let omega_b = omega_parent.sub(delta);

    let centroid_a = rotate_about_axis(parent.centroid, tangent, SPLIT_CENTROID_OFFSET_RAD);
    let centroid_b = rotate_about_axis(parent.centroid, tangent, -SPLIT_CENTROID_OFFSET_RAD);

    let id_a = plates.allocate_id();
    let id_b = plates.allocate_id();
    let make_child = |id: PlateId, centroid: Vec3, omega: Vec3| -> Plate {
        let speed = omega.length();
        let axis = if speed > 0.0 { omega.scale(1.0 / speed) } else { parent.euler_pole_axis };
        Plate {
            id,
            centroid,
            reference_centroid: centroid,
            euler_pole_axis: axis,
            angular_velocity_rad_my: speed,
            crust_type: parent.crust_type,
            crust_thickness_km: parent.crust_thickness_km,
            sim_vertices: parent.sim_vertices.clone(),
        }
    };
    let child_a = make_child(id_a, centroid_a, omega_a);
    let child_b = make_child(id_b, centroid_b, omega_b);

    let dense = plates.dense_index(parent_id)?;
    plates.plates.remove(dense);
    plates.plates.push(child_a);
    plates.plates.push(child_b);
    plates.rebuild_index();

    println!(
        "[topology] split plate {} -> {} + {} at t={t_my} My",
        parent_id.0, id_a.0, id_b.0
    );
    Some(TopologyEvent::Split { parent: parent_id, children: [id_a, id_b], time_my: t_my })
}

/// Detect the most stressed qualifying convergent boundary and absorb its
/// smaller plate into the larger one. The winner takes an area-weighted blend
/// of both angular velocities and the loser's render vertices. At most one
/// merge per call.
pub fn detect_and_apply_merge(
    render: &IcosphereMesh,
    assignments: &mut [u32],
    plates: &mut Plates,
    boundaries: &Boundaries,
    params: &SimulationParams,
    t_my: f64,
) -> Option<TopologyEvent> {
    if !params.toggles.plate_topology_changes {
        return None;
    }
    let areas = plate_areas_km2(render, assignments, plates, params.planet_radius_m);
    let area_of = |id: PlateId| -> Option<f64> { plates.dense_index(id).map(|i| areas[i]) };

    let mut best: Option<((u32, u32), f64)> = None;
    for (&key, b) in &boundaries.map {
        if b.boundary_type != BoundaryType::Convergent
            || b.accumulated_stress_mpa < params.merge_stress_threshold_mpa
        {
            continue;
        }
        let (aa, ab) = (area_of(PlateId(key.0))?, area_of(PlateId(key.1))?);
        let (small, large) = if aa < ab { (aa, ab) } else { (ab, aa) };
        if large <= 0.0 || small / large >= params.merge_area_ratio_threshold {
            continue;
        }
        if best.map_or(true, |(_, s)| b.accumulated_stress_mpa > s) {
            best = Some((key, b.accumulated_stress_mpa));
        }
    }
    let ((ia, ib), _) = best?;
    let (area_a, area_b) = (area_of(PlateId(ia))?, area_of(PlateId(ib))?);
    // Equal areas fall back to retiring the larger id.
    let (winner_id, loser_id) =
        if area_a > area_b { (PlateId(ia), PlateId(ib)) } else { (PlateId(ib), PlateId(ia)) };
    let (area_w, area_l) = if winner_id == PlateId(ia) { (area_a, area_b) } else { (area_b, area_a) };

    let loser = plates.get(loser_id)?.clone();
    let total = area_w + area_l;
    {
        let winner = plates.get_mut(winner_id)?;
        let omega = winner
            .omega()
            .scale(area_w / total)
            .add(loser.omega().scale(area_l / total));
        let speed = omega.length();
        if speed > 0.0 {
            winner.euler_pole_axis = omega.scale(1.0 / speed);
            winner.angular_velocity_rad_my = speed;
        }
        winner.centroid = winner
            .centroid
            .scale(area_w / total)
            .add(loser.centroid.scale(area_l / total))
            .normalized();
        winner.reference_centroid = winner.centroid;
        winner.sim_vertices.extend_from_slice(&loser.sim_vertices);
    }

    for a in assignments.iter_mut() {
        if *a == loser_id.0 {
            *a = winner_id.0;
        }
    }
    let dense = plates.dense_index(loser_id)?;
    plates.plates.remove(dense);
    plates.rebuild_index();

    println!(
        "[topology] merge plate {} into {} at t={t_my} My",
        loser_id.0, winner_id.0
    );
    Some(TopologyEvent::Merge { winner: winner_id, loser: loser_id, time_my: t_my })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plates::assign_voronoi;

    fn rifting_world() -> (IcosphereMesh, IcosphereMesh, Plates, Vec<u32>, Boundaries) {
        let sim = IcosphereMesh::build(0);
        let render = IcosphereMesh::build(3);
        let mut params = SimulationParams::default();
        params.toggles.plate_topology_changes = true;
        let plates = Plates::generate(&sim, &params);
        let assignments = assign_voronoi(&render, &plates, None);
        let boundaries = Boundaries::rebuild(&render, &assignments, None);
        (sim, render, plates, assignments, boundaries)
    }

    #[test]
    fn split_requires_toggle() {
        let (_sim, _render, mut plates, _assignments, mut boundaries) = rifting_world();
        if let Some(b) = boundaries.map.values_mut().next() {
            b.state = BoundaryState::Rifting;
            b.rift_width_m = 1.0e9;
        }
        let params = SimulationParams::default();
        assert!(detect_and_apply_split(&mut plates, &boundaries, &params, 0.0).is_none());
    }

    #[test]
    fn split_conserves_net_rotation_and_grows_ids() {
        let (_sim, _render, mut plates, _assignments, mut boundaries) = rifting_world();
        let mut params = SimulationParams::default();
        params.toggles.plate_topology_changes = true;
        let key = *boundaries.map.keys().next().unwrap();
        {
            let b = boundaries.map.get_mut(&key).unwrap();
            b.state = BoundaryState::Rifting;
            b.rift_width_m = params.rift_split_threshold_m + 1.0;
        }
        let parent_omega = plates.get(PlateId(key.0)).unwrap().omega();
        let before = plates.len();
        let event = detect_and_apply_split(&mut plates, &boundaries, &params, 4.0).unwrap();
        match event {
            TopologyEvent::Split { parent, children, time_my } => {
                assert_eq!(parent, PlateId(key.0));
                assert_eq!(time_my, 4.0);
                assert_eq!(plates.len(), before + 1);
                assert!(plates.get(parent).is_none());
                let sum = plates
                    .get(children[0])
                    .unwrap()
                    .omega()
                    .add(plates.get(children[1]).unwrap().omega());
                let twice = parent_omega.scale(2.0);
                assert!(sum.sub(twice).length() < 1e-12);
                assert!(children[0].0 >= before as u32);
            }
            other => panic!("expected split, got {other:?}"),
        }
    }

    #[test]
    fn sustained_fast_divergence_splits_without_a_rift() {
        let (_sim, _render, mut plates, _assignments, mut boundaries) = rifting_world();
        let mut params = SimulationParams::default();
        params.toggles.plate_topology_changes = true;
        params.split_velocity_threshold = 0.01;
        params.split_duration_threshold_my = 10.0;
        let key = *boundaries.map.keys().next().unwrap();
        {
            let b = boundaries.map.get_mut(&key).unwrap();
            b.boundary_type = BoundaryType::Divergent;
            b.state = BoundaryState::Active;
            b.relative_velocity_rad_my = 0.05;
            b.divergent_duration_my = 12.0;
            b.rift_width_m = 0.0;
        }
        let before = plates.len();
        let event = detect_and_apply_split(&mut plates, &boundaries, &params, 2.0);
        assert!(matches!(event, Some(TopologyEvent::Split { .. })));
        assert_eq!(plates.len(), before + 1);
    }

    #[test]
    fn slow_or_brief_divergence_does_not_split() {
        let (_sim, _render, mut plates, _assignments, mut boundaries) = rifting_world();
        let mut params = SimulationParams::default();
        params.toggles.plate_topology_changes = true;
        let key = *boundaries.map.keys().next().unwrap();
        {
            let b = boundaries.map.get_mut(&key).unwrap();
            b.boundary_type = BoundaryType::Divergent;
            b.state = BoundaryState::Active;
            // Fast but not sustained long enough.
            b.relative_velocity_rad_my = params.split_velocity_threshold * 2.0;
            b.divergent_duration_my = params.split_duration_threshold_my / 2.0;
        }
        assert!(detect_and_apply_split(&mut plates, &boundaries, &params, 2.0).is_none());
    }

    #[test]
    fn merge_absorbs_smaller_plate() {
        let (_sim, render, mut plates, mut assignments, mut boundaries) = rifting_world();
        let mut params = SimulationParams::default();
        params.toggles.plate_topology_changes = true;
        params.merge_area_ratio_threshold = 1.0;
        let key = *boundaries.map.keys().next().unwrap();
        {
            let b = boundaries.map.get_mut(&key).unwrap();
            b.boundary_type = BoundaryType::Convergent;
            b.accumulated_stress_mpa = 100.0;
        }
        let before = plates.len();
        let event = detect_and_apply_merge(
            &render, &mut assignments, &mut plates, &boundaries, &params, 6.0,
        );
        let Some(TopologyEvent::Merge { winner, loser, .. }) = event else {
            panic!("expected merge, got {event:?}");
        };
        assert_eq!(plates.len(), before - 1);
        assert!(plates.get(loser).is_none());
        assert!(assignments.iter().all(|&a| a != loser.0));
        assert!(plates.get(winner).is_some());
    }
}
