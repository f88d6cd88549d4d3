//! Plate boundary map, classification, and lifecycle state machine.
//!
//! Boundaries are keyed by the ordered pair (min, max) of plate ids in a
//! `BTreeMap`, so iteration is deterministic. Classification decomposes the
//! relative velocity at the boundary midpoint into across-boundary and
//! along-boundary components.

use orogen_geo::{geodesic_distance, Vec3};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::SimulationParams;
use crate::mesh::IcosphereMesh;
use crate::plates::{PlateId, Plates};

/// Boundary kinematic class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryType {
    /// Plates moving apart along the boundary normal.
    Divergent,
    /// Plates moving together.
    Convergent,
    /// Tangential motion dominates.
    Transform,
}

/// Boundary lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryState {
    /// Newly formed; below the activity threshold so far.
    Nascent,
    /// Sustained motion above threshold.
    Active,
    /// Activity dropped below threshold.
    Dormant,
    /// Sustained divergence building a rift (precedes a split).
    Rifting,
}

/// Relative speed (rad/My) above which a boundary counts as active.
pub const ACTIVITY_THRESHOLD_RAD_MY: f64 = 0.02;
/// Sustained duration (My) required before Nascent promotes to Active.
pub const ACTIVITY_SUSTAIN_MY: f64 = 10.0;
/// Stress decay time constant on divergent boundaries (My).
pub const STRESS_DECAY_TAU_MY: f64 = 10.0;
/// Stress cap (MPa).
pub const STRESS_CAP_MPA: f64 = 100.0;
/// Transform boundaries relax toward this steady-state stress (MPa).
pub const TRANSFORM_STEADY_STRESS_MPA: f64 = 5.0;
/// Stress accumulated per My per rad/My of convergence (MPa).
const STRESS_ACCUM_COEFF: f64 = 50.0;
/// Across-boundary speed (rad/My) below which motion counts as tangential.
const CLASSIFY_TAU_RAD_MY: f64 = 1.0e-3;
/// Gaussian kernel width for stress interpolation (radians).
const STRESS_KERNEL_SIGMA_RAD: f64 = 0.08;

/// One boundary between two adjacent plates.
#[derive(Clone, Debug, PartialEq)]
pub struct PlateBoundary {
    /// Render vertices sitting on either side of the shared edge.
    pub shared_edge_vertices: Vec<u32>,
    /// Current kinematic class.
    pub boundary_type: BoundaryType,
    /// Lifecycle state.
    pub state: BoundaryState,
    /// Accumulated stress, 0..=100 MPa.
    pub accumulated_stress_mpa: f64,
    /// |relative velocity| at the midpoint (rad/My).
    pub relative_velocity_rad_my: f64,
    /// Time spent continuously divergent (My).
    pub divergent_duration_my: f64,
    /// Time spent continuously convergent (My).
    pub convergent_duration_my: f64,
    /// Accumulated rift width (m); nonzero only while Rifting.
    pub rift_width_m: f64,
    /// Simulation time of the last state change (My).
    pub state_transition_time_my: f64,
    /// Boundary midpoint on the unit sphere.
    pub midpoint: Vec3,
    /// Unit tangent along the boundary at the midpoint.
    pub tangent: Vec3,
    /// Total shared-edge arc length (radians).
    pub edge_length_rad: f64,
}

/// Summary counts by class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundaryStats {
    /// Divergent boundary count.
    pub divergent: u32,
    /// Convergent boundary count.
    pub convergent: u32,
    /// Transform boundary count.
    pub transform: u32,
}

/// The full boundary map for the current topology.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Boundaries {
    /// Boundary per ordered plate-id pair (min, max).
    pub map: BTreeMap<(u32, u32), PlateBoundary>,
    /// Class counts refreshed by [`update_kinematics`].
    pub stats: BoundaryStats,
}

impl Boundaries {
    /// Rebuild the boundary map from the render mesh and the current Voronoi
    /// assignment, carrying lifecycle fields over for pairs that persist.
    ///
    /// Boundaries whose plate pair vanished are dropped; new pairs start
    /// Nascent with zeroed counters.
    pub fn rebuild(render: &IcosphereMesh, assignments: &[u32], previous: Option<&Self>) -> Self {
        let mut verts: BTreeMap<(u32, u32), Vec<u32>> = BTreeMap::new();
        let mut lengths: BTreeMap<(u32, u32), f64> = BTreeMap::new();
        for u in 0..render.vertices.len() {
            let start = render.adjacency_offsets[u] as usize;
            let end = render.adjacency_offsets[u + 1] as usize;
            for &v in &render.adjacency[start..end] {
                if (v as usize) <= u {
                    continue;
                }
                let (pa, pb) = (assignments[u], assignments[v as usize]);
                if pa == pb {
                    continue;
                }
                let key = if pa < pb { (pa, pb) } else { (pb, pa) };
                let list = verts.entry(key).or_default();
                if !list.contains(&(u as u32)) {
                    list.push(u as u32);
                }
                if !list.contains(&v) {
                    list.push(v);
                }
                *lengths.entry(key).or_insert(0.0) +=
                    geodesic_distance(render.vertices[u], render.vertices[v as usize]);
            }
        }

        let mut map = BTreeMap::new();
        for (key, mut shared) in verts {
            shared.sort_unstable();
            let mid = shared
                .iter()
                .fold(Vec3::ZERO, |acc, &i| acc.add(render.vertices[i as usize]))
                .normalized();
            let edge_length_rad = lengths.get(&key).copied().unwrap_or(0.0);
            let mut boundary = match previous.and_then(|p| p.map.get(&key)) {
                Some(prev) => prev.clone(),
                None => PlateBoundary {
                    shared_edge_vertices: Vec::new(),
                    boundary_type: BoundaryType::Transform,
                    state: BoundaryState::Nascent,
                    accumulated_stress_mpa: 0.0,
                    relative_velocity_rad_my: 0.0,
                    divergent_duration_my: 0.0,
                    convergent_duration_my: 0.0,
                    rift_width_m: 0.0,
                    state_transition_time_my: 0.0,
                    midpoint: mid,
                    tangent: Vec3::new(0.0, 0.0, 1.0),
                    edge_length_rad,
                },
            };
            boundary.shared_edge_vertices = shared;
            boundary.midpoint = mid;
            boundary.edge_length_rad = edge_length_rad;
            map.insert(key, boundary);
        }
        Self { map, stats: BoundaryStats::default() }
    }

    /// Classify every boundary, advance the state machine, and update stress.
    /// Call after centroid migration, before the field solvers.
    pub fn update_kinematics(
        &mut self,
        plates: &Plates,
        params: &SimulationParams,
        t_my: f64,
        dt_my: f64,
    ) {
        let mut stats = BoundaryStats::default();
        for (&(ia, ib), b) in self.map.iter_mut() {
            let (pa, pb) = match (plates.get(PlateId(ia)), plates.get(PlateId(ib))) {
                (Some(a), Some(bp)) => (a, bp),
                // Pair retired mid-step; rebuild will drop it.
                _ => continue,
            };

            let m = b.midpoint;
            let va = pa.omega().cross(m);
            let vb = pb.omega().cross(m);
            let rel = vb.sub(va);
            b.relative_velocity_rad_my = rel.length();

            // Across-boundary direction: from plate a toward plate b in the
            // tangent plane at the midpoint.
            let ab = pb.centroid.sub(pa.centroid);
            let n_hat = ab.sub(m.scale(ab.dot(m))).normalized();
            let t_hat = m.cross(n_hat).normalized();
            b.tangent = t_hat;

            let separation = rel.dot(n_hat);
            let tangential = rel.dot(t_hat).abs();
            let new_type = if separation > CLASSIFY_TAU_RAD_MY {
                BoundaryType::Divergent
            } else if separation < -CLASSIFY_TAU_RAD_MY {
                BoundaryType::Convergent
            } else if tangential >= separation.abs() {
                BoundaryType::Transform
            } else {
                b.boundary_type
            };
            if new_type != b.boundary_type {
                // Type flips reset both duration counters.
                b.boundary_type = new_type;
                b.divergent_duration_my = 0.0;
                b.convergent_duration_my = 0.0;
            }
            match b.boundary_type {
                BoundaryType::Divergent => b.divergent_duration_my += dt_my,
                BoundaryType::Convergent => b.convergent_duration_my += dt_my,
                BoundaryType::Transform => {}
            }

            let fast = b.relative_velocity_rad_my > ACTIVITY_THRESHOLD_RAD_MY;
            let sustained = b.divergent_duration_my > ACTIVITY_SUSTAIN_MY
                || b.convergent_duration_my > ACTIVITY_SUSTAIN_MY;
            let next_state = match b.state {
                BoundaryState::Nascent if fast && sustained => BoundaryState::Active,
                BoundaryState::Nascent => BoundaryState::Nascent,
                BoundaryState::Active if !fast => BoundaryState::Dormant,
                BoundaryState::Active
                    if params.toggles.rift_propagation
                        && b.boundary_type == BoundaryType::Divergent
                        && b.relative_velocity_rad_my > params.split_velocity_threshold
                        && b.divergent_duration_my > params.split_duration_threshold_my =>
                {
                    BoundaryState::Rifting
                }
                BoundaryState::Active => BoundaryState::Active,
                BoundaryState::Dormant if fast => BoundaryState::Active,
                BoundaryState::Dormant => BoundaryState::Dormant,
                BoundaryState::Rifting if b.boundary_type != BoundaryType::Divergent => {
                    b.rift_width_m = 0.0;
                    BoundaryState::Dormant
                }
                BoundaryState::Rifting => BoundaryState::Rifting,
            };
            if next_state != b.state {
                b.state = next_state;
                b.state_transition_time_my = t_my;
            }
            if b.state == BoundaryState::Rifting {
                b.rift_width_m +=
                    params.rift_progression_rate * b.relative_velocity_rad_my * dt_my;
            }

            match b.boundary_type {
                BoundaryType::Convergent => {
                    b.accumulated_stress_mpa = (b.accumulated_stress_mpa
                        + STRESS_ACCUM_COEFF * b.relative_velocity_rad_my * dt_my)
                        .min(STRESS_CAP_MPA);
                    stats.convergent += 1;
                }
                BoundaryType::Divergent => {
                    b.accumulated_stress_mpa *= (-dt_my / STRESS_DECAY_TAU_MY).exp();
                    stats.divergent += 1;
                }
                BoundaryType::Transform => {
                    let blend = 1.0 - (-dt_my / STRESS_DECAY_TAU_MY).exp();
                    b.accumulated_stress_mpa +=
                        (TRANSFORM_STEADY_STRESS_MPA - b.accumulated_stress_mpa) * blend;
                    stats.transform += 1;
                }
            }
        }
        self.stats = stats;
    }

    /// Total divergent and convergent shared-edge arc length (radians).
    pub fn ridge_trench_lengths(&self) -> (f64, f64) {
        let mut ridge = 0.0;
        let mut trench = 0.0;
        for b in self.map.values() {
            match b.boundary_type {
                BoundaryType::Divergent => ridge += b.edge_length_rad,
                BoundaryType::Convergent => trench += b.edge_length_rad,
                BoundaryType::Transform => {}
            }
        }
        (ridge, trench)
    }
}

/// Splat boundary stress onto render vertices with a Gaussian kernel around
/// each boundary midpoint. Writes are disjoint per index; the pass is
/// data-parallel.
pub fn interpolate_stress(
    render: &IcosphereMesh,
    boundaries: &Boundaries,
    stress_out: &mut [f64],
) {
    let sources: Vec<(Vec3, f64)> = boundaries
        .map
        .values()
        .map(|b| (b.midpoint, b.accumulated_stress_mpa))
        .collect();
    let inv_two_sigma2 = 1.0 / (2.0 * STRESS_KERNEL_SIGMA_RAD * STRESS_KERNEL_SIGMA_RAD);
    stress_out
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, s)| {
            let p = render.vertices[i];
            let mut acc = 0.0f64;
            for &(mid, stress) in &sources {
                let d = geodesic_distance(p, mid);
                if d < 4.0 * STRESS_KERNEL_SIGMA_RAD {
                    acc += stress * (-d * d * inv_two_sigma2).exp();
                }
            }
            *s = acc.min(STRESS_CAP_MPA);
        });
}
