//! Per-vertex field solvers: velocity, temperature, crust age, orogeny
//! classification, and base elevation.
//!
//! All passes write disjoint indices and are data-parallel; the sequential
//! caller owns the ordering between passes.

use orogen_geo::{geodesic_distance, Vec3};
use rayon::prelude::*;
use std::collections::HashMap;

use crate::boundaries::{Boundaries, BoundaryType};
use crate::config::SimulationParams;
use crate::hotspots::Hotspot;
use crate::mesh::IcosphereMesh;
use crate::plates::{CrustType, PlateId, Plates};

/// Baseline mantle temperature (K).
pub const MANTLE_BASELINE_K: f64 = 1600.0;
/// Subduction heating per MPa of local stress (K).
const SUBDUCTION_HEATING_K_PER_MPA: f64 = 2.0;
/// Peak thermal bump of a unit-output hotspot (K).
const HOTSPOT_PEAK_K: f64 = 400.0;
/// Continental baseline elevation (m).
const CONTINENTAL_BASELINE_M: f64 = 500.0;
/// Fresh oceanic ridge elevation (m).
const RIDGE_ELEVATION_M: f64 = -1000.0;
/// Oldest oceanic floor elevation (m).
const ABYSSAL_ELEVATION_M: f64 = -6000.0;
/// Oceanic subsidence coefficient (m per sqrt(My)), after the age-depth law.
const SUBSIDENCE_M_PER_SQRT_MY: f64 = 350.0;
/// Stress-to-uplift conversion at convergent continental crust (m per MPa).
const UPLIFT_M_PER_MPA: f64 = 20.0;
/// Peak swell of a unit-output hotspot (m).
const HOTSPOT_SWELL_M: f64 = 1000.0;
/// Continental crust age beyond which ranges classify as old (My).
pub const OLD_OROGENY_AGE_MY: f64 = 100.0;

/// Terrain class used by continental Stage-B exemplar selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OrogenyClass {
    /// No active or remnant orogeny.
    #[default]
    Plain,
    /// Remnant range on old continental crust.
    OldMountains,
    /// Ocean-continent convergence (Andean style).
    AndeanMountains,
    /// Continent-continent collision (Himalayan style).
    HimalayanMountains,
}

/// v = ω × r for the owning plate of each render vertex (rad/My on the unit
/// sphere; multiply by the planet radius for linear speed).
pub fn compute_velocities(
    render: &IcosphereMesh,
    plates: &Plates,
    assignments: &[u32],
    out: &mut [Vec3],
) {
    let omegas: HashMap<u32, Vec3> =
        plates.plates.iter().map(|p| (p.id.0, p.omega())).collect();
    out.par_iter_mut().enumerate().for_each(|(i, v)| {
        let omega = omegas.get(&assignments[i]).copied().unwrap_or(Vec3::ZERO);
        *v = omega.cross(render.vertices[i]);
    });
}

/// Thermal field: mantle baseline + drifting hotspot bumps + subduction
/// heating proportional to the local (already interpolated) stress.
pub fn update_temperature(
    render: &IcosphereMesh,
    stress_mpa: &[f64],
    hotspots: &[Hotspot],
    out: &mut [f64],
) {
    out.par_iter_mut().enumerate().for_each(|(i, t)| {
        let p = render.vertices[i];
        let mut temp = MANTLE_BASELINE_K;
        for h in hotspots {
            let d = geodesic_distance(p, h.position);
            if d < 4.0 * h.influence_radius_rad {
                let sigma = h.influence_radius_rad;
                temp += HOTSPOT_PEAK_K
                    * h.thermal_output
                    * (-d * d / (2.0 * sigma * sigma)).exp();
            }
        }
        temp += SUBDUCTION_HEATING_K_PER_MPA * stress_mpa[i];
        *t = temp;
    });
}

/// Crust age: oceanic vertices on divergent boundaries reset to zero (fresh
/// crust), everything else ages by Δt.
pub fn update_crust_age(
    assignments: &[u32],
    plates: &Plates,
    boundaries: &Boundaries,
    age_my: &mut [f64],
    dt_my: f64,
) {
    for a in age_my.iter_mut() {
        *a += dt_my;
    }
    let crust_of = |raw: u32| -> Option<CrustType> {
        plates.get(PlateId(raw)).map(|p| p.crust_type)
    };
    for b in boundaries.map.values() {
        if b.boundary_type != BoundaryType::Divergent {
            continue;
        }
        for &v in &b.shared_edge_vertices {
            if crust_of(assignments[v as usize]) == Some(CrustType::Oceanic) {
                age_my[v as usize] = 0.0;
            }
        }
    }
}

/// Classify each render vertex's orogeny from crust age and the crust types
/// facing it across the nearest boundary. Boundary vertices look across the
/// pair; interior continental vertices fall back to age-based classes.
pub fn classify_orogeny(
    assignments: &[u32],
    plates: &Plates,
    boundaries: &Boundaries,
    age_my: &[f64],
    out: &mut [OrogenyClass],
    fold_out: &mut [Vec3],
) {
    for c in out.iter_mut() {
        *c = OrogenyClass::Plain;
    }
    for f in fold_out.iter_mut() {
        *f = Vec3::ZERO;
    }
    let crust_of = |raw: u32| -> Option<CrustType> {
        plates.get(PlateId(raw)).map(|p| p.crust_type)
    };
    for (&(ia, ib), b) in &boundaries.map {
        if b.boundary_type != BoundaryType::Convergent {
            continue;
        }
        let (ca, cb) = (crust_of(ia), crust_of(ib));
        for &v in &b.shared_edge_vertices {
            let own = crust_of(assignments[v as usize]);
            if own != Some(CrustType::Continental) {
                continue;
            }
            let other = if assignments[v as usize] == ia { cb } else { ca };
            out[v as usize] = match other {
                Some(CrustType::Continental) => OrogenyClass::HimalayanMountains,
                Some(CrustType::Oceanic) => OrogenyClass::AndeanMountains,
                None => OrogenyClass::Plain,
            };
            fold_out[v as usize] = b.tangent;
        }
    }
    for (i, c) in out.iter_mut().enumerate() {
        if *c == OrogenyClass::Plain
            && crust_of(assignments[i]) == Some(CrustType::Continental)
            && age_my[i] > OLD_OROGENY_AGE_MY
        {
            *c = OrogenyClass::OldMountains;
        }
    }
}

/// Base elevation from stress uplift, age-driven subsidence, hotspot swell,
/// crust baseline offsets, and the accumulated surface-process offset.
/// Clamped to ±`max_elevation_m`.
#[allow(clippy::too_many_arguments)]
pub fn compute_elevation_base(
    render: &IcosphereMesh,
    assignments: &[u32],
    plates: &Plates,
    stress_mpa: &[f64],
    age_my: &[f64],
    hotspots: &[Hotspot],
    surface_offset_m: &[f64],
    params: &SimulationParams,
    out: &mut [f64],
) {
    let crust: HashMap<u32, CrustType> =
        plates.plates.iter().map(|p| (p.id.0, p.crust_type)).collect();
    let cap = params.max_elevation_m;
    out.par_iter_mut().enumerate().for_each(|(i, e)| {
        let p = render.vertices[i];
        let mut elev = match crust.get(&assignments[i]) {
            Some(CrustType::Continental) => {
                CONTINENTAL_BASELINE_M + UPLIFT_M_PER_MPA * stress_mpa[i]
            }
            Some(CrustType::Oceanic) | None => {
                // Age-depth law: subsides as sqrt(age) toward the abyssal floor.
                (RIDGE_ELEVATION_M - SUBSIDENCE_M_PER_SQRT_MY * age_my[i].max(0.0).sqrt())
                    .max(ABYSSAL_ELEVATION_M)
            }
        };
        for h in hotspots {
            let d = geodesic_distance(p, h.position);
            if d < 4.0 * h.influence_radius_rad {
                let sigma = h.influence_radius_rad;
                elev += HOTSPOT_SWELL_M
                    * h.thermal_output
                    * (-d * d / (2.0 * sigma * sigma)).exp();
            }
        }
        elev += surface_offset_m[i];
        *e = elev.clamp(-cap, cap);
    });
}
