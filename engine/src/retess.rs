//! Drift-triggered re-tessellation of the plate ownership map.
//!
//! Plates carry the centroid they had when ownership was last rebuilt. When
//! any plate drifts past the configured threshold the Voronoi map is rebuilt
//! from current centroids, references are re-anchored, and a cooldown keeps
//! the rebuild cadence bounded.

use crate::boundaries::Boundaries;
use crate::config::SimulationParams;
use crate::errors::TopologyError;
use crate::mesh::IcosphereMesh;
use crate::plates::{assign_voronoi, PlateId, Plates, VoronoiWarp};

/// Cadence accounting for re-tessellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetessStats {
    /// Rebuilds performed this session.
    pub count: u64,
    /// Step index of the most recent rebuild.
    pub last_step: u64,
    /// Triggers suppressed by the cooldown window.
    pub suppressed_by_cooldown: u64,
}

/// Largest angular drift (degrees) of any plate centroid from its reference.
pub fn max_drift_degrees(plates: &Plates) -> f64 {
    plates
        .plates
        .iter()
        .map(|p| orogen_geo::geodesic_distance(p.centroid, p.reference_centroid).to_degrees())
        .fold(0.0, f64::max)
}

/// Whether a rebuild should run this step. Updates the suppression counter
/// when drift is over threshold but the cooldown window is still open.
pub fn should_retessellate(
    plates: &Plates,
    params: &SimulationParams,
    step: u64,
    stats: &mut RetessStats,
) -> bool {
    if !params.toggles.dynamic_retessellation {
        return false;
    }
    if max_drift_degrees(plates) < params.retessellation_threshold_degrees {
        return false;
    }
    let since = step.saturating_sub(stats.last_step);
    if stats.count > 0 && since < u64::from(params.retessellation_cooldown_steps) {
        stats.suppressed_by_cooldown += 1;
        return false;
    }
    true
}

/// Rebuild ownership from current centroids and re-anchor drift references.
///
/// Works on copies and commits only after the rebuilt map validates, so a
/// failure leaves `plates`, `assignments`, and `boundaries` untouched.
pub fn retessellate(
    render: &IcosphereMesh,
    plates: &mut Plates,
    assignments: &mut Vec<u32>,
    boundaries: &mut Boundaries,
    warp: Option<&VoronoiWarp>,
    step: u64,
    stats: &mut RetessStats,
) -> Result<(), TopologyError> {
    let new_assignments = assign_voronoi(render, plates, warp);
    if let Some(bad) = new_assignments
        .iter()
        .position(|&a| plates.dense_index(PlateId(a)).is_none())
    {
        return Err(TopologyError::UnassignedVertex(bad as u32));
    }
    let new_boundaries = Boundaries::rebuild(render, &new_assignments, Some(boundaries));

    for p in &mut plates.plates {
        p.reference_centroid = p.centroid;
    }
    *assignments = new_assignments;
    *boundaries = new_boundaries;
    stats.count += 1;
    stats.last_step = step;
    println!("[retess] rebuilt ownership at step {step} ({} rebuilds total)", stats.count);
    Ok(())
}
