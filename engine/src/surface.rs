//! Bulk surface processes: slope erosion, oceanic dampening, and sediment
//! diffusion.
//!
//! Surface passes never write the elevation field directly. They adjust the
//! per-vertex surface offset (folded back in by the base-elevation pass) and
//! move mass through the sediment buffer, so eroded volume is conserved until
//! it deposits or the dampening sink removes it.

use std::collections::HashSet;

use crate::boundaries::{Boundaries, BoundaryType};
use crate::config::SimulationParams;
use crate::mesh::IcosphereMesh;
use crate::plates::{CrustType, PlateId, Plates};

/// Fraction of in-transit sediment that settles each step.
const SEDIMENT_DEPOSIT_FRACTION: f64 = 0.25;
/// Receiving weight multiplier for vertices on convergent boundaries.
const TRENCH_SINK_WEIGHT: f64 = 2.0;
/// Slope at which the diffusion rate applies unscaled. Typical inter-vertex
/// slope of continental relief at render resolution.
const SEDIMENT_SLOPE_REFERENCE: f64 = 1.0e-3;

/// Mass-balance accounting for one surface pass (meters of column height,
/// area-weighted by the vertex dual areas in steradians).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceStats {
    /// Column height eroded off continental crust.
    pub eroded: f64,
    /// Column height settled out of the sediment buffer.
    pub deposited: f64,
    /// Column height removed by oceanic dampening.
    pub dampened: f64,
    /// Net change of the in-transit sediment buffer.
    pub sediment_delta: f64,
}

impl SurfaceStats {
    /// Relative mass-balance error: eroded mass must equal deposited mass
    /// plus the sediment-buffer growth.
    pub fn mass_balance_error(&self) -> f64 {
        let expected = self.deposited + self.sediment_delta;
        let scale = self.eroded.abs().max(1e-12);
        (self.eroded - expected).abs() / scale
    }
}

/// Mutable field slices the surface passes operate on.
pub struct SurfaceFields<'a> {
    /// Current elevation (m), read-only input for slopes.
    pub elevation_m: &'a [f64],
    /// Accumulated surface offset (m), adjusted in place.
    pub surface_offset_m: &'a mut [f64],
    /// In-transit sediment column (m), adjusted in place.
    pub sediment_m: &'a mut [f64],
}

/// Run the enabled surface processes for one step and return the accounting.
pub fn apply_surface_processes(
    render: &IcosphereMesh,
    assignments: &[u32],
    plates: &Plates,
    boundaries: &Boundaries,
    fields: SurfaceFields<'_>,
    params: &SimulationParams,
    dt_my: f64,
) -> SurfaceStats {
    let mut stats = SurfaceStats::default();
    let continental: Vec<bool> = assignments
        .iter()
        .map(|&a| {
            plates.get(PlateId(a)).map(|p| p.crust_type) == Some(CrustType::Continental)
        })
        .collect();

    let sediment_before: f64 = weighted_sum(fields.sediment_m, &render.area_sr);

    if params.toggles.continental_erosion {
        stats.eroded = erode_continents(
            render,
            &continental,
            fields.elevation_m,
            fields.surface_offset_m,
            fields.sediment_m,
            params,
            dt_my,
        );
    }
    if params.toggles.oceanic_dampening {
        stats.dampened = dampen_oceans(
            render,
            &continental,
            fields.surface_offset_m,
            params,
            dt_my,
        );
    }
    if params.toggles.sediment_transport {
        stats.deposited = diffuse_sediment(
            render,
            boundaries,
            fields.elevation_m,
            fields.surface_offset_m,
            fields.sediment_m,
            params,
            dt_my,
        );
    }

    stats.sediment_delta = weighted_sum(fields.sediment_m, &render.area_sr) - sediment_before;
    stats
}

fn weighted_sum(values: &[f64], weights: &[f64]) -> f64 {
    values.iter().zip(weights).map(|(v, w)| v * w).sum()
}

/// Slope-proportional erosion on continental crust above sea level. Eroded
/// height leaves the surface offset and enters the sediment buffer in place.
fn erode_continents(
    render: &IcosphereMesh,
    continental: &[bool],
    elevation_m: &[f64],
    surface_offset_m: &mut [f64],
    sediment_m: &mut [f64],
    params: &SimulationParams,
    dt_my: f64,
) -> f64 {
    let mut eroded = 0.0;
    for i in 0..render.vertices.len() {
        if !continental[i] || elevation_m[i] <= params.sea_level_m {
            continue;
        }
        let start = render.adjacency_offsets[i] as usize;
        let end = render.adjacency_offsets[i + 1] as usize;
        let mut slope = 0.0f64;
        for &j in &render.adjacency[start..end] {
            let drop = elevation_m[i] - elevation_m[j as usize];
            if drop <= 0.0 {
                continue;
            }
            let run = orogen_geo::geodesic_distance(
                render.vertices[i],
                render.vertices[j as usize],
            ) * params.planet_radius_m;
            if run > 0.0 {
                slope = slope.max(drop / run);
            }
        }
        let height = (params.erosion_constant * slope * dt_my)
            .min(elevation_m[i] - params.sea_level_m);
        if height > 0.0 {
            surface_offset_m[i] -= height;
            sediment_m[i] += height;
            eroded += height * render.area_sr[i];
        }
    }
    eroded
}

/// Move sediment downhill over a fixed number of passes, then settle a
/// fraction of it into the surface offset. The fraction moved off a vertex
/// scales with its steepest downhill slope and the step duration; transfers
/// split between strictly lower neighbors, weighted by drop, with
/// convergent-boundary receivers counted double. Conserves mass.
fn diffuse_sediment(
    render: &IcosphereMesh,
    boundaries: &Boundaries,
    elevation_m: &[f64],
    surface_offset_m: &mut [f64],
    sediment_m: &mut [f64],
    params: &SimulationParams,
    dt_my: f64,
) -> f64 {
    let trench: HashSet<u32> = boundaries
        .map
        .values()
        .filter(|b| b.boundary_type == BoundaryType::Convergent)
        .flat_map(|b| b.shared_edge_vertices.iter().copied())
        .collect();

    for _ in 0..params.sediment_iterations {
        let mut incoming = vec![0.0f64; render.vertices.len()];
        for i in 0..render.vertices.len() {
            if sediment_m[i] <= 0.0 {
                continue;
            }
            let start = render.adjacency_offsets[i] as usize;
            let end = render.adjacency_offsets[i + 1] as usize;
            let mut weights: Vec<(usize, f64)> = Vec::with_capacity(end - start);
            let mut total_w = 0.0;
            let mut max_slope = 0.0f64;
            for &j in &render.adjacency[start..end] {
                let drop = elevation_m[i] - elevation_m[j as usize];
                if drop <= 0.0 {
                    continue;
                }
                let run = orogen_geo::geodesic_distance(
                    render.vertices[i],
                    render.vertices[j as usize],
                ) * params.planet_radius_m;
                if run > 0.0 {
                    max_slope = max_slope.max(drop / run);
                }
                let w = drop * if trench.contains(&j) { TRENCH_SINK_WEIGHT } else { 1.0 };
                weights.push((j as usize, w));
                total_w += w;
            }
            if total_w <= 0.0 || max_slope <= 0.0 {
                continue;
            }
            // Spread in steradian-weighted units so transfers between
            // vertices of different dual area conserve mass.
            let fraction = (params.sediment_diffusion_rate
                * (max_slope / SEDIMENT_SLOPE_REFERENCE)
                * dt_my)
                .min(1.0);
            let moved = fraction * sediment_m[i];
            sediment_m[i] -= moved;
            let mass = moved * render.area_sr[i];
            for (j, w) in weights {
                incoming[j] += mass * (w / total_w) / render.area_sr[j];
            }
        }
        for (s, inc) in sediment_m.iter_mut().zip(&incoming) {
            *s += inc;
        }
    }

    let mut deposited = 0.0;
    for i in 0..render.vertices.len() {
        let settle = SEDIMENT_DEPOSIT_FRACTION * sediment_m[i];
        if settle > 0.0 {
            sediment_m[i] -= settle;
            surface_offset_m[i] += settle;
            deposited += settle * render.area_sr[i];
        }
    }
    deposited
}

/// Weight of the neighbor-Laplacian smoothing term in the dampening pass.
const DAMPENING_LAPLACIAN_WEIGHT: f64 = 0.1;

/// Relax oceanic surface offsets toward zero (the base elevation pass already
/// carries the age-depth equilibrium), bounded by the dampening constant,
/// then smooth residual offsets with a neighbor Laplacian. Removed height is
/// a mantle sink, not part of the sediment balance.
fn dampen_oceans(
    render: &IcosphereMesh,
    continental: &[bool],
    surface_offset_m: &mut [f64],
    params: &SimulationParams,
    dt_my: f64,
) -> f64 {
    let max_step = params.oceanic_dampening_constant * dt_my;
    let mut removed = 0.0;
    for i in 0..render.vertices.len() {
        if continental[i] {
            continue;
        }
        let step = surface_offset_m[i].abs().min(max_step);
        if step > 0.0 {
            surface_offset_m[i] -= step.copysign(surface_offset_m[i]);
            removed += step * render.area_sr[i];
        }
    }
    let before = surface_offset_m.to_vec();
    for i in 0..render.vertices.len() {
        if continental[i] {
            continue;
        }
        let start = render.adjacency_offsets[i] as usize;
        let end = render.adjacency_offsets[i + 1] as usize;
        let mean = render.adjacency[start..end]
            .iter()
            .map(|&j| before[j as usize])
            .sum::<f64>()
            / (end - start) as f64;
        surface_offset_m[i] += DAMPENING_LAPLACIAN_WEIGHT * (mean - before[i]);
    }
    removed
}
