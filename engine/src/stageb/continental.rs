//! Exemplar-based continental amplification.
//!
//! Each continental vertex samples up to three exemplars for its orogeny
//! class, blends them with harmonic weights, and rescales the blended sample
//! into the local relief so amplification never invents regional elevation.

use rayon::prelude::*;

use crate::config::SimulationParams;
use crate::fields::OrogenyClass;
use crate::mesh::IcosphereMesh;
use crate::stageb::exemplar::{Exemplar, ExemplarLibrary};

/// How many exemplars blend per vertex at most.
const MAX_BLEND: usize = 3;
/// Tiling frequency of exemplar UVs across the sphere.
const UV_FREQUENCY: f64 = 16.0;
/// Largest UV offset the per-vertex jitter may introduce.
const UV_JITTER_MAX: f64 = 0.35;

const SEED_UV_JITTER: u64 = 0x6a69_7474_6572; // "jitter"

/// Deterministic per-vertex UV offset derived from the global seed.
fn uv_jitter(seed: u64, vertex: usize) -> (f64, f64) {
    // splitmix64-style mix; cheap and stable across platforms.
    let mut x = seed ^ SEED_UV_JITTER ^ ((vertex as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15));
    let mut next = || {
        x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = x;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    };
    let a = (next() >> 11) as f64 / (1u64 << 53) as f64;
    let b = (next() >> 11) as f64 / (1u64 << 53) as f64;
    (UV_JITTER_MAX * (a - 0.5), UV_JITTER_MAX * (b - 0.5))
}

/// Add continental Stage-B detail on top of the base elevation in `out`.
///
/// Vertices whose class has no exemplars keep the base value. Writes are
/// disjoint per index.
pub fn amplify_continental(
    render: &IcosphereMesh,
    continental: &[bool],
    classes: &[OrogenyClass],
    library: &ExemplarLibrary,
    params: &SimulationParams,
    out: &mut [f64],
) {
    let forced: Option<&Exemplar> = params
        .overrides
        .force_exemplar_id
        .as_deref()
        .and_then(|id| library.by_id(id));
    let jitter_enabled = !params.overrides.disable_uv_jitter;
    let cap = params.max_elevation_m;
    let base: Vec<f64> = out.to_vec();

    out.par_iter_mut().enumerate().for_each(|(i, e)| {
        if !continental[i] || base[i] <= params.sea_level_m {
            return;
        }
        let chosen: Vec<&Exemplar> = match forced {
            Some(f) => vec![f],
            None => {
                let mut list = library.for_class(classes[i]);
                list.truncate(MAX_BLEND);
                list
            }
        };
        if chosen.is_empty() {
            return;
        }

        let p = render.vertices[i];
        let mut u = (p.y.atan2(p.x) / std::f64::consts::TAU + 0.5) * UV_FREQUENCY;
        let mut v = (p.z.clamp(-1.0, 1.0).asin() / std::f64::consts::PI + 0.5) * UV_FREQUENCY;
        if jitter_enabled {
            let (ju, jv) = uv_jitter(params.seed, i);
            u += ju;
            v += jv;
        }

        // Blend in source meters, then normalize by the blended range so the
        // manifest elevation statistics weigh each exemplar.
        let mut elev = 0.0;
        let mut lo = 0.0;
        let mut span = 0.0;
        let mut weight_sum = 0.0;
        for (k, ex) in chosen.iter().enumerate() {
            let w = 1.0 / (k as f64 + 1.0);
            elev += w * ex.sample_elevation_m(u, v);
            lo += w * ex.elevation_min_m;
            span += w * (ex.elevation_max_m - ex.elevation_min_m);
            weight_sum += w;
        }
        elev /= weight_sum;
        lo /= weight_sum;
        span /= weight_sum;
        let sample = if span > 0.0 { (elev - lo) / span } else { 0.5 };

        // Rescale into the relief of the 1-ring so detail stays local.
        let start = render.adjacency_offsets[i] as usize;
        let end = render.adjacency_offsets[i + 1] as usize;
        let mut lo = base[i];
        let mut hi = base[i];
        for &j in &render.adjacency[start..end] {
            lo = lo.min(base[j as usize]);
            hi = hi.max(base[j as usize]);
        }
        let local_range = (hi - lo).max(1.0);
        *e = (base[i] + (sample - 0.5) * local_range).clamp(-cap, cap);
    });
}
