//! Procedural oceanic amplification: oriented transform-fault fabric plus
//! fine isotropic detail.
//!
//! The anisotropic term is a Gabor-style carrier running across the cached
//! ridge direction, modelling abyssal-hill fabric that fades with crust age.

use noise::{NoiseFn, Perlin};
use orogen_geo::Vec3;
use rayon::prelude::*;

use crate::config::SimulationParams;
use crate::mesh::IcosphereMesh;

const SEED_OCEANIC: u64 = 0x6f63_6561_6e; // "ocean"

/// Peak amplitude of the transform-fault fabric (m).
const FABRIC_AMPLITUDE_M: f64 = 150.0;
/// Angular frequency of the fabric carrier across the ridge direction.
const FABRIC_FREQUENCY: f64 = 220.0;
/// Crust age at which the fabric has decayed to 1/e (My).
const FABRIC_AGE_TAU_MY: f64 = 50.0;
/// Peak amplitude of the fine Perlin detail (m).
const FINE_DETAIL_AMPLITUDE_M: f64 = 40.0;
/// Noise frequency of the fine detail.
const FINE_DETAIL_FREQUENCY: f64 = 12.0;

/// Add oceanic Stage-B detail on top of the base elevation.
///
/// `out` must already hold the base elevation; only oceanic vertices below
/// sea level are touched. Writes are disjoint per index.
pub fn amplify_oceanic(
    render: &IcosphereMesh,
    oceanic: &[bool],
    ridge_directions: &[Vec3],
    crust_age_my: &[f64],
    params: &SimulationParams,
    out: &mut [f64],
) {
    let perlin = Perlin::new((params.seed ^ SEED_OCEANIC) as u32);
    let anisotropic = params.toggles.oceanic_anisotropy;
    let sea = params.sea_level_m;
    out.par_iter_mut().enumerate().for_each(|(i, e)| {
        if !oceanic[i] || *e > sea {
            return;
        }
        let p = render.vertices[i];
        let mut detail = 0.0f64;

        if anisotropic {
            let ridge = ridge_directions[i];
            if ridge.length() > 0.0 {
                // Across-ridge coordinate drives the carrier, a small noise
                // phase breaks up perfectly straight fault traces.
                let across = ridge.cross(p).normalized();
                let phase = perlin.get([p.x * 3.0, p.y * 3.0, p.z * 3.0]);
                let carrier = (FABRIC_FREQUENCY * p.dot(across) + 2.0 * phase).cos();
                let envelope = (-crust_age_my[i].max(0.0) / FABRIC_AGE_TAU_MY).exp();
                detail += FABRIC_AMPLITUDE_M * envelope * carrier;
            }
        }
        let f = FINE_DETAIL_FREQUENCY;
        detail += FINE_DETAIL_AMPLITUDE_M * perlin.get([p.x * f, p.y * f, p.z * f]);

        // Detail must not lift the sea floor above sea level.
        *e = (*e + detail).min(sea);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (IcosphereMesh, Vec<bool>, Vec<Vec3>, Vec<f64>, SimulationParams) {
        let render = IcosphereMesh::build(4);
        let n = render.vertices.len();
        let oceanic = vec![true; n];
        let dirs: Vec<Vec3> = render
            .vertices
            .iter()
            .map(|&p| {
                let t = Vec3::new(0.0, 0.0, 1.0).cross(p);
                if t.length() > 0.0 { t.normalized() } else { Vec3::new(1.0, 0.0, 0.0) }
            })
            .collect();
        let age = vec![10.0; n];
        let mut params = SimulationParams::default();
        params.toggles.oceanic_amplification = true;
        params.toggles.oceanic_anisotropy = true;
        (render, oceanic, dirs, age, params)
    }

    #[test]
    fn detail_is_deterministic_and_bounded() {
        let (render, oceanic, dirs, age, params) = setup();
        let base = vec![-4000.0; render.vertices.len()];
        let mut a = base.clone();
        let mut b = base.clone();
        amplify_oceanic(&render, &oceanic, &dirs, &age, &params, &mut a);
        amplify_oceanic(&render, &oceanic, &dirs, &age, &params, &mut b);
        assert_eq!(a, b);
        for (i, &e) in a.iter().enumerate() {
            assert!(e <= params.sea_level_m);
            assert!((e - base[i]).abs() <= FABRIC_AMPLITUDE_M + FINE_DETAIL_AMPLITUDE_M + 1e-9);
        }
    }

    #[test]
    fn continental_vertices_untouched() {
        let (render, mut oceanic, dirs, age, params) = setup();
        oceanic[0] = false;
        let mut out = vec![-4000.0; render.vertices.len()];
        amplify_oceanic(&render, &oceanic, &dirs, &age, &params, &mut out);
        assert_eq!(out[0], -4000.0);
    }

    #[test]
    fn old_crust_carries_weaker_fabric() {
        let (render, oceanic, dirs, _age, params) = setup();
        let n = render.vertices.len();
        let young = vec![0.0; n];
        let old = vec![400.0; n];
        let mut with_young = vec![-4000.0; n];
        let mut with_old = vec![-4000.0; n];
        amplify_oceanic(&render, &oceanic, &dirs, &young, &params, &mut with_young);
        amplify_oceanic(&render, &oceanic, &dirs, &old, &params, &mut with_old);
        let spread = |v: &[f64]| {
            let max = v.iter().cloned().fold(f64::MIN, f64::max);
            let min = v.iter().cloned().fold(f64::MAX, f64::min);
            max - min
        };
        assert!(spread(&with_young) > spread(&with_old));
    }
}
