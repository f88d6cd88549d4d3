//! Stage-B amplification: high-frequency detail layered on the base
//! elevation once the render LOD is fine enough to carry it.
//!
//! Oceanic detail is procedural and oriented by the ridge cache; continental
//! detail samples an exemplar library. Both write a separate amplified field
//! so the simulation state never depends on amplification.

pub mod continental;
pub mod exemplar;
pub mod oceanic;
pub mod ridge;

use orogen_geo::Vec3;

use crate::config::SimulationParams;
use crate::fields::OrogenyClass;
use crate::mesh::IcosphereMesh;
use exemplar::ExemplarLibrary;
use ridge::{RidgeCache, RidgeStats};

/// Read-only inputs for one amplification pass.
pub struct AmplifyInputs<'a> {
    /// Oceanic mask per render vertex.
    pub oceanic: &'a [bool],
    /// Continental mask per render vertex.
    pub continental: &'a [bool],
    /// Orogeny classification per render vertex.
    pub classes: &'a [OrogenyClass],
    /// Crust age (My).
    pub crust_age_my: &'a [f64],
    /// Plate velocity field, ridge-cache motion fallback.
    pub velocities: &'a [Vec3],
    /// Current boundary map.
    pub boundaries: &'a crate::boundaries::Boundaries,
    /// Base elevation (m).
    pub base_elevation_m: &'a [f64],
}

/// Stage-B state: the ridge cache and the once-latched exemplar library.
pub struct StageB {
    /// Ridge direction cache.
    pub ridge: RidgeCache,
    library: Option<ExemplarLibrary>,
    library_attempted: bool,
}

impl StageB {
    /// Fresh Stage-B state for a render mesh of `vertex_count` vertices.
    pub fn new(vertex_count: usize) -> Self {
        Self { ridge: RidgeCache::new(vertex_count), library: None, library_attempted: false }
    }

    /// Whether amplification runs at all under `params`.
    pub fn active(params: &SimulationParams) -> bool {
        params.render_subdivision_level >= params.min_amplification_lod
            && (params.toggles.oceanic_amplification || params.toggles.continental_amplification)
    }

    /// The exemplar library, loaded on first use. A failed load is latched
    /// and logged once; continental amplification then degrades to base.
    fn library(&mut self, params: &SimulationParams) -> Option<&ExemplarLibrary> {
        if !self.library_attempted {
            self.library_attempted = true;
            if params.exemplar_manifest.as_os_str().is_empty() {
                return None;
            }
            match ExemplarLibrary::load(&params.exemplar_manifest) {
                Ok(lib) => self.library = Some(lib),
                Err(e) => {
                    println!("[stageb] exemplar library unavailable: {e}");
                }
            }
        }
        self.library.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn with_library(vertex_count: usize, library: ExemplarLibrary) -> Self {
        Self { ridge: RidgeCache::new(vertex_count), library: Some(library), library_attempted: true }
    }

    /// Run one amplification pass. `out` receives base elevation plus detail;
    /// with amplification inactive or skipped it is the base verbatim.
    /// Returns the ridge-cache counters for the step log.
    pub fn amplify(
        &mut self,
        render: &IcosphereMesh,
        inputs: &AmplifyInputs<'_>,
        params: &SimulationParams,
        out: &mut Vec<f64>,
    ) -> RidgeStats {
        out.clear();
        out.extend_from_slice(inputs.base_elevation_m);
        if !Self::active(params) || params.toggles.skip_cpu_amplification {
            return RidgeStats::default();
        }

        self.ridge.update(
            render,
            inputs.oceanic,
            inputs.boundaries,
            inputs.base_elevation_m,
            inputs.velocities,
        );
        let stats = self.ridge.stats;

        if params.toggles.oceanic_amplification {
            oceanic::amplify_oceanic(
                render,
                inputs.oceanic,
                &self.ridge.directions,
                inputs.crust_age_my,
                params,
                out,
            );
        }
        if params.toggles.continental_amplification {
            let classes = inputs.classes;
            let continental = inputs.continental;
            if let Some(library) = self.library(params) {
                continental::amplify_continental(
                    render, continental, classes, library, params, out,
                );
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundaries::Boundaries;
    use crate::plates::{assign_voronoi, CrustType, PlateId, Plates};

    fn inputs(
        render: &IcosphereMesh,
        params: &SimulationParams,
    ) -> (Vec<bool>, Vec<bool>, Vec<OrogenyClass>, Vec<f64>, Vec<Vec3>, Boundaries, Vec<f64>) {
        let sim = IcosphereMesh::build(0);
        let plates = Plates::generate(&sim, params);
        let assignments = assign_voronoi(render, &plates, None);
        let boundaries = Boundaries::rebuild(render, &assignments, None);
        let oceanic: Vec<bool> = assignments
            .iter()
            .map(|&a| plates.get(PlateId(a)).map(|p| p.crust_type) == Some(CrustType::Oceanic))
            .collect();
        let continental: Vec<bool> = oceanic.iter().map(|&o| !o).collect();
        let classes = vec![OrogenyClass::Plain; render.vertices.len()];
        let age = vec![30.0; render.vertices.len()];
        let mut velocities = vec![Vec3::ZERO; render.vertices.len()];
        crate::fields::compute_velocities(render, &plates, &assignments, &mut velocities);
        let base: Vec<f64> = oceanic
            .iter()
            .map(|&o| if o { -3500.0 } else { 700.0 })
            .collect();
        (oceanic, continental, classes, age, velocities, boundaries, base)
    }

    #[test]
    fn below_min_lod_amplified_equals_base() {
        let render = IcosphereMesh::build(3);
        let mut params = SimulationParams::default();
        params.toggles.oceanic_amplification = true;
        // render LOD 3 < min_amplification_lod 5
        let (oceanic, continental, classes, age, velocities, boundaries, base) =
            inputs(&render, &params);
        let mut stageb = StageB::new(render.vertices.len());
        let mut out = Vec::new();
        stageb.amplify(
            &render,
            &AmplifyInputs {
                oceanic: &oceanic,
                continental: &continental,
                classes: &classes,
                crust_age_my: &age,
                velocities: &velocities,
                boundaries: &boundaries,
                base_elevation_m: &base,
            },
            &params,
            &mut out,
        );
        assert_eq!(out, base);
    }

    #[test]
    fn active_amplification_adds_oceanic_detail() {
        let render = IcosphereMesh::build(3);
        let mut params = SimulationParams::default();
        params.toggles.oceanic_amplification = true;
        params.min_amplification_lod = 3;
        let (oceanic, continental, classes, age, velocities, boundaries, base) =
            inputs(&render, &params);
        let mut stageb = StageB::new(render.vertices.len());
        let mut out = Vec::new();
        stageb.amplify(
            &render,
            &AmplifyInputs {
                oceanic: &oceanic,
                continental: &continental,
                classes: &classes,
                crust_age_my: &age,
                velocities: &velocities,
                boundaries: &boundaries,
                base_elevation_m: &base,
            },
            &params,
            &mut out,
        );
        assert!(out.iter().zip(&base).any(|(a, b)| a != b));
        // Continental vertices untouched with continental amplification off.
        for (i, (&a, &b)) in out.iter().zip(&base).enumerate() {
            if continental[i] {
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn skip_toggle_passes_base_through() {
        let render = IcosphereMesh::build(3);
        let mut params = SimulationParams::default();
        params.toggles.oceanic_amplification = true;
        params.toggles.skip_cpu_amplification = true;
        params.min_amplification_lod = 3;
        let (oceanic, continental, classes, age, velocities, boundaries, base) =
            inputs(&render, &params);
        let mut stageb = StageB::new(render.vertices.len());
        let mut out = Vec::new();
        stageb.amplify(
            &render,
            &AmplifyInputs {
                oceanic: &oceanic,
                continental: &continental,
                classes: &classes,
                crust_age_my: &age,
                velocities: &velocities,
                boundaries: &boundaries,
                base_elevation_m: &base,
            },
            &params,
            &mut out,
        );
        assert_eq!(out, base);
    }
}
