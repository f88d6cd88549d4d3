//! Simulation parameter surface.
//!
//! One flat struct carries every knob the host can set; `validate` rejects
//! out-of-range values before any state mutation. Structural parameters force
//! a full reset when changed (see [`SimulationParams::structural_differs`]).

use crate::errors::ParameterError;

/// Simulated duration of one step in My. Fixed by the paper model.
pub const STEP_DT_MY: f64 = 2.0;

/// Feature toggles. All default to the paper-baseline configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Toggles {
    /// Enable plate split/merge detection.
    pub plate_topology_changes: bool,
    /// Enable rift width tracking and the Rifting boundary state.
    pub rift_propagation: bool,
    /// Enable mantle hotspots (thermal field contributions and swell).
    pub hotspots: bool,
    /// Enable slope-proportional continental erosion.
    pub continental_erosion: bool,
    /// Enable oceanic dampening toward the age-depth equilibrium.
    pub oceanic_dampening: bool,
    /// Enable mass-conserving sediment diffusion.
    pub sediment_transport: bool,
    /// Enable stream-power hydraulic erosion with downhill routing.
    pub hydraulic_erosion: bool,
    /// Enable procedural oceanic Stage-B detail.
    pub oceanic_amplification: bool,
    /// Orient oceanic detail across the cached ridge direction.
    pub oceanic_anisotropy: bool,
    /// Enable exemplar-based continental Stage-B detail.
    pub continental_amplification: bool,
    /// Enable drift-triggered re-tessellation.
    pub dynamic_retessellation: bool,
    /// Reserved for the host: pick render LOD automatically.
    pub automatic_lod: bool,
    /// Warp Voronoi queries with coherent noise for ragged boundaries.
    pub voronoi_warping: bool,
    /// Reserved for the host renderer: emphasize the sea-level isoline.
    pub highlight_sea_level: bool,
    /// Leave amplified elevation equal to base (profiling aid).
    pub skip_cpu_amplification: bool,
}

/// Stage-B overrides for profiling and validation. Inspected once per run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StageBOverrides {
    /// Force the CPU amplification path even when a GPU path exists.
    pub force_cpu_amplification: bool,
    /// Force a single exemplar id for all continental vertices.
    pub force_exemplar_id: Option<String>,
    /// Disable the seeded per-vertex UV offset (repetition mitigation).
    pub disable_uv_jitter: bool,
    /// Override the render LOD used for heightmap export.
    pub export_lod_override: Option<u32>,
}

/// Complete parameter set consumed by [`crate::world::World::new`].
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParams {
    /// Master RNG seed; every stochastic choice derives from it.
    pub seed: u64,
    /// Icosphere subdivision level whose faces become initial plates (0..=2).
    pub plate_subdivision_level: u32,
    /// Icosphere subdivision level of the render mesh (0..=8).
    pub render_subdivision_level: u32,
    /// Lloyd relaxation iterations after plate generation.
    pub lloyd_iterations: u32,
    /// Planet radius in meters; scales all derived metric quantities.
    pub planet_radius_m: f64,
    /// Multiplier applied to elevation when exported.
    pub elevation_scale: f64,
    /// Sea level in meters relative to the elevation zero.
    pub sea_level_m: f64,
    /// Fraction of plates seeded as continental crust (0..=1).
    pub continental_fraction: f64,
    /// Render LOD at which Stage-B amplification activates.
    pub min_amplification_lod: u32,
    /// Steps between periodic Voronoi refreshes (>=1).
    pub voronoi_refresh_interval_steps: u32,
    /// Centroid drift (degrees) that triggers re-tessellation.
    pub retessellation_threshold_degrees: f64,
    /// Steps of cooldown after a re-tessellation.
    pub retessellation_cooldown_steps: u32,
    /// Relative velocity (rad/My) above which sustained divergence may split.
    pub split_velocity_threshold: f64,
    /// Sustained divergence duration (My) required for a split.
    pub split_duration_threshold_my: f64,
    /// Boundary stress (MPa) above which a merge may trigger.
    pub merge_stress_threshold_mpa: f64,
    /// Area ratio (smaller/larger) below which a merge may trigger.
    pub merge_area_ratio_threshold: f64,
    /// Continental erosion constant (m per My per unit slope).
    pub erosion_constant: f64,
    /// Oceanic dampening constant (m per My).
    pub oceanic_dampening_constant: f64,
    /// Sediment diffusion transfer fraction per iteration (0..=1).
    pub sediment_diffusion_rate: f64,
    /// Sediment diffusion passes per step.
    pub sediment_iterations: u32,
    /// Stream-power erodibility K.
    pub hydraulic_constant: f64,
    /// Stream-power drainage-area exponent m.
    pub hydraulic_area_exponent: f64,
    /// Stream-power slope exponent n.
    pub hydraulic_slope_exponent: f64,
    /// Fraction of hydraulically eroded mass sent to the downstream link (0..=1).
    pub hydraulic_downstream_deposit_ratio: f64,
    /// Rift width (m) that triggers a plate split.
    pub rift_split_threshold_m: f64,
    /// Rift widening rate (m per My per rad/My of opening velocity).
    pub rift_progression_rate: f64,
    /// Number of major hotspots.
    pub major_hotspot_count: u32,
    /// Number of minor hotspots.
    pub minor_hotspot_count: u32,
    /// Thermal output of major hotspots (dimensionless, scales the bump).
    pub major_hotspot_thermal_output: f64,
    /// Thermal output of minor hotspots.
    pub minor_hotspot_thermal_output: f64,
    /// Hotspot drift speed in the mantle frame (rad/My).
    pub hotspot_drift_speed: f64,
    /// Ring depth marked dirty around rewritten ridge directions.
    pub ridge_direction_dirty_ring_depth: u32,
    /// Maximum |elevation| in meters after the base elevation pass.
    pub max_elevation_m: f64,
    /// Voronoi warp amplitude (radians of displacement).
    pub voronoi_warp_amplitude: f64,
    /// Voronoi warp noise frequency.
    pub voronoi_warp_frequency: f64,
    /// Bounded history ring capacity.
    pub history_capacity: usize,
    /// Output directory for CSV/PNG exports.
    pub export_dir: std::path::PathBuf,
    /// Path to the exemplar manifest (JSON). Empty disables the library.
    pub exemplar_manifest: std::path::PathBuf,
    /// Feature toggles.
    pub toggles: Toggles,
    /// Stage-B overrides.
    pub overrides: StageBOverrides,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            seed: 42,
            plate_subdivision_level: 0,
            render_subdivision_level: 3,
            lloyd_iterations: 2,
            planet_radius_m: 6_370_000.0,
            elevation_scale: 1.0,
            sea_level_m: 0.0,
            continental_fraction: 0.3,
            min_amplification_lod: 5,
            voronoi_refresh_interval_steps: 10,
            retessellation_threshold_degrees: 30.0,
            retessellation_cooldown_steps: 5,
            split_velocity_threshold: 0.05,
            split_duration_threshold_my: 20.0,
            merge_stress_threshold_mpa: 80.0,
            merge_area_ratio_threshold: 0.25,
            erosion_constant: 30.0,
            oceanic_dampening_constant: 40.0,
            sediment_diffusion_rate: 0.1,
            sediment_iterations: 3,
            hydraulic_constant: 2.0e-6,
            hydraulic_area_exponent: 0.5,
            hydraulic_slope_exponent: 1.0,
            hydraulic_downstream_deposit_ratio: 0.6,
            rift_split_threshold_m: 500_000.0,
            rift_progression_rate: 50_000.0,
            major_hotspot_count: 3,
            minor_hotspot_count: 5,
            major_hotspot_thermal_output: 1.0,
            minor_hotspot_thermal_output: 0.4,
            hotspot_drift_speed: 0.01,
            ridge_direction_dirty_ring_depth: 2,
            max_elevation_m: 10_000.0,
            voronoi_warp_amplitude: 0.05,
            voronoi_warp_frequency: 4.0,
            history_capacity: 100,
            export_dir: std::path::PathBuf::from("export"),
            exemplar_manifest: std::path::PathBuf::new(),
            toggles: Toggles::default(),
            overrides: StageBOverrides::default(),
        }
    }
}

impl SimulationParams {
    /// Range-check every numeric parameter. Returns the first violation.
    pub fn validate(&self) -> Result<(), ParameterError> {
        fn range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParameterError> {
            if value < min || value > max || !value.is_finite() {
                return Err(ParameterError::OutOfRange { name, value, min, max });
            }
            Ok(())
        }
        range("plate_subdivision_level", f64::from(self.plate_subdivision_level), 0.0, 2.0)?;
        range("render_subdivision_level", f64::from(self.render_subdivision_level), 0.0, 8.0)?;
        range("planet_radius_m", self.planet_radius_m, 1.0, 1.0e9)?;
        range("continental_fraction", self.continental_fraction, 0.0, 1.0)?;
        range("retessellation_threshold_degrees", self.retessellation_threshold_degrees, 1.0, 180.0)?;
        range("merge_area_ratio_threshold", self.merge_area_ratio_threshold, 0.0, 1.0)?;
        range("merge_stress_threshold_mpa", self.merge_stress_threshold_mpa, 0.0, 100.0)?;
        range("split_velocity_threshold", self.split_velocity_threshold, 0.0, 10.0)?;
        range("split_duration_threshold_my", self.split_duration_threshold_my, 0.0, 1.0e4)?;
        range("sediment_diffusion_rate", self.sediment_diffusion_rate, 0.0, 1.0)?;
        range("sediment_iterations", f64::from(self.sediment_iterations), 1.0, 64.0)?;
        range(
            "hydraulic_downstream_deposit_ratio",
            self.hydraulic_downstream_deposit_ratio,
            0.0,
            1.0,
        )?;
        range("rift_split_threshold_m", self.rift_split_threshold_m, 0.0, 1.0e8)?;
        range("hotspot_drift_speed", self.hotspot_drift_speed, 0.0, 1.0)?;
        range("max_elevation_m", self.max_elevation_m, 100.0, 1.0e6)?;
        range(
            "voronoi_refresh_interval_steps",
            f64::from(self.voronoi_refresh_interval_steps),
            1.0,
            1.0e6,
        )?;
        range("history_capacity", self.history_capacity as f64, 1.0, 1.0e6)?;
        if self.toggles.continental_amplification && self.exemplar_manifest.as_os_str().is_empty() {
            return Err(ParameterError::MissingExemplarLibrary(String::from("<unset>")));
        }
        Ok(())
    }

    /// True when `other` differs in a parameter that requires a full reset
    /// (anything that changes mesh topology, plate seeding, or hotspot census).
    pub fn structural_differs(&self, other: &Self) -> bool {
        self.seed != other.seed
            || self.plate_subdivision_level != other.plate_subdivision_level
            || self.render_subdivision_level != other.render_subdivision_level
            || self.lloyd_iterations != other.lloyd_iterations
            || self.continental_fraction != other.continental_fraction
            || self.major_hotspot_count != other.major_hotspot_count
            || self.minor_hotspot_count != other.minor_hotspot_count
            || self.toggles.voronoi_warping != other.toggles.voronoi_warping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SimulationParams::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_rejected() {
        let mut p = SimulationParams::default();
        p.render_subdivision_level = 9;
        match p.validate() {
            Err(ParameterError::OutOfRange { name, .. }) => {
                assert_eq!(name, "render_subdivision_level");
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn continental_amplification_requires_manifest() {
        let mut p = SimulationParams::default();
        p.toggles.continental_amplification = true;
        assert!(matches!(p.validate(), Err(ParameterError::MissingExemplarLibrary(_))));
    }

    #[test]
    fn structural_change_detected() {
        let a = SimulationParams::default();
        let mut b = a.clone();
        b.seed = 7;
        assert!(a.structural_differs(&b));
        let mut c = a.clone();
        c.erosion_constant = 5.0;
        assert!(!a.structural_differs(&c));
    }
}
