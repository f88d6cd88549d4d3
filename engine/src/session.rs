//! Host-facing session: a world, its bounded history, and export plumbing.
//!
//! The session is the only writer of the world. Each committed step appends a
//! deep snapshot to the history ring and a metrics row; a failed step rolls
//! the world back to the pre-step snapshot, so the host never observes a
//! half-applied step.

use std::path::PathBuf;

use crate::config::SimulationParams;
use crate::errors::{ExportError, ParameterError, TerraneError, TopologyError};
use crate::export::{
    export_heightmap_png, export_metrics_csv, export_terranes_csv, MetricsRow,
};
use crate::history::History;
use crate::mesh::IcosphereMesh;
use crate::metrics::{hypsometry_percent, ridge_trench_ratio, velocity_stats};
use crate::plates::PlateId;
use crate::world::{Snapshot, StepStats, World};

/// Default heightmap export width in pixels; height is always width / 2.
pub const DEFAULT_HEIGHTMAP_WIDTH: u32 = 2048;

/// One simulation session: world state, undo history, metrics accumulator.
pub struct Session {
    world: World,
    history: History<Snapshot>,
    metrics: Vec<MetricsRow>,
}

impl Session {
    /// Start a session from validated parameters. The initial state is
    /// snapshot zero, so undo can always return to it.
    pub fn new(params: SimulationParams) -> Result<Self, ParameterError> {
        let world = World::new(params)?;
        let mut history = History::new(world.params.history_capacity);
        history.push(world.snapshot());
        Ok(Self { world, history, metrics: Vec::new() })
    }

    /// Read access to the world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Active parameters.
    pub fn params(&self) -> &SimulationParams {
        &self.world.params
    }

    /// Metrics rows accumulated since the last reset.
    pub fn metrics(&self) -> &[MetricsRow] {
        &self.metrics
    }

    /// Number of history snapshots and the cursor position.
    pub fn history_len(&self) -> (usize, usize) {
        (self.history.len(), self.history.cursor())
    }

    /// Replace the parameters. Invalid values are rejected without touching
    /// any state; a structural change rebuilds the world and clears history.
    pub fn set_parameters(&mut self, params: SimulationParams) -> Result<(), ParameterError> {
        params.validate()?;
        if self.world.params.structural_differs(&params) {
            self.world = World::new(params)?;
            self.history.clear();
            self.history.push(self.world.snapshot());
            self.metrics.clear();
        } else {
            self.world.params = params;
        }
        Ok(())
    }

    /// Rebuild the world from the current parameters and drop all history.
    pub fn reset(&mut self) -> Result<(), ParameterError> {
        let params = self.world.params.clone();
        self.world = World::new(params)?;
        self.history.clear();
        self.history.push(self.world.snapshot());
        self.metrics.clear();
        Ok(())
    }

    /// Advance `n` steps. Stops at the first failure after rolling the world
    /// back to the last committed state; completed steps stay committed.
    pub fn advance_steps(&mut self, n: u32) -> Result<Vec<StepStats>, TopologyError> {
        let mut all = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let before = self.world.snapshot();
            match self.world.step_once() {
                Ok(stats) => {
                    self.record_metrics(&stats);
                    self.history.push(self.world.snapshot());
                    all.push(stats);
                }
                Err(e) => {
                    self.world.restore(&before);
                    return Err(e);
                }
            }
        }
        Ok(all)
    }

    fn record_metrics(&mut self, stats: &StepStats) {
        let w = &self.world;
        self.metrics.push(MetricsRow {
            step: stats.step,
            time_my: stats.time_my,
            plate_count: stats.plate_count,
            ridge_trench_ratio: ridge_trench_ratio(&w.boundaries),
            velocity: velocity_stats(
                &w.fields.velocity,
                &w.render_mesh.area_sr,
                w.params.planet_radius_m,
            ),
            hypsometry: hypsometry_percent(&w.fields.elevation_m, &w.render_mesh.area_sr),
            step_ms: stats.total_ms,
        });
    }

    /// Step back one snapshot. Returns false at the oldest state.
    pub fn undo(&mut self) -> bool {
        match self.history.undo().cloned() {
            Some(snap) => {
                self.world.restore(&snap);
                true
            }
            None => false,
        }
    }

    /// Step forward one snapshot. Returns false at the newest state.
    pub fn redo(&mut self) -> bool {
        match self.history.redo().cloned() {
            Some(snap) => {
                self.world.restore(&snap);
                true
            }
            None => false,
        }
    }

    /// Jump to an absolute history index. Returns false when out of range.
    pub fn jump_to_history_index(&mut self, index: usize) -> bool {
        match self.history.jump(index).cloned() {
            Some(snap) => {
                self.world.restore(&snap);
                true
            }
            None => false,
        }
    }

    /// Carve a terrane out of a continental plate and snapshot the result.
    pub fn extract_terrane(&mut self, region: &[u32]) -> Result<u32, TerraneError> {
        let id = self.world.extract_terrane(region)?;
        self.history.push(self.world.snapshot());
        Ok(id)
    }

    /// Suture a terrane onto a continental plate and snapshot the result.
    pub fn reattach_terrane(&mut self, id: u32, target: PlateId) -> Result<(), TerraneError> {
        self.world.reattach_terrane(id, target)?;
        self.history.push(self.world.snapshot());
        Ok(())
    }

    /// Write the metrics CSV into the configured export directory.
    pub fn export_metrics(&self) -> Result<PathBuf, ExportError> {
        export_metrics_csv(&self.world.params.export_dir, &self.metrics)
    }

    /// Write the terranes CSV into the configured export directory.
    pub fn export_terranes(&self) -> Result<PathBuf, ExportError> {
        export_terranes_csv(&self.world.params.export_dir, &self.world.terranes)
    }

    /// Write the equirectangular heightmap PNG. Amplified elevation is used
    /// when it matches the committed state, base elevation otherwise. The LOD
    /// override exports from a coarser mesh; subdivision keeps coarse
    /// vertices as a prefix of the fine vertex array, so resampling is a
    /// truncation.
    pub fn export_heightmap(&self, width: u32) -> Result<PathBuf, ExportError> {
        let w = &self.world;
        let elevation = if w.stageb_ready() {
            &w.fields.amplified_elevation_m
        } else {
            &w.fields.elevation_m
        };
        let width = width.max(4);
        let height = width / 2;
        match w.params.overrides.export_lod_override {
            Some(lod) if lod < w.params.render_subdivision_level => {
                let coarse = IcosphereMesh::build(lod);
                let truncated = &elevation[..coarse.vertices.len()];
                export_heightmap_png(
                    &coarse,
                    truncated,
                    &w.params,
                    &w.params.export_dir,
                    width,
                    height,
                )
            }
            _ => export_heightmap_png(
                &w.render_mesh,
                elevation,
                &w.params,
                &w.params.export_dir,
                width,
                height,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plates::CrustType;

    #[test]
    fn undo_returns_bit_identical_state() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(3).unwrap();
        let before = session.world.snapshot();
        session.advance_steps(1).unwrap();
        assert!(session.undo());
        assert_eq!(session.world.snapshot(), before);
        assert!(session.redo());
        assert_eq!(session.world.clock.step, 4);
    }

    #[test]
    fn undo_past_initial_state_is_refused() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        assert!(!session.undo());
        session.advance_steps(1).unwrap();
        assert!(session.undo());
        assert!(!session.undo());
        assert_eq!(session.world.clock.step, 0);
    }

    #[test]
    fn stepping_after_undo_drops_redo_branch() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(4).unwrap();
        session.undo();
        session.undo();
        session.advance_steps(1).unwrap();
        assert!(!session.redo());
        assert_eq!(session.world.clock.step, 3);
    }

    #[test]
    fn invalid_parameters_leave_state_untouched() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(2).unwrap();
        let before = session.world.snapshot();
        let mut bad = session.params().clone();
        bad.continental_fraction = 1.5;
        assert!(session.set_parameters(bad).is_err());
        assert_eq!(session.world.snapshot(), before);
    }

    #[test]
    fn structural_parameter_change_resets_world_and_history() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(3).unwrap();
        let mut params = session.params().clone();
        params.seed = 7;
        session.set_parameters(params).unwrap();
        assert_eq!(session.world.clock.step, 0);
        assert_eq!(session.history_len(), (1, 0));
        assert!(session.metrics().is_empty());
        assert!(!session.undo());
    }

    #[test]
    fn tuning_parameter_change_keeps_state() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(2).unwrap();
        let mut params = session.params().clone();
        params.erosion_constant = 12.0;
        session.set_parameters(params).unwrap();
        assert_eq!(session.world.clock.step, 2);
        assert_eq!(session.params().erosion_constant, 12.0);
    }

    #[test]
    fn manual_terrane_ops_are_undoable() {
        let mut params = SimulationParams::default();
        params.render_subdivision_level = 4;
        let mut session = Session::new(params).unwrap();
        let w = session.world();
        let plate = w
            .plates
            .plates
            .iter()
            .find(|p| p.crust_type == CrustType::Continental)
            .unwrap()
            .id;
        // Flood the whole plate; a full plate region has a closed rim.
        let region: Vec<u32> = (0..w.render_mesh.vertices.len() as u32)
            .filter(|&v| w.assignments[v as usize] == plate.0)
            .collect();
        let id = session.extract_terrane(&region).unwrap();
        let carrier = session.world().terranes.get(id).unwrap().carrier_plate;
        assert_ne!(carrier, plate);
        assert!(session.undo());
        assert!(session.world().terranes.terranes.is_empty());
        assert!(session.redo());
        session.reattach_terrane(id, plate).unwrap();
        for &v in &session.world().terranes.get(id).unwrap().vertices.clone() {
            assert_eq!(session.world().assignments[v as usize], plate.0);
        }
    }

    #[test]
    fn metrics_accumulate_per_step() {
        let mut session = Session::new(SimulationParams::default()).unwrap();
        session.advance_steps(3).unwrap();
        assert_eq!(session.metrics().len(), 3);
        assert_eq!(session.metrics()[2].step, 3);
        let sum: f64 = session.metrics()[0].hypsometry.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }
}
