//! The simulation world and the fixed per-step pipeline.
//!
//! A step is strictly ordered: plate motion, boundary kinematics, field
//! solvers, topology changes, terranes, surface processes, base elevation,
//! Stage-B amplification. Every stochastic choice derives from the seed, so
//! two worlds with equal parameters stay bit-comparable step for step.

use orogen_geo::Vec3;
use std::time::Instant;

use crate::boundaries::{interpolate_stress, Boundaries, BoundaryStats};
use crate::config::{SimulationParams, STEP_DT_MY};
use crate::errors::{ParameterError, TerraneError, TopologyError};
use crate::fields::{self, OrogenyClass};
use crate::hotspots::{drift_hotspots, generate_hotspots, Hotspot};
use crate::hydraulic::{apply_hydraulic_erosion, HydraulicStats};
use crate::mesh::{IcosphereMesh, INDEX_NONE};
use crate::plates::{assign_voronoi, lloyd_relax, CrustType, PlateId, Plates, VoronoiWarp};
use crate::retess::{retessellate, should_retessellate, RetessStats};
use crate::stageb::ridge::RidgeStats;
use crate::stageb::{AmplifyInputs, StageB};
use crate::surface::{apply_surface_processes, SurfaceFields, SurfaceStats};
use crate::terranes::{TerraneFields, Terranes};
use crate::topology::{detect_and_apply_merge, detect_and_apply_split, TopologyEvent};

/// Base-elevation change (m) that marks a vertex's ridge direction dirty.
const RIDGE_DIRTY_ELEVATION_M: f64 = 50.0;

/// Step counter and derived simulation time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Clock {
    /// Committed steps since the initial state.
    pub step: u64,
    /// Simulation time, always `step * STEP_DT_MY`.
    pub time_my: f64,
}

/// Parallel per-render-vertex arrays. All vectors share the render vertex
/// count and are resized only on a full reset.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexFields {
    /// Plate angular velocity at the vertex (rad/My tangent vector).
    pub velocity: Vec<Vec3>,
    /// Interpolated boundary stress (MPa).
    pub stress_mpa: Vec<f64>,
    /// Mantle temperature (K).
    pub temperature_k: Vec<f64>,
    /// Crust age (My).
    pub crust_age_my: Vec<f64>,
    /// Base elevation (m).
    pub elevation_m: Vec<f64>,
    /// Stage-B amplified elevation (m); equals base when inactive.
    pub amplified_elevation_m: Vec<f64>,
    /// Accumulated surface-process offset folded into the base elevation (m).
    pub surface_offset_m: Vec<f64>,
    /// In-transit sediment column (m).
    pub sediment_m: Vec<f64>,
    /// Net surface-offset change rate of the last step (m/My).
    pub erosion_rate_m_my: Vec<f64>,
    /// Orogeny classification.
    pub orogeny: Vec<OrogenyClass>,
    /// Fold direction along the nearest convergent boundary.
    pub fold_direction: Vec<Vec3>,
    /// Downhill link per vertex ([`INDEX_NONE`] when none).
    pub downhill: Vec<u32>,
}

impl VertexFields {
    fn new(n: usize) -> Self {
        Self {
            velocity: vec![Vec3::ZERO; n],
            stress_mpa: vec![0.0; n],
            temperature_k: vec![0.0; n],
            crust_age_my: vec![0.0; n],
            elevation_m: vec![0.0; n],
            amplified_elevation_m: vec![0.0; n],
            surface_offset_m: vec![0.0; n],
            sediment_m: vec![0.0; n],
            erosion_rate_m_my: vec![0.0; n],
            orogeny: vec![OrogenyClass::Plain; n],
            fold_direction: vec![Vec3::ZERO; n],
            downhill: vec![INDEX_NONE; n],
        }
    }
}

/// Everything one committed step reports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStats {
    /// Step index after the commit.
    pub step: u64,
    /// Simulation time after the commit (My).
    pub time_my: f64,
    /// Live plate count.
    pub plate_count: usize,
    /// Boundary class counts.
    pub boundaries: BoundaryStats,
    /// Surface-process accounting.
    pub surface: SurfaceStats,
    /// Hydraulic accounting.
    pub hydraulic: HydraulicStats,
    /// Ridge-cache counters.
    pub ridge: RidgeStats,
    /// Topology events committed this step.
    pub events: Vec<TopologyEvent>,
    /// Wall-clock total (ms).
    pub total_ms: f64,
    /// Wall-clock spent in motion + boundary kinematics (ms).
    pub motion_ms: f64,
    /// Wall-clock spent in the field solvers (ms).
    pub fields_ms: f64,
    /// Wall-clock spent in topology + terranes (ms).
    pub topology_ms: f64,
    /// Wall-clock spent in surface + hydraulic passes (ms).
    pub surface_ms: f64,
    /// Wall-clock spent in Stage-B amplification (ms).
    pub stageb_ms: f64,
}

/// Deep copy of the restorable simulation state.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    /// Clock at capture time.
    pub clock: Clock,
    plates: Plates,
    assignments: Vec<u32>,
    boundaries: Boundaries,
    hotspots: Vec<Hotspot>,
    terranes: Terranes,
    fields: VertexFields,
    topology_version: u64,
    surface_version: u64,
    retess_stats: RetessStats,
}

/// The full simulation state plus its derived caches.
pub struct World {
    /// Active parameters.
    pub params: SimulationParams,
    /// Plate-LOD icosphere whose faces seeded the plates.
    pub sim_mesh: IcosphereMesh,
    /// Render-LOD icosphere carrying the vertex fields.
    pub render_mesh: IcosphereMesh,
    /// Plate census.
    pub plates: Plates,
    /// Plate assignment per render vertex.
    pub assignments: Vec<u32>,
    /// Boundary map.
    pub boundaries: Boundaries,
    /// Hotspot census (empty while the toggle is off).
    pub hotspots: Vec<Hotspot>,
    /// Terranes of the session.
    pub terranes: Terranes,
    /// Per-vertex fields.
    pub fields: VertexFields,
    /// Step clock.
    pub clock: Clock,
    /// Bumped on split, merge, retess, and terrane events.
    pub topology_version: u64,
    /// Bumped once per committed step.
    pub surface_version: u64,
    /// Re-tessellation cadence counters.
    pub retess_stats: RetessStats,
    /// Topology event log for the session.
    pub events: Vec<TopologyEvent>,
    stageb: StageB,
    amplified_topology_version: u64,
    amplified_surface_version: u64,
    warp: Option<VoronoiWarp>,
}

impl World {
    /// Build a world from validated parameters. Rejecting invalid parameters
    /// here keeps every later pass free of range checks.
    pub fn new(params: SimulationParams) -> Result<Self, ParameterError> {
        params.validate()?;

        let sim_mesh = IcosphereMesh::build(params.plate_subdivision_level);
        let render_mesh = IcosphereMesh::build(params.render_subdivision_level);
        let warp = params.toggles.voronoi_warping.then(|| {
            VoronoiWarp::new(
                params.seed,
                params.voronoi_warp_amplitude,
                params.voronoi_warp_frequency,
            )
        });

        let mut plates = Plates::generate(&sim_mesh, &params);
        let assignments =
            lloyd_relax(&render_mesh, &mut plates, params.lloyd_iterations, warp.as_ref());
        let boundaries = Boundaries::rebuild(&render_mesh, &assignments, None);
        let hotspots =
            if params.toggles.hotspots { generate_hotspots(&params) } else { Vec::new() };

        let n = render_mesh.vertices.len();
        let mut world = Self {
            stageb: StageB::new(n),
            fields: VertexFields::new(n),
            params,
            sim_mesh,
            render_mesh,
            plates,
            assignments,
            boundaries,
            hotspots,
            terranes: Terranes::default(),
            clock: Clock::default(),
            topology_version: 0,
            surface_version: 0,
            retess_stats: RetessStats::default(),
            events: Vec::new(),
            amplified_topology_version: u64::MAX,
            amplified_surface_version: u64::MAX,
            warp,
        };
        world.refresh_fields_initial();
        Ok(world)
    }

    /// Initial field fill so exports and history work before the first step.
    fn refresh_fields_initial(&mut self) {
        fields::compute_velocities(
            &self.render_mesh,
            &self.plates,
            &self.assignments,
            &mut self.fields.velocity,
        );
        interpolate_stress(&self.render_mesh, &self.boundaries, &mut self.fields.stress_mpa);
        fields::update_temperature(
            &self.render_mesh,
            &self.fields.stress_mpa,
            &self.hotspots,
            &mut self.fields.temperature_k,
        );
        fields::compute_elevation_base(
            &self.render_mesh,
            &self.assignments,
            &self.plates,
            &self.fields.stress_mpa,
            &self.fields.crust_age_my,
            &self.hotspots,
            &self.fields.surface_offset_m,
            &self.params,
            &mut self.fields.elevation_m,
        );
        self.fields.amplified_elevation_m = self.fields.elevation_m.clone();
    }

    /// True when the amplified field matches the committed state.
    pub fn stageb_ready(&self) -> bool {
        self.amplified_topology_version == self.topology_version
            && self.amplified_surface_version == self.surface_version
    }

    /// Oceanic/continental masks for the current assignment.
    fn crust_masks(&self) -> (Vec<bool>, Vec<bool>) {
        let oceanic: Vec<bool> = self
            .assignments
            .iter()
            .map(|&a| {
                self.plates.get(PlateId(a)).map(|p| p.crust_type) == Some(CrustType::Oceanic)
            })
            .collect();
        let continental = oceanic.iter().map(|&o| !o).collect();
        (oceanic, continental)
    }

    /// Capture a deep snapshot of the restorable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            clock: self.clock,
            plates: self.plates.clone(),
            assignments: self.assignments.clone(),
            boundaries: self.boundaries.clone(),
            hotspots: self.hotspots.clone(),
            terranes: self.terranes.clone(),
            fields: self.fields.clone(),
            topology_version: self.topology_version,
            surface_version: self.surface_version,
            retess_stats: self.retess_stats,
        }
    }

    /// Restore a snapshot bit-identically. The ridge cache is rebuilt lazily
    /// on the next amplification, so derived data stays consistent.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.clock = snapshot.clock;
        self.plates = snapshot.plates.clone();
        self.assignments = snapshot.assignments.clone();
        self.boundaries = snapshot.boundaries.clone();
        self.hotspots = snapshot.hotspots.clone();
        self.terranes = snapshot.terranes.clone();
        self.fields = snapshot.fields.clone();
        self.topology_version = snapshot.topology_version;
        self.surface_version = snapshot.surface_version;
        self.retess_stats = snapshot.retess_stats;
        self.stageb.ridge.mark_all_dirty();
        // The restored amplified field is valid for the restored versions.
        self.amplified_topology_version = self.topology_version;
        self.amplified_surface_version = self.surface_version;
    }

    /// Host-initiated terrane extraction at the current simulation time.
    /// Counts as a topology change, so Stage-B output goes stale until the
    /// next committed step.
    pub fn extract_terrane(&mut self, region: &[u32]) -> Result<u32, TerraneError> {
        let t_my = self.clock.time_my;
        let id = self.terranes.extract(
            &self.render_mesh,
            &mut self.assignments,
            &self.plates,
            TerraneFields {
                elevation_m: &mut self.fields.elevation_m,
                crust_age_my: &mut self.fields.crust_age_my,
                surface_offset_m: &mut self.fields.surface_offset_m,
                sediment_m: &mut self.fields.sediment_m,
            },
            region,
            self.params.planet_radius_m,
            t_my,
        )?;
        let source = self.terranes.get(id)?.source_plate;
        self.boundaries =
            Boundaries::rebuild(&self.render_mesh, &self.assignments, Some(&self.boundaries));
        self.topology_version += 1;
        self.stageb.ridge.mark_all_dirty();
        self.events.push(TopologyEvent::TerraneExtracted { terrane: id, source, time_my: t_my });
        Ok(id)
    }

    /// Host-initiated suture of terrane `id` onto `target`.
    pub fn reattach_terrane(&mut self, id: u32, target: PlateId) -> Result<(), TerraneError> {
        let t_my = self.clock.time_my;
        self.terranes.reattach(
            &mut self.assignments,
            &self.plates,
            TerraneFields {
                elevation_m: &mut self.fields.elevation_m,
                crust_age_my: &mut self.fields.crust_age_my,
                surface_offset_m: &mut self.fields.surface_offset_m,
                sediment_m: &mut self.fields.sediment_m,
            },
            id,
            target,
            t_my,
        )?;
        self.boundaries =
            Boundaries::rebuild(&self.render_mesh, &self.assignments, Some(&self.boundaries));
        self.topology_version += 1;
        self.stageb.ridge.mark_all_dirty();
        self.events.push(TopologyEvent::TerraneReattached { terrane: id, target, time_my: t_my });
        Ok(())
    }

    /// Advance exactly one 2-My step. On error the caller restores the
    /// pre-step snapshot; the world may be mid-mutation.
    pub fn step_once(&mut self) -> Result<StepStats, TopologyError> {
        let t_total = Instant::now();
        let dt = STEP_DT_MY;
        let t_my = self.clock.time_my;
        let next_step = self.clock.step + 1;
        let mut stats = StepStats::default();
        let offset_before = self.fields.surface_offset_m.clone();

        // Motion and boundary kinematics.
        let t0 = Instant::now();
        self.plates.migrate_centroids(dt);
        if self.params.toggles.hotspots {
            drift_hotspots(&mut self.hotspots, dt);
        }
        self.terranes.advance(&self.plates, dt);

        if should_retessellate(&self.plates, &self.params, next_step, &mut self.retess_stats) {
            retessellate(
                &self.render_mesh,
                &mut self.plates,
                &mut self.assignments,
                &mut self.boundaries,
                self.warp.as_ref(),
                next_step,
                &mut self.retess_stats,
            )?;
            self.topology_version += 1;
            self.stageb.ridge.mark_all_dirty();
        } else if next_step % u64::from(self.params.voronoi_refresh_interval_steps) == 0 {
            let refreshed = assign_voronoi(&self.render_mesh, &self.plates, self.warp.as_ref());
            let changed: Vec<u32> = refreshed
                .iter()
                .zip(&self.assignments)
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(|(i, _)| i as u32)
                .collect();
            if !changed.is_empty() {
                self.stageb.ridge.mark_dirty_ring(
                    &self.render_mesh,
                    &changed,
                    self.params.ridge_direction_dirty_ring_depth,
                );
                self.assignments = refreshed;
                self.boundaries =
                    Boundaries::rebuild(&self.render_mesh, &self.assignments, Some(&self.boundaries));
            }
        }
        self.boundaries.update_kinematics(&self.plates, &self.params, t_my, dt);
        stats.motion_ms = t0.elapsed().as_secs_f64() * 1e3;

        // Field solvers.
        let t1 = Instant::now();
        fields::compute_velocities(
            &self.render_mesh,
            &self.plates,
            &self.assignments,
            &mut self.fields.velocity,
        );
        interpolate_stress(&self.render_mesh, &self.boundaries, &mut self.fields.stress_mpa);
        fields::update_temperature(
            &self.render_mesh,
            &self.fields.stress_mpa,
            &self.hotspots,
            &mut self.fields.temperature_k,
        );
        fields::update_crust_age(
            &self.assignments,
            &self.plates,
            &self.boundaries,
            &mut self.fields.crust_age_my,
            dt,
        );
        stats.fields_ms = t1.elapsed().as_secs_f64() * 1e3;

        // Topology changes and terranes.
        let t2 = Instant::now();
        let expected_after_split = self.plates.len() + 1;
        if let Some(event) =
            detect_and_apply_split(&mut self.plates, &self.boundaries, &self.params, t_my)
        {
            if self.plates.len() != expected_after_split {
                return Err(TopologyError::PlateCountMismatch {
                    expected: expected_after_split,
                    actual: self.plates.len(),
                });
            }
            self.assignments = assign_voronoi(&self.render_mesh, &self.plates, self.warp.as_ref());
            self.boundaries =
                Boundaries::rebuild(&self.render_mesh, &self.assignments, Some(&self.boundaries));
            self.topology_version += 1;
            self.stageb.ridge.mark_all_dirty();
            stats.events.push(event.clone());
            self.events.push(event);
        }
        if let Some(event) = detect_and_apply_merge(
            &self.render_mesh,
            &mut self.assignments,
            &mut self.plates,
            &self.boundaries,
            &self.params,
            t_my,
        ) {
            self.boundaries =
                Boundaries::rebuild(&self.render_mesh, &self.assignments, Some(&self.boundaries));
            self.topology_version += 1;
            self.stageb.ridge.mark_all_dirty();
            stats.events.push(event.clone());
            self.events.push(event);
        }
        if let Some(bad) = self
            .assignments
            .iter()
            .position(|&a| self.plates.get(PlateId(a)).is_none())
        {
            return Err(TopologyError::UnassignedVertex(bad as u32));
        }

        // Suture collisions flagged on an earlier step, then flag new ones,
        // so the colliding state survives at least one committed snapshot.
        for (id, target) in self.terranes.colliding_pairs() {
            let sutured = self.terranes.reattach(
                &mut self.assignments,
                &self.plates,
                TerraneFields {
                    elevation_m: &mut self.fields.elevation_m,
                    crust_age_my: &mut self.fields.crust_age_my,
                    surface_offset_m: &mut self.fields.surface_offset_m,
                    sediment_m: &mut self.fields.sediment_m,
                },
                id,
                target,
                t_my,
            );
            match sutured {
                Ok(()) => {
                    self.topology_version += 1;
                    self.stageb.ridge.mark_all_dirty();
                    let event =
                        TopologyEvent::TerraneReattached { terrane: id, target, time_my: t_my };
                    stats.events.push(event.clone());
                    self.events.push(event);
                }
                Err(e) => {
                    println!("[terrane] suture of terrane {id} failed: {e}");
                    self.terranes.abort_collision(id);
                }
            }
        }
        for (id, target) in self.terranes.update_collisions(
            &self.render_mesh,
            &self.assignments,
            &self.plates,
            self.params.planet_radius_m,
        ) {
            println!("[terrane] terrane {id} colliding with plate {} at t={t_my} My", target.0);
        }
        stats.topology_ms = t2.elapsed().as_secs_f64() * 1e3;

        // Surface processes.
        let t3 = Instant::now();
        stats.surface = apply_surface_processes(
            &self.render_mesh,
            &self.assignments,
            &self.plates,
            &self.boundaries,
            SurfaceFields {
                elevation_m: &self.fields.elevation_m,
                surface_offset_m: &mut self.fields.surface_offset_m,
                sediment_m: &mut self.fields.sediment_m,
            },
            &self.params,
            dt,
        );
        if self.params.toggles.hydraulic_erosion {
            stats.hydraulic = apply_hydraulic_erosion(
                &self.render_mesh,
                &self.fields.elevation_m,
                &self.fields.crust_age_my,
                &mut self.fields.surface_offset_m,
                &mut self.fields.downhill,
                &self.params,
                dt,
            );
        }
        for (r, (after, before)) in self
            .fields
            .erosion_rate_m_my
            .iter_mut()
            .zip(self.fields.surface_offset_m.iter().zip(&offset_before))
        {
            *r = (after - before) / dt;
        }
        stats.surface_ms = t3.elapsed().as_secs_f64() * 1e3;

        // Base elevation and classification.
        let previous_elevation = self.fields.elevation_m.clone();
        fields::compute_elevation_base(
            &self.render_mesh,
            &self.assignments,
            &self.plates,
            &self.fields.stress_mpa,
            &self.fields.crust_age_my,
            &self.hotspots,
            &self.fields.surface_offset_m,
            &self.params,
            &mut self.fields.elevation_m,
        );
        fields::classify_orogeny(
            &self.assignments,
            &self.plates,
            &self.boundaries,
            &self.fields.crust_age_my,
            &mut self.fields.orogeny,
            &mut self.fields.fold_direction,
        );
        let moved: Vec<u32> = previous_elevation
            .iter()
            .zip(&self.fields.elevation_m)
            .enumerate()
            .filter(|(_, (a, b))| (*a - *b).abs() > RIDGE_DIRTY_ELEVATION_M)
            .map(|(i, _)| i as u32)
            .collect();
        if !moved.is_empty() {
            self.stageb.ridge.mark_dirty_ring(
                &self.render_mesh,
                &moved,
                self.params.ridge_direction_dirty_ring_depth,
            );
        }

        // Stage-B amplification.
        let t4 = Instant::now();
        let (oceanic, continental) = self.crust_masks();
        stats.ridge = self.stageb.amplify(
            &self.render_mesh,
            &AmplifyInputs {
                oceanic: &oceanic,
                continental: &continental,
                classes: &self.fields.orogeny,
                crust_age_my: &self.fields.crust_age_my,
                velocities: &self.fields.velocity,
                boundaries: &self.boundaries,
                base_elevation_m: &self.fields.elevation_m,
            },
            &self.params,
            &mut self.fields.amplified_elevation_m,
        );
        stats.stageb_ms = t4.elapsed().as_secs_f64() * 1e3;

        // Commit.
        self.clock.step = next_step;
        self.clock.time_my = next_step as f64 * STEP_DT_MY;
        self.surface_version += 1;
        self.amplified_topology_version = self.topology_version;
        self.amplified_surface_version = self.surface_version;

        stats.step = self.clock.step;
        stats.time_my = self.clock.time_my;
        stats.plate_count = self.plates.len();
        stats.boundaries = self.boundaries.stats;
        stats.total_ms = t_total.elapsed().as_secs_f64() * 1e3;
        println!(
            "[step] {} t={} My plates={} div/conv/trans={}/{}/{} events={} \
             motion={:.2}ms fields={:.2}ms topo={:.2}ms surface={:.2}ms stageb={:.2}ms total={:.2}ms",
            stats.step,
            stats.time_my,
            stats.plate_count,
            stats.boundaries.divergent,
            stats.boundaries.convergent,
            stats.boundaries.transform,
            stats.events.len(),
            stats.motion_ms,
            stats.fields_ms,
            stats.topology_ms,
            stats.surface_ms,
            stats.stageb_ms,
            stats.total_ms,
        );
        Ok(stats)
    }
}
