//! Plate records, seeded generation, Voronoi mapping, Lloyd relaxation, and
//! centroid migration.
//!
//! Plate IDs are stable for a whole session (new IDs only grow); hot loops go
//! through the dense `plates` vector and the id→dense map is refreshed on
//! every topology event.

use noise::{NoiseFn, Perlin};
use orogen_geo::{rotate_about_axis, spherical_mean, Vec3};
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::config::SimulationParams;
use crate::mesh::IcosphereMesh;

/// Stable plate identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlateId(pub u32);

/// Crust classification; a closed set, dispatched by match everywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrustType {
    /// Dense, young, subductable crust.
    Oceanic,
    /// Buoyant crust that accumulates age and orogeny.
    Continental,
}

/// A rigid spherical cap rotating about its Euler pole.
#[derive(Clone, Debug, PartialEq)]
pub struct Plate {
    /// Stable identifier.
    pub id: PlateId,
    /// Current centroid (unit vector).
    pub centroid: Vec3,
    /// Centroid position at build/retess time; drift is measured against this.
    pub reference_centroid: Vec3,
    /// Euler pole axis (unit vector).
    pub euler_pole_axis: Vec3,
    /// Angular speed about the pole (rad/My).
    pub angular_velocity_rad_my: f64,
    /// Crust classification.
    pub crust_type: CrustType,
    /// Crust thickness in km.
    pub crust_thickness_km: f64,
    /// Simulation-mesh vertex indices forming the plate's polygonal footprint.
    pub sim_vertices: Vec<u32>,
}

impl Plate {
    /// Angular velocity vector ω = axis · speed (rad/My).
    pub fn omega(&self) -> Vec3 {
        self.euler_pole_axis.scale(self.angular_velocity_rad_my)
    }
}

/// Dense plate storage plus the stable-id lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct Plates {
    /// Dense plate array; iteration order is id-ascending after every rebuild.
    pub plates: Vec<Plate>,
    index: HashMap<u32, usize>,
    next_id: u32,
}

const SEED_CRUST: u64 = 0x6372_7573_74; // "crust"
const SEED_POLES: u64 = 0x706f_6c65_73; // "poles"

impl Plates {
    /// Generate the initial plate census from the simulation mesh's faces.
    ///
    /// Each face of the plate-LOD icosphere becomes one plate; centroids are
    /// the spherical face means. Crust type, Euler poles, and angular speeds
    /// are drawn from seed-separated RNG streams so the census is a pure
    /// function of (mesh, params).
    pub fn generate(sim_mesh: &IcosphereMesh, params: &SimulationParams) -> Self {
        let mut crust_rng = rand::rngs::StdRng::seed_from_u64(params.seed ^ SEED_CRUST);
        let mut pole_rng = rand::rngs::StdRng::seed_from_u64(params.seed ^ SEED_POLES);

        let mut plates = Vec::with_capacity(sim_mesh.triangles.len());
        for (i, tri) in sim_mesh.triangles.iter().enumerate() {
            let a = sim_mesh.vertices[tri[0] as usize];
            let b = sim_mesh.vertices[tri[1] as usize];
            let c = sim_mesh.vertices[tri[2] as usize];
            let centroid = a.add(b).add(c).normalized();

            let crust_type = if crust_rng.gen::<f64>() < params.continental_fraction {
                CrustType::Continental
            } else {
                CrustType::Oceanic
            };
            let crust_thickness_km = match crust_type {
                CrustType::Continental => 30.0 + 10.0 * crust_rng.gen::<f64>(),
                CrustType::Oceanic => 6.0 + 2.0 * crust_rng.gen::<f64>(),
            };

            // Uniform axis on the sphere, speed in a plausible geologic band.
            let z: f64 = pole_rng.gen_range(-1.0..1.0);
            let theta: f64 = pole_rng.gen_range(0.0..std::f64::consts::TAU);
            let r = (1.0 - z * z).sqrt();
            let euler_pole_axis = Vec3::new(r * theta.cos(), r * theta.sin(), z);
            let angular_velocity_rad_my = pole_rng.gen_range(0.01..0.1);

            plates.push(Plate {
                id: PlateId(i as u32),
                centroid,
                reference_centroid: centroid,
                euler_pole_axis,
                angular_velocity_rad_my,
                crust_type,
                crust_thickness_km,
                sim_vertices: tri.to_vec(),
            });
        }

        let next_id = plates.len() as u32;
        let mut out = Self { plates, index: HashMap::new(), next_id };
        out.rebuild_index();
        out
    }

    /// Number of live plates.
    pub fn len(&self) -> usize {
        self.plates.len()
    }

    /// True when no plates exist (never the case in a valid world).
    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    /// Dense index for a stable id.
    pub fn dense_index(&self, id: PlateId) -> Option<usize> {
        self.index.get(&id.0).copied()
    }

    /// Borrow a plate by stable id.
    pub fn get(&self, id: PlateId) -> Option<&Plate> {
        self.dense_index(id).map(|i| &self.plates[i])
    }

    /// Mutably borrow a plate by stable id.
    pub fn get_mut(&mut self, id: PlateId) -> Option<&mut Plate> {
        let i = self.dense_index(id)?;
        Some(&mut self.plates[i])
    }

    /// Allocate the next stable id. IDs only grow within a session.
    pub fn allocate_id(&mut self) -> PlateId {
        let id = PlateId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Refresh the id→dense map. Call after any insert/remove.
    pub fn rebuild_index(&mut self) {
        self.plates.sort_by_key(|p| p.id);
        self.index.clear();
        for (i, p) in self.plates.iter().enumerate() {
            self.index.insert(p.id.0, i);
        }
    }

    /// Rotate every centroid by ω·Δt about its Euler pole (Rodrigues) and
    /// renormalize. The single source of plate motion.
    pub fn migrate_centroids(&mut self, dt_my: f64) {
        for p in &mut self.plates {
            let theta = p.angular_velocity_rad_my * dt_my;
            p.centroid = rotate_about_axis(p.centroid, p.euler_pole_axis, theta);
        }
    }
}

/// Coherent-noise warp applied to Voronoi query points for ragged boundaries.
pub struct VoronoiWarp {
    perlin: Perlin,
    amplitude: f64,
    frequency: f64,
}

impl VoronoiWarp {
    /// Build a warp from the global seed and configured amplitude/frequency.
    pub fn new(seed: u64, amplitude: f64, frequency: f64) -> Self {
        Self { perlin: Perlin::new(seed as u32), amplitude, frequency }
    }

    /// Displace a unit vector by three decorrelated noise channels, then
    /// renormalize. Channels are decorrelated by large input offsets.
    pub fn warp(&self, p: Vec3) -> Vec3 {
        let f = self.frequency;
        let nx = self.perlin.get([p.x * f, p.y * f, p.z * f]);
        let ny = self.perlin.get([p.x * f + 31.7, p.y * f + 31.7, p.z * f + 31.7]);
        let nz = self.perlin.get([p.x * f - 47.3, p.y * f - 47.3, p.z * f - 47.3]);
        p.add(Vec3::new(nx, ny, nz).scale(self.amplitude)).normalized()
    }
}

/// Assign each render vertex to the plate whose centroid has the greatest dot
/// product with it. Ties break toward the smaller PlateId, which keeps the
/// mapping deterministic across runs.
pub fn assign_voronoi(
    render: &IcosphereMesh,
    plates: &Plates,
    warp: Option<&VoronoiWarp>,
) -> Vec<u32> {
    const EPS_DOT: f64 = 1e-12;
    let mut assignments = vec![0u32; render.vertices.len()];
    for (i, &v) in render.vertices.iter().enumerate() {
        let q = match warp {
            Some(w) => w.warp(v),
            None => v,
        };
        let mut best_id = plates.plates[0].id;
        let mut best_dot = -2.0f64;
        for p in &plates.plates {
            let d = q.dot(p.centroid);
            if d > best_dot + EPS_DOT || ((d - best_dot).abs() <= EPS_DOT && p.id < best_id) {
                best_dot = d;
                best_id = p.id;
            }
        }
        assignments[i] = best_id.0;
    }
    assignments
}

/// Lloyd relaxation: move each centroid to the spherical mean of its owned
/// render vertices, then re-run Voronoi. Plates that own no vertices keep
/// their centroid (deterministic no-op).
pub fn lloyd_relax(
    render: &IcosphereMesh,
    plates: &mut Plates,
    iterations: u32,
    warp: Option<&VoronoiWarp>,
) -> Vec<u32> {
    let mut assignments = assign_voronoi(render, plates, warp);
    for _ in 0..iterations {
        for pi in 0..plates.plates.len() {
            let id = plates.plates[pi].id.0;
            let owned = render
                .vertices
                .iter()
                .zip(assignments.iter())
                .filter(|(_, &a)| a == id)
                .map(|(&v, _)| v);
            if let Some(mean) = spherical_mean(owned) {
                plates.plates[pi].centroid = mean;
                plates.plates[pi].reference_centroid = mean;
            }
        }
        assignments = assign_voronoi(render, plates, warp);
    }
    assignments
}

/// Per-plate surface area in km², accumulated from owned render-vertex dual
/// areas. Returned dense-aligned with `plates.plates`.
pub fn plate_areas_km2(
    render: &IcosphereMesh,
    assignments: &[u32],
    plates: &Plates,
    planet_radius_m: f64,
) -> Vec<f64> {
    let r_km = planet_radius_m / 1000.0;
    let scale = r_km * r_km;
    let mut areas = vec![0.0f64; plates.plates.len()];
    for (i, &a) in assignments.iter().enumerate() {
        if let Some(di) = plates.dense_index(PlateId(a)) {
            areas[di] += render.area_sr[i] * scale;
        }
    }
    areas
}
