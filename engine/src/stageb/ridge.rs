//! Ridge direction cache for oceanic amplification.
//!
//! Oceanic detail is oriented by the direction of the ridge that created the
//! crust. Directions are cached per render vertex; the dirty mask is the only
//! trigger for recomputation, set on topology events and around locally
//! changed vertices, so steady-state steps touch almost nothing.

use orogen_geo::Vec3;
use std::collections::VecDeque;

use crate::boundaries::{Boundaries, BoundaryType};
use crate::mesh::IcosphereMesh;

/// Search radius for seeding a direction from a divergent boundary (radians).
const RIDGE_SEED_RADIUS_RAD: f64 = 1.0;
/// Minimum tangent-plane gradient magnitude for the gradient fallback.
const GRADIENT_EPS: f64 = 1.0e-9;

/// Per-update counters for the fallback ladder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RidgeStats {
    /// Oceanic vertices considered.
    pub evaluated: u64,
    /// Vertices served from the cache without recomputation.
    pub cache_hits: u64,
    /// Dirty vertices seeded from a nearby divergent edge tangent.
    pub edge_seeded: u64,
    /// Dirty vertices that fell back to the elevation gradient.
    pub gradient_fallbacks: u64,
    /// Dirty vertices that copied a neighbor's cached direction.
    pub neighbor_fallbacks: u64,
    /// Dirty vertices that fell back to the plate motion direction.
    pub motion_fallbacks: u64,
}

impl RidgeStats {
    /// Fraction of evaluated vertices served from the cache.
    pub fn hit_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 1.0;
        }
        self.cache_hits as f64 / self.evaluated as f64
    }

    /// Fraction of evaluated vertices that used the gradient fallback.
    pub fn gradient_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 0.0;
        }
        self.gradient_fallbacks as f64 / self.evaluated as f64
    }

    /// Fraction of evaluated vertices that used the motion fallback.
    pub fn motion_rate(&self) -> f64 {
        if self.evaluated == 0 {
            return 0.0;
        }
        self.motion_fallbacks as f64 / self.evaluated as f64
    }
}

/// Cached ridge-parallel unit tangents with their dirty mask.
#[derive(Clone, Debug, PartialEq)]
pub struct RidgeCache {
    /// Cached direction per render vertex; zero until first computed.
    pub directions: Vec<Vec3>,
    dirty: Vec<bool>,
    /// Counters from the most recent [`RidgeCache::update`].
    pub stats: RidgeStats,
}

impl RidgeCache {
    /// Fresh cache with every vertex dirty.
    pub fn new(vertex_count: usize) -> Self {
        Self {
            directions: vec![Vec3::ZERO; vertex_count],
            dirty: vec![true; vertex_count],
            stats: RidgeStats::default(),
        }
    }

    /// Number of currently dirty vertices.
    pub fn dirty_count(&self) -> usize {
        self.dirty.iter().filter(|&&d| d).count()
    }

    /// Mark every vertex dirty. Used after topology events.
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Mark `seeds` dirty plus `ring_depth` rings of neighbors around them.
    pub fn mark_dirty_ring(&mut self, render: &IcosphereMesh, seeds: &[u32], ring_depth: u32) {
        let mut queue: VecDeque<(u32, u32)> = VecDeque::new();
        for &s in seeds {
            if !self.dirty[s as usize] {
                self.dirty[s as usize] = true;
            }
            queue.push_back((s, 0));
        }
        while let Some((v, depth)) = queue.pop_front() {
            if depth >= ring_depth {
                continue;
            }
            let start = render.adjacency_offsets[v as usize] as usize;
            let end = render.adjacency_offsets[v as usize + 1] as usize;
            for &n in &render.adjacency[start..end] {
                if !self.dirty[n as usize] {
                    self.dirty[n as usize] = true;
                    queue.push_back((n, depth + 1));
                }
            }
        }
    }

    /// Recompute directions for dirty oceanic vertices.
    ///
    /// Ladder per dirty vertex: nearest divergent edge tangent within range,
    /// then the ridge-parallel direction implied by the elevation gradient,
    /// then a neighbor's cached direction, then the plate motion direction.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        render: &IcosphereMesh,
        oceanic: &[bool],
        boundaries: &Boundaries,
        elevation_m: &[f64],
        velocities: &[Vec3],
    ) {
        let ridge_segments: Vec<(Vec3, Vec3)> = boundaries
            .map
            .values()
            .filter(|b| b.boundary_type == BoundaryType::Divergent)
            .map(|b| (b.midpoint, b.tangent))
            .collect();

        let mut stats = RidgeStats::default();
        for i in 0..render.vertices.len() {
            if !oceanic[i] {
                continue;
            }
            stats.evaluated += 1;
            if !self.dirty[i] {
                stats.cache_hits += 1;
                continue;
            }
            let p = render.vertices[i];

            let mut chosen = Vec3::ZERO;
            let mut best_d = RIDGE_SEED_RADIUS_RAD;
            for &(mid, tangent) in &ridge_segments {
                let d = orogen_geo::geodesic_distance(p, mid);
                if d < best_d {
                    best_d = d;
                    chosen = tangent;
                }
            }
            if chosen.length() > 0.0 {
                self.directions[i] = project_tangent(p, chosen);
                stats.edge_seeded += 1;
            } else if let Some(g) = elevation_gradient(render, elevation_m, i) {
                // The ridge runs along the isolines, perpendicular to the
                // gradient within the tangent plane.
                self.directions[i] = g.cross(p).normalized();
                stats.gradient_fallbacks += 1;
            } else if let Some(dir) = neighbor_direction(render, &self.directions, i) {
                self.directions[i] = dir;
                stats.neighbor_fallbacks += 1;
            } else {
                self.directions[i] = project_tangent(p, velocities[i]);
                stats.motion_fallbacks += 1;
            }
            self.dirty[i] = false;
        }
        self.stats = stats;
    }
}

/// Project `v` into the tangent plane at `p` and normalize; zero stays zero.
fn project_tangent(p: Vec3, v: Vec3) -> Vec3 {
    let t = v.sub(p.scale(v.dot(p)));
    if t.length() > 0.0 {
        t.normalized()
    } else {
        Vec3::ZERO
    }
}

/// Tangent-plane elevation gradient at vertex `i`, or `None` when flat.
fn elevation_gradient(render: &IcosphereMesh, elevation_m: &[f64], i: usize) -> Option<Vec3> {
    let p = render.vertices[i];
    let start = render.adjacency_offsets[i] as usize;
    let end = render.adjacency_offsets[i + 1] as usize;
    let mut g = Vec3::ZERO;
    for &j in &render.adjacency[start..end] {
        let dir = project_tangent(p, render.vertices[j as usize].sub(p));
        g = g.add(dir.scale(elevation_m[j as usize] - elevation_m[i]));
    }
    if g.length() > GRADIENT_EPS {
        Some(g.normalized())
    } else {
        None
    }
}

/// First neighbor (ascending index) with a cached nonzero direction.
fn neighbor_direction(render: &IcosphereMesh, directions: &[Vec3], i: usize) -> Option<Vec3> {
    let p = render.vertices[i];
    let start = render.adjacency_offsets[i] as usize;
    let end = render.adjacency_offsets[i + 1] as usize;
    render.adjacency[start..end]
        .iter()
        .map(|&j| directions[j as usize])
        .find(|d| d.length() > 0.0)
        .map(|d| project_tangent(p, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationParams;
    use crate::plates::{assign_voronoi, CrustType, PlateId, Plates};

    fn world() -> (IcosphereMesh, Vec<bool>, Boundaries, Vec<f64>, Vec<Vec3>) {
        let sim = IcosphereMesh::build(0);
        let render = IcosphereMesh::build(3);
        let params = SimulationParams::default();
        let mut plates = Plates::generate(&sim, &params);
        let assignments = assign_voronoi(&render, &plates, None);
        let mut boundaries = Boundaries::rebuild(&render, &assignments, None);
        plates.migrate_centroids(2.0);
        boundaries.update_kinematics(&plates, &params, 0.0, 2.0);
        let oceanic: Vec<bool> = assignments
            .iter()
            .map(|&a| plates.get(PlateId(a)).map(|p| p.crust_type) == Some(CrustType::Oceanic))
            .collect();
        let elevation: Vec<f64> =
            render.vertices.iter().map(|v| -3000.0 + 500.0 * v.z).collect();
        let mut velocities = vec![Vec3::ZERO; render.vertices.len()];
        crate::fields::compute_velocities(&render, &plates, &assignments, &mut velocities);
        (render, oceanic, boundaries, elevation, velocities)
    }

    #[test]
    fn second_update_is_all_cache_hits() {
        let (render, oceanic, boundaries, elevation, velocities) = world();
        let mut cache = RidgeCache::new(render.vertices.len());
        cache.update(&render, &oceanic, &boundaries, &elevation, &velocities);
        assert_eq!(cache.stats.hit_rate(), 0.0);
        assert_eq!(cache.dirty_count(), 0);
        cache.update(&render, &oceanic, &boundaries, &elevation, &velocities);
        assert!(cache.stats.hit_rate() >= 0.99);
        assert!(cache.stats.motion_rate() <= 0.001);
    }

    #[test]
    fn directions_are_unit_tangents() {
        let (render, oceanic, boundaries, elevation, velocities) = world();
        let mut cache = RidgeCache::new(render.vertices.len());
        cache.update(&render, &oceanic, &boundaries, &elevation, &velocities);
        for (i, d) in cache.directions.iter().enumerate() {
            if oceanic[i] && d.length() > 0.0 {
                assert!((d.length() - 1.0).abs() < 1e-9);
                assert!(d.dot(render.vertices[i]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn dirty_ring_propagates_bounded_depth() {
        let render = IcosphereMesh::build(3);
        let mut cache = RidgeCache::new(render.vertices.len());
        cache.dirty.fill(false);
        cache.mark_dirty_ring(&render, &[0], 2);
        let dirty = cache.dirty_count();
        // Vertex 0 plus at most two rings of neighbors.
        assert!(dirty > 1);
        assert!(dirty <= 1 + 6 + 12 + 18);
    }
}
