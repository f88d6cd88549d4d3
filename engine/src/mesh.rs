//! Icosphere meshes and adjacency.
//!
//! Both the simulation mesh (plate footprints) and the render mesh (per-vertex
//! fields) are icospheres built by recursive midpoint subdivision with a
//! shared edge-midpoint cache, which guarantees manifold closure. Geometry is
//! f64 on the unit sphere.

use orogen_geo::{icosahedron_faces, icosahedron_vertices, spherical_triangle_area, Vec3};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::errors::TopologyError;

/// Sentinel for "no index" (downhill links, unassigned vertices).
pub const INDEX_NONE: u32 = u32::MAX;

/// A subdivided icosphere with shared vertices and precomputed adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct IcosphereMesh {
    /// Unit-sphere vertex positions.
    pub vertices: Vec<Vec3>,
    /// Triangle list, CCW from outside, indices into `vertices`.
    pub triangles: Vec<[u32; 3]>,
    /// Sorted 1-ring neighbor lists (pentagonal corners have 5, the rest 6).
    pub n1: Vec<SmallVec<[u32; 6]>>,
    /// CSR offsets into `adjacency`; `adjacency[offsets[i]..offsets[i+1]]` is
    /// the 1-ring of vertex `i`.
    pub adjacency_offsets: Vec<u32>,
    /// CSR neighbor storage.
    pub adjacency: Vec<u32>,
    /// For each CSR slot, the index of the reverse edge slot (j -> i).
    pub reverse_edge: Vec<u32>,
    /// Per-vertex dual area in steradians (each triangle split three ways).
    pub area_sr: Vec<f64>,
    /// Subdivision level this mesh was built at.
    pub level: u32,
}

impl IcosphereMesh {
    /// Build a level-`level` icosphere. Level N has 20·4^N triangles.
    ///
    /// Midpoints are cached by unordered parent-vertex pair so every edge is
    /// split exactly once; the result is validated before being returned and a
    /// violation is a bug, hence the panic-on-error here.
    pub fn build(level: u32) -> Self {
        let mut vertices = icosahedron_vertices();
        let mut triangles = icosahedron_faces();

        for _ in 0..level {
            let mut midpoint_cache: HashMap<(u32, u32), u32> = HashMap::new();
            let mut next: Vec<[u32; 3]> = Vec::with_capacity(triangles.len() * 4);
            let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vec3>| -> u32 {
                let key = if a < b { (a, b) } else { (b, a) };
                if let Some(&id) = midpoint_cache.get(&key) {
                    return id;
                }
                let p =
                    vertices[a as usize].add(vertices[b as usize]).scale(0.5).normalized();
                let id = vertices.len() as u32;
                vertices.push(p);
                midpoint_cache.insert(key, id);
                id
            };
            for tri in &triangles {
                let [a, b, c] = *tri;
                let ab = midpoint(a, b, &mut vertices);
                let bc = midpoint(b, c, &mut vertices);
                let ca = midpoint(c, a, &mut vertices);
                next.push([a, ab, ca]);
                next.push([b, bc, ab]);
                next.push([c, ca, bc]);
                next.push([ab, bc, ca]);
            }
            triangles = next;
        }

        let mesh = Self::from_geometry(vertices, triangles, level);
        if let Err(e) = mesh.validate() {
            // A fresh subdivision can only fail validation through a bug in
            // the builder itself, never through caller input.
            panic!("icosphere build produced invalid topology: {e}");
        }
        mesh
    }

    /// Assemble adjacency and areas from raw geometry.
    fn from_geometry(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>, level: u32) -> Self {
        let n = vertices.len();

        let mut n1_sets: Vec<SmallVec<[u32; 6]>> = vec![SmallVec::new(); n];
        let mut push_unique = |sets: &mut Vec<SmallVec<[u32; 6]>>, a: u32, b: u32| {
            let list = &mut sets[a as usize];
            if !list.contains(&b) {
                list.push(b);
            }
        };
        for t in &triangles {
            for k in 0..3 {
                let a = t[k];
                let b = t[(k + 1) % 3];
                push_unique(&mut n1_sets, a, b);
                push_unique(&mut n1_sets, b, a);
            }
        }
        for list in &mut n1_sets {
            list.sort_unstable();
        }

        // CSR + reverse-edge table
        let mut adjacency_offsets: Vec<u32> = Vec::with_capacity(n + 1);
        let mut adjacency: Vec<u32> = Vec::new();
        adjacency_offsets.push(0);
        for list in &n1_sets {
            adjacency.extend(list.iter().copied());
            adjacency_offsets.push(adjacency.len() as u32);
        }
        let mut reverse_edge = vec![0u32; adjacency.len()];
        for i in 0..n {
            let start = adjacency_offsets[i] as usize;
            let end = adjacency_offsets[i + 1] as usize;
            for slot in start..end {
                let j = adjacency[slot] as usize;
                let jstart = adjacency_offsets[j] as usize;
                let jend = adjacency_offsets[j + 1] as usize;
                // 1-rings are sorted, binary search for i
                let local = adjacency[jstart..jend]
                    .binary_search(&(i as u32))
                    .unwrap_or(0);
                reverse_edge[slot] = (jstart + local) as u32;
            }
        }

        let mut area_sr = vec![0.0f64; n];
        for t in &triangles {
            let a = vertices[t[0] as usize];
            let b = vertices[t[1] as usize];
            let c = vertices[t[2] as usize];
            let share = spherical_triangle_area(a, b, c) / 3.0;
            area_sr[t[0] as usize] += share;
            area_sr[t[1] as usize] += share;
            area_sr[t[2] as usize] += share;
        }

        Self {
            vertices,
            triangles,
            n1: n1_sets,
            adjacency_offsets,
            adjacency,
            reverse_edge,
            area_sr,
            level,
        }
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.len() / 2
    }

    /// V − E + F.
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices.len() as i64 - self.edge_count() as i64 + self.triangles.len() as i64
    }

    /// Check closed-manifold invariants: Euler characteristic 2, every edge on
    /// exactly two triangles, no orphan vertices, all vertices unit length,
    /// total area within 1% of 4π.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (i, v) in self.vertices.iter().enumerate() {
            let len = v.length();
            if (len - 1.0).abs() > 1e-6 {
                return Err(TopologyError::NotUnitLength(i as u32, len));
            }
        }

        let mut edge_tris: HashMap<(u32, u32), u32> = HashMap::new();
        let mut touched = vec![false; self.vertices.len()];
        for t in &self.triangles {
            for k in 0..3 {
                let a = t[k];
                let b = t[(k + 1) % 3];
                touched[a as usize] = true;
                let key = if a < b { (a, b) } else { (b, a) };
                *edge_tris.entry(key).or_insert(0) += 1;
            }
        }
        for (&(a, b), &count) in &edge_tris {
            if count != 2 {
                return Err(TopologyError::NonManifoldEdge(a, b, count));
            }
        }
        if let Some(orphan) = touched.iter().position(|&t| !t) {
            return Err(TopologyError::OrphanVertex(orphan as u32));
        }

        let chi =
            self.vertices.len() as i64 - edge_tris.len() as i64 + self.triangles.len() as i64;
        if chi != 2 {
            return Err(TopologyError::EulerCharacteristic(chi));
        }

        let total: f64 = self.area_sr.iter().sum();
        let rel = (total - 4.0 * PI).abs() / (4.0 * PI);
        if rel > 0.01 {
            return Err(TopologyError::AreaMismatch { total, tolerance: 0.01 });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_counts_follow_subdivision() {
        for level in 0..4 {
            let mesh = IcosphereMesh::build(level);
            assert_eq!(mesh.triangles.len(), 20 * 4usize.pow(level));
            assert!(mesh.validate().is_ok());
        }
    }

    #[test]
    fn reverse_edge_round_trips() {
        let mesh = IcosphereMesh::build(2);
        for i in 0..mesh.vertices.len() {
            let start = mesh.adjacency_offsets[i] as usize;
            let end = mesh.adjacency_offsets[i + 1] as usize;
            for slot in start..end {
                let rev = mesh.reverse_edge[slot] as usize;
                assert_eq!(mesh.adjacency[rev], i as u32);
                assert_eq!(mesh.reverse_edge[rev] as usize, slot);
            }
        }
    }

    #[test]
    fn area_partitions_sphere() {
        let mesh = IcosphereMesh::build(3);
        let total: f64 = mesh.area_sr.iter().sum();
        assert!((total - 4.0 * PI).abs() / (4.0 * PI) < 1e-6);
    }
}
