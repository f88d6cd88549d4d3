//! Terranes: continental fragments carved off a plate, carried by another,
//! and sutured back on collision.
//!
//! A terrane owns its render vertices and a captured field payload. While
//! extracted the vertices are reassigned to an oceanic carrier plate, so the
//! fragment rides ordinary plate motion with no special-case kinematics.

use orogen_geo::{geodesic_distance, rotate_about_axis, spherical_mean, Vec3};
use std::collections::{HashSet, VecDeque};

use crate::errors::TerraneError;
use crate::mesh::IcosphereMesh;
use crate::plates::{CrustType, PlateId, Plates};

/// Smallest region a terrane may be carved from (km²).
pub const MIN_TERRANE_AREA_KM2: f64 = 100.0;
/// Carrier-to-continent distance at which a drifting terrane collides (km).
pub const COLLISION_DISTANCE_KM: f64 = 500.0;

/// Lifecycle of one terrane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerraneState {
    /// Extracted and riding its carrier plate.
    Drifting,
    /// Within collision range of a continental target, awaiting suture.
    Colliding,
    /// Sutured onto a target plate; kept for bookkeeping and export.
    Reattached,
}

/// Field values captured at extraction and restored at reattachment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerranePayload {
    /// Elevation per owned vertex (m), aligned with `Terrane::vertices`.
    pub elevation_m: Vec<f64>,
    /// Crust age per owned vertex (My).
    pub crust_age_my: Vec<f64>,
    /// Accumulated surface-process offset per owned vertex (m).
    pub surface_offset_m: Vec<f64>,
    /// In-transit sediment per owned vertex (m).
    pub sediment_m: Vec<f64>,
}

/// One continental fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Terrane {
    /// Stable terrane id, unique within a session.
    pub id: u32,
    /// Owned render-mesh vertex indices, sorted.
    pub vertices: Vec<u32>,
    /// Plate the fragment was carved from.
    pub source_plate: PlateId,
    /// Plate currently transporting the fragment.
    pub carrier_plate: PlateId,
    /// Plate the fragment sutured onto, once reattached.
    pub target_plate: Option<PlateId>,
    /// Lifecycle state.
    pub state: TerraneState,
    /// Fragment centroid on the unit sphere, advanced with the carrier.
    pub centroid: Vec3,
    /// Surface area at extraction (km²).
    pub area_km2: f64,
    /// Simulation time of extraction (My).
    pub extraction_time_my: f64,
    /// Simulation time of reattachment (My), when reattached.
    pub reattachment_time_my: Option<f64>,
    /// Captured fields.
    pub payload: TerranePayload,
}

/// All terranes of the session plus the id counter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Terranes {
    /// Every terrane ever extracted, drifting and reattached alike.
    pub terranes: Vec<Terrane>,
    next_id: u32,
}

/// Per-vertex field slices a terrane captures and restores.
pub struct TerraneFields<'a> {
    /// Elevation (m).
    pub elevation_m: &'a mut [f64],
    /// Crust age (My).
    pub crust_age_my: &'a mut [f64],
    /// Surface-process offset (m).
    pub surface_offset_m: &'a mut [f64],
    /// In-transit sediment (m).
    pub sediment_m: &'a mut [f64],
}

impl Terranes {
    /// Borrow a terrane by id.
    pub fn get(&self, id: u32) -> Result<&Terrane, TerraneError> {
        self.terranes.iter().find(|t| t.id == id).ok_or(TerraneError::UnknownTerrane(id))
    }

    fn get_mut(&mut self, id: u32) -> Result<&mut Terrane, TerraneError> {
        self.terranes.iter_mut().find(|t| t.id == id).ok_or(TerraneError::UnknownTerrane(id))
    }

    /// Carve `region` off its continental source plate.
    ///
    /// The region must be non-empty, wholly on one continental plate,
    /// edge-connected, at least [`MIN_TERRANE_AREA_KM2`], and bounded by a
    /// closed loop. On success the region's vertices are reassigned to the
    /// nearest oceanic carrier plate and the field payload is captured.
    #[allow(clippy::too_many_arguments)]
    pub fn extract(
        &mut self,
        render: &IcosphereMesh,
        assignments: &mut [u32],
        plates: &Plates,
        fields: TerraneFields<'_>,
        region: &[u32],
        planet_radius_m: f64,
        t_my: f64,
    ) -> Result<u32, TerraneError> {
        if region.is_empty() {
            return Err(TerraneError::NotContiguous { components: 0 });
        }
        let mut vertices: Vec<u32> = region.to_vec();
        vertices.sort_unstable();
        vertices.dedup();

        let source_raw = assignments[vertices[0] as usize];
        let source_plate = PlateId(source_raw);
        let source =
            plates.get(source_plate).ok_or(TerraneError::UnknownPlate(source_raw))?;
        if source.crust_type != CrustType::Continental {
            return Err(TerraneError::NotContinental(vertices[0]));
        }
        if let Some(&v) = vertices.iter().find(|&&v| assignments[v as usize] != source_raw) {
            return Err(TerraneError::NotContinental(v));
        }

        let in_region: HashSet<u32> = vertices.iter().copied().collect();
        let components = count_components(render, &in_region);
        if components != 1 {
            return Err(TerraneError::NotContiguous { components });
        }

        // Every rim vertex needs two rim neighbors for the rim to close.
        for &v in &vertices {
            let start = render.adjacency_offsets[v as usize] as usize;
            let end = render.adjacency_offsets[v as usize + 1] as usize;
            let ring = &render.adjacency[start..end];
            if !ring.iter().any(|n| !in_region.contains(n)) {
                continue;
            }
            let rim_neighbors = ring
                .iter()
                .filter(|&&n| {
                    in_region.contains(&n) && {
                        let ns = render.adjacency_offsets[n as usize] as usize;
                        let ne = render.adjacency_offsets[n as usize + 1] as usize;
                        render.adjacency[ns..ne].iter().any(|m| !in_region.contains(m))
                    }
                })
                .count();
            if rim_neighbors < 2 {
                return Err(TerraneError::OpenBoundary { vertex: v, neighbors: rim_neighbors });
            }
        }

        let r_km = planet_radius_m / 1000.0;
        let area_km2: f64 =
            vertices.iter().map(|&v| render.area_sr[v as usize] * r_km * r_km).sum();
        if area_km2 < MIN_TERRANE_AREA_KM2 {
            return Err(TerraneError::AreaBelowMinimum { area_km2, min_km2: MIN_TERRANE_AREA_KM2 });
        }

        let centroid = spherical_mean(vertices.iter().map(|&v| render.vertices[v as usize]))
            .ok_or(TerraneError::NotContiguous { components: 0 })?;

        // Nearest oceanic plate other than the source carries the fragment.
        let carrier_plate = plates
            .plates
            .iter()
            .filter(|p| p.crust_type == CrustType::Oceanic && p.id != source_plate)
            .min_by(|a, b| {
                geodesic_distance(centroid, a.centroid)
                    .partial_cmp(&geodesic_distance(centroid, b.centroid))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            })
            .map(|p| p.id)
            .ok_or(TerraneError::NoCarrier)?;

        let payload = TerranePayload {
            elevation_m: vertices.iter().map(|&v| fields.elevation_m[v as usize]).collect(),
            crust_age_my: vertices.iter().map(|&v| fields.crust_age_my[v as usize]).collect(),
            surface_offset_m: vertices
                .iter()
                .map(|&v| fields.surface_offset_m[v as usize])
                .collect(),
            sediment_m: vertices.iter().map(|&v| fields.sediment_m[v as usize]).collect(),
        };
        for &v in &vertices {
            assignments[v as usize] = carrier_plate.0;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.terranes.push(Terrane {
            id,
            vertices,
            source_plate,
            carrier_plate,
            target_plate: None,
            state: TerraneState::Drifting,
            centroid,
            area_km2,
            extraction_time_my: t_my,
            reattachment_time_my: None,
            payload,
        });
        println!("[terrane] extracted terrane {id} from plate {source_raw} at t={t_my} My");
        Ok(id)
    }

    /// Advance every drifting terrane's centroid with its carrier's rotation.
    pub fn advance(&mut self, plates: &Plates, dt_my: f64) {
        for t in &mut self.terranes {
            if t.state == TerraneState::Reattached {
                continue;
            }
            if let Some(carrier) = plates.get(t.carrier_plate) {
                t.centroid = rotate_about_axis(
                    t.centroid,
                    carrier.euler_pole_axis,
                    carrier.angular_velocity_rad_my * dt_my,
                );
            }
        }
    }

    /// Drifting terranes within [`COLLISION_DISTANCE_KM`] of a continental
    /// plate's centroid-side territory, paired with that plate. Ascending id.
    pub fn detect_collisions(
        &self,
        render: &IcosphereMesh,
        assignments: &[u32],
        plates: &Plates,
        planet_radius_m: f64,
    ) -> Vec<(u32, PlateId)> {
        let r_km = planet_radius_m / 1000.0;
        let mut hits = Vec::new();
        for t in &self.terranes {
            if t.state != TerraneState::Drifting {
                continue;
            }
            let mut best: Option<(f64, PlateId)> = None;
            for (i, &a) in assignments.iter().enumerate() {
                let plate = PlateId(a);
                if plate == t.carrier_plate {
                    continue;
                }
                let Some(p) = plates.get(plate) else { continue };
                if p.crust_type != CrustType::Continental {
                    continue;
                }
                let d_km = geodesic_distance(t.centroid, render.vertices[i]) * r_km;
                if d_km <= COLLISION_DISTANCE_KM
                    && best.map_or(true, |(bd, bid)| d_km < bd || (d_km == bd && plate < bid))
                {
                    best = Some((d_km, plate));
                }
            }
            if let Some((_, plate)) = best {
                hits.push((t.id, plate));
            }
        }
        hits
    }

    /// Detect new collisions among drifting terranes and flag them. The
    /// suture happens on a later step, so the colliding state is observable
    /// in committed snapshots. Returns the newly flagged pairs.
    pub fn update_collisions(
        &mut self,
        render: &IcosphereMesh,
        assignments: &[u32],
        plates: &Plates,
        planet_radius_m: f64,
    ) -> Vec<(u32, PlateId)> {
        let hits = self.detect_collisions(render, assignments, plates, planet_radius_m);
        for &(id, target) in &hits {
            if let Some(t) = self.terranes.iter_mut().find(|t| t.id == id) {
                t.state = TerraneState::Colliding;
                t.target_plate = Some(target);
            }
        }
        hits
    }

    /// Colliding terranes awaiting suture, paired with their targets.
    pub fn colliding_pairs(&self) -> Vec<(u32, PlateId)> {
        self.terranes
            .iter()
            .filter(|t| t.state == TerraneState::Colliding)
            .filter_map(|t| t.target_plate.map(|p| (t.id, p)))
            .collect()
    }

    /// Return a colliding terrane to drift, e.g. after its target vanished
    /// in a merge before the suture could complete.
    pub fn abort_collision(&mut self, id: u32) {
        if let Some(t) = self.terranes.iter_mut().find(|t| t.id == id) {
            if t.state == TerraneState::Colliding {
                t.state = TerraneState::Drifting;
                t.target_plate = None;
            }
        }
    }

    /// Suture terrane `id` onto `target`, restoring the captured payload onto
    /// its vertices and handing ownership to the target plate.
    pub fn reattach(
        &mut self,
        assignments: &mut [u32],
        plates: &Plates,
        fields: TerraneFields<'_>,
        id: u32,
        target: PlateId,
        t_my: f64,
    ) -> Result<(), TerraneError> {
        let target_plate = plates.get(target).ok_or(TerraneError::UnknownPlate(target.0))?;
        if target_plate.crust_type != CrustType::Continental {
            return Err(TerraneError::TargetNotContinental(target.0));
        }
        let t = self.get_mut(id)?;
        for (k, &v) in t.vertices.iter().enumerate() {
            assignments[v as usize] = target.0;
            fields.elevation_m[v as usize] = t.payload.elevation_m[k];
            fields.crust_age_my[v as usize] = t.payload.crust_age_my[k];
            fields.surface_offset_m[v as usize] = t.payload.surface_offset_m[k];
            fields.sediment_m[v as usize] = t.payload.sediment_m[k];
        }
        t.state = TerraneState::Reattached;
        t.target_plate = Some(target);
        t.reattachment_time_my = Some(t_my);
        println!("[terrane] reattached terrane {id} onto plate {} at t={t_my} My", target.0);
        Ok(())
    }
}

/// Edge-connected component count of `region` under the mesh adjacency.
fn count_components(render: &IcosphereMesh, region: &HashSet<u32>) -> usize {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut components = 0;
    for &start in region {
        if seen.contains(&start) {
            continue;
        }
        components += 1;
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(v) = queue.pop_front() {
            let s = render.adjacency_offsets[v as usize] as usize;
            let e = render.adjacency_offsets[v as usize + 1] as usize;
            for &n in &render.adjacency[s..e] {
                if region.contains(&n) && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }
    components
}
