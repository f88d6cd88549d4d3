//! Mantle hotspots: seeded census and slow drift in the mantle frame.
//!
//! Hotspots contribute to the thermal field and to elevation swell only; they
//! never add mechanical stress (the paper decouples the two).

use orogen_geo::{rotate_about_axis, Vec3};
use rand::{Rng, SeedableRng};

use crate::config::SimulationParams;

/// Hotspot magnitude class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HotspotType {
    /// Large plume (wide influence, strong output).
    Major,
    /// Small plume.
    Minor,
}

/// One mantle plume.
#[derive(Clone, Debug, PartialEq)]
pub struct Hotspot {
    /// Position on the unit sphere, in the mantle frame.
    pub position: Vec3,
    /// Axis the position drifts around.
    pub drift_axis: Vec3,
    /// Drift rate (rad/My).
    pub drift_rate_rad_my: f64,
    /// Dimensionless thermal output scaling the Gaussian bump.
    pub thermal_output: f64,
    /// Influence radius (radians of arc).
    pub influence_radius_rad: f64,
    /// Magnitude class.
    pub kind: HotspotType,
}

const SEED_HOTSPOTS: u64 = 0x686f_7473_706f_74; // "hotspot"

/// Influence radius for major hotspots (radians).
pub const MAJOR_INFLUENCE_RAD: f64 = 0.30;
/// Influence radius for minor hotspots (radians).
pub const MINOR_INFLUENCE_RAD: f64 = 0.15;

/// Seeded hotspot census: majors first, then minors, both with uniform
/// sphere positions and uniform drift axes.
pub fn generate_hotspots(params: &SimulationParams) -> Vec<Hotspot> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(params.seed ^ SEED_HOTSPOTS);
    let mut sample_unit = |rng: &mut rand::rngs::StdRng| -> Vec3 {
        let z: f64 = rng.gen_range(-1.0..1.0);
        let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
        let r = (1.0 - z * z).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    };

    let total = params.major_hotspot_count + params.minor_hotspot_count;
    let mut out = Vec::with_capacity(total as usize);
    for i in 0..total {
        let kind = if i < params.major_hotspot_count {
            HotspotType::Major
        } else {
            HotspotType::Minor
        };
        let position = sample_unit(&mut rng);
        let drift_axis = sample_unit(&mut rng);
        let (thermal_output, influence_radius_rad) = match kind {
            HotspotType::Major => (params.major_hotspot_thermal_output, MAJOR_INFLUENCE_RAD),
            HotspotType::Minor => (params.minor_hotspot_thermal_output, MINOR_INFLUENCE_RAD),
        };
        out.push(Hotspot {
            position,
            drift_axis,
            drift_rate_rad_my: params.hotspot_drift_speed,
            thermal_output,
            influence_radius_rad,
            kind,
        });
    }
    out
}

/// Advance every hotspot by its drift rotation.
pub fn drift_hotspots(hotspots: &mut [Hotspot], dt_my: f64) {
    for h in hotspots {
        h.position = rotate_about_axis(h.position, h.drift_axis, h.drift_rate_rad_my * dt_my);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn census_counts_match_params() {
        let params = SimulationParams::default();
        let spots = generate_hotspots(&params);
        let majors = spots.iter().filter(|h| h.kind == HotspotType::Major).count();
        assert_eq!(majors as u32, params.major_hotspot_count);
        assert_eq!(spots.len() as u32, params.major_hotspot_count + params.minor_hotspot_count);
    }

    #[test]
    fn drift_preserves_unit_positions() {
        let params = SimulationParams::default();
        let mut spots = generate_hotspots(&params);
        for _ in 0..100 {
            drift_hotspots(&mut spots, 2.0);
        }
        for h in &spots {
            assert!((h.position.length() - 1.0).abs() < 1e-9);
        }
    }
}
