//! Derived scalar metrics: hypsometry, velocity distribution, boundary
//! length ratio.

use orogen_geo::Vec3;

use crate::boundaries::Boundaries;

/// Number of hypsometric bins.
pub const HYPSOMETRY_BINS: usize = 20;
/// Lower edge of the first hypsometric bin (m).
pub const HYPSOMETRY_MIN_M: f64 = -10_000.0;
/// Upper edge of the last hypsometric bin (m).
pub const HYPSOMETRY_MAX_M: f64 = 10_000.0;

/// Area-weighted elevation histogram in percent of planet surface.
///
/// Fixed bins spanning [-10 km, +10 km]; out-of-range samples clamp into the
/// edge bins, so the percentages always sum to 100 (up to rounding).
pub fn hypsometry_percent(elevation_m: &[f64], area_sr: &[f64]) -> [f64; HYPSOMETRY_BINS] {
    let mut bins = [0.0f64; HYPSOMETRY_BINS];
    let total: f64 = area_sr.iter().sum();
    if total <= 0.0 {
        return bins;
    }
    let width = (HYPSOMETRY_MAX_M - HYPSOMETRY_MIN_M) / HYPSOMETRY_BINS as f64;
    for (&e, &a) in elevation_m.iter().zip(area_sr) {
        let idx = (((e - HYPSOMETRY_MIN_M) / width) as isize)
            .clamp(0, HYPSOMETRY_BINS as isize - 1) as usize;
        bins[idx] += a;
    }
    for b in &mut bins {
        *b *= 100.0 / total;
    }
    bins
}

/// Summary of the surface speed field in cm/yr.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VelocityStats {
    /// Slowest vertex speed.
    pub min_cm_yr: f64,
    /// Area-weighted mean speed.
    pub mean_cm_yr: f64,
    /// Fastest vertex speed.
    pub max_cm_yr: f64,
}

/// Linear surface speeds from the angular velocity field.
/// rad/My on a sphere of radius R meters is R·1e-4 cm/yr per rad/My.
pub fn velocity_stats(velocities: &[Vec3], area_sr: &[f64], planet_radius_m: f64) -> VelocityStats {
    let scale = planet_radius_m * 1.0e-4;
    let mut min = f64::MAX;
    let mut max = 0.0f64;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (v, &a) in velocities.iter().zip(area_sr) {
        let speed = v.length() * scale;
        min = min.min(speed);
        max = max.max(speed);
        weighted += speed * a;
        total += a;
    }
    if total <= 0.0 {
        return VelocityStats::default();
    }
    VelocityStats { min_cm_yr: min, mean_cm_yr: weighted / total, max_cm_yr: max }
}

/// Divergent-to-convergent boundary length ratio. Zero trench length yields
/// infinity only when ridges exist; an empty map yields zero.
pub fn ridge_trench_ratio(boundaries: &Boundaries) -> f64 {
    let (ridge, trench) = boundaries.ridge_trench_lengths();
    if ridge == 0.0 {
        0.0
    } else if trench == 0.0 {
        f64::INFINITY
    } else {
        ridge / trench
    }
}
