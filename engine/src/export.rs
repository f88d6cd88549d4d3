//! CSV and PNG export.
//!
//! Every artifact is written twice: once under a timestamped name and once as
//! `*_latest` for tooling that follows the newest run. Failures surface as
//! [`ExportError`] and never abort the simulation.

use image::{Rgba, RgbaImage};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::SimulationParams;
use crate::errors::ExportError;
use crate::mesh::IcosphereMesh;
use crate::metrics::{VelocityStats, HYPSOMETRY_BINS};
use crate::terranes::{TerraneState, Terranes};

/// One metrics CSV row, accumulated per committed step.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsRow {
    /// Step index.
    pub step: u64,
    /// Simulation time (My).
    pub time_my: f64,
    /// Live plate count.
    pub plate_count: usize,
    /// Divergent/convergent boundary length ratio.
    pub ridge_trench_ratio: f64,
    /// Surface speed summary.
    pub velocity: VelocityStats,
    /// Hypsometric bins in percent.
    pub hypsometry: [f64; HYPSOMETRY_BINS],
    /// Wall-clock duration of the step (ms).
    pub step_ms: f64,
}

fn timestamp_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

fn write_both(dir: &Path, stem: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let stamped = dir.join(format!("{stem}_{}.{ext}", timestamp_secs()));
    fs::write(&stamped, bytes)?;
    fs::write(dir.join(format!("{stem}_latest.{ext}")), bytes)?;
    Ok(stamped)
}

/// Write the per-step metrics CSV. Returns the timestamped path.
pub fn export_metrics_csv(dir: &Path, rows: &[MetricsRow]) -> Result<PathBuf, ExportError> {
    let mut out = Vec::new();
    write!(
        out,
        "step,time_my,plate_count,ridge_trench_ratio,vel_min_cm_yr,vel_mean_cm_yr,vel_max_cm_yr"
    )?;
    for i in 0..HYPSOMETRY_BINS {
        write!(out, ",hypso_{i:02}")?;
    }
    writeln!(out, ",step_ms")?;
    for r in rows {
        write!(
            out,
            "{},{},{},{},{},{},{}",
            r.step,
            r.time_my,
            r.plate_count,
            r.ridge_trench_ratio,
            r.velocity.min_cm_yr,
            r.velocity.mean_cm_yr,
            r.velocity.max_cm_yr
        )?;
        for b in &r.hypsometry {
            write!(out, ",{b}")?;
        }
        writeln!(out, ",{}", r.step_ms)?;
    }
    write_both(dir, "metrics", "csv", &out)
}

/// Columns of the terranes CSV, fixed by downstream tooling.
pub const TERRANE_CSV_COLUMNS: usize = 12;

/// Write the terranes CSV (12 columns, order and state names fixed by
/// downstream tooling). Returns the timestamped path.
pub fn export_terranes_csv(dir: &Path, terranes: &Terranes) -> Result<PathBuf, ExportError> {
    let mut out = Vec::new();
    writeln!(
        out,
        "TerraneID,State,SourcePlateID,CarrierPlateID,TargetPlateID,\
         CentroidX,CentroidY,CentroidZ,AreaKm2,VertexCount,\
         ExtractionTimeMy,ReattachmentTimeMy"
    )?;
    for t in &terranes.terranes {
        // A sutured terrane is attached again; a drifting one is in transport.
        let state = match t.state {
            TerraneState::Drifting => "Transporting",
            TerraneState::Colliding => "Colliding",
            TerraneState::Reattached => "Attached",
        };
        let target =
            t.target_plate.map_or(String::from(""), |p| p.0.to_string());
        let reattached =
            t.reattachment_time_my.map_or(String::from(""), |m| m.to_string());
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            t.id,
            state,
            t.source_plate.0,
            t.carrier_plate.0,
            target,
            t.centroid.x,
            t.centroid.y,
            t.centroid.z,
            t.area_km2,
            t.vertices.len(),
            t.extraction_time_my,
            reattached
        )?;
    }
    write_both(dir, "terranes", "csv", &out)
}

/// Render an equirectangular RGBA heightmap and write it as PNG.
///
/// Vertices splat into their projected pixel; vertices landing on either seam
/// column are splatted on both so x = 0 and x = W-1 are always covered. Holes
/// are filled by repeated wrap-aware neighbor averaging.
pub fn export_heightmap_png(
    render: &IcosphereMesh,
    elevation_m: &[f64],
    params: &SimulationParams,
    dir: &Path,
    width: u32,
    height: u32,
) -> Result<PathBuf, ExportError> {
    let w = width.max(2) as usize;
    let h = height.max(2) as usize;
    let mut sum = vec![0.0f64; w * h];
    let mut count = vec![0u32; w * h];

    for (i, p) in render.vertices.iter().enumerate() {
        let u = p.y.atan2(p.x) / std::f64::consts::TAU + 0.5;
        let v = 0.5 - p.z.clamp(-1.0, 1.0).asin() / std::f64::consts::PI;
        let x = ((u * w as f64) as usize).min(w - 1);
        let y = ((v * h as f64) as usize).min(h - 1);
        let e = elevation_m[i] * params.elevation_scale;
        sum[y * w + x] += e;
        count[y * w + x] += 1;
        if x == 0 {
            sum[y * w + (w - 1)] += e;
            count[y * w + (w - 1)] += 1;
        } else if x == w - 1 {
            sum[y * w] += e;
            count[y * w] += 1;
        }
    }

    let mut pixels: Vec<Option<f64>> = sum
        .iter()
        .zip(&count)
        .map(|(&s, &c)| if c > 0 { Some(s / f64::from(c)) } else { None })
        .collect();

    // Wrap-aware hole fill; each pass closes at least one ring of holes.
    loop {
        let holes: Vec<usize> =
            (0..pixels.len()).filter(|&i| pixels[i].is_none()).collect();
        if holes.is_empty() {
            break;
        }
        let mut filled_any = false;
        let snapshot = pixels.clone();
        for idx in holes {
            let (x, y) = (idx % w, idx / w);
            let mut acc = 0.0;
            let mut n = 0u32;
            let neighbors = [
                ((x + w - 1) % w, y),
                ((x + 1) % w, y),
                (x, y.saturating_sub(1)),
                (x, (y + 1).min(h - 1)),
            ];
            for (nx, ny) in neighbors {
                if let Some(val) = snapshot[ny * w + nx] {
                    acc += val;
                    n += 1;
                }
            }
            if n > 0 {
                pixels[idx] = Some(acc / f64::from(n));
                filled_any = true;
            }
        }
        if !filled_any {
            // No seeded pixel anywhere; blank mesh input.
            break;
        }
    }

    let cap = params.max_elevation_m * params.elevation_scale;
    let mut img = RgbaImage::new(w as u32, h as u32);
    for (i, px) in pixels.iter().enumerate() {
        let e = px.unwrap_or(0.0);
        let (x, y) = ((i % w) as u32, (i / w) as u32);
        img.put_pixel(x, y, shade(e, params.sea_level_m * params.elevation_scale, cap));
    }

    fs::create_dir_all(dir)?;
    let stamped = dir.join(format!("heightmap_{}.png", timestamp_secs()));
    img.save(&stamped).map_err(|e| ExportError::Encode(e.to_string()))?;
    img.save(dir.join("heightmap_latest.png"))
        .map_err(|e| ExportError::Encode(e.to_string()))?;
    Ok(stamped)
}

/// Hypsometric tint: blue depths, green lowlands, brown-to-white peaks.
fn shade(elevation_m: f64, sea_level_m: f64, cap_m: f64) -> Rgba<u8> {
    let byte = |f: f64| (f.clamp(0.0, 1.0) * 255.0) as u8;
    if elevation_m <= sea_level_m {
        let depth = ((sea_level_m - elevation_m) / cap_m.max(1.0)).clamp(0.0, 1.0);
        Rgba([byte(0.1 * (1.0 - depth)), byte(0.3 * (1.0 - depth)), byte(0.9 - 0.5 * depth), 255])
    } else {
        let t = ((elevation_m - sea_level_m) / cap_m.max(1.0)).clamp(0.0, 1.0);
        Rgba([byte(0.2 + 0.7 * t), byte(0.5 + 0.3 * t), byte(0.2 + 0.6 * t * t), 255])
    }
}
