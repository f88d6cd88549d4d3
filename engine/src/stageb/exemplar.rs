//! Exemplar library for continental amplification.
//!
//! A JSON manifest (a bare array of entries) lists PNG16 heightfields with a
//! region tag and elevation statistics. The library is loaded once per
//! session; an unreadable manifest disables continental amplification, an
//! unreadable heightfield only drops that entry.

use image::DynamicImage;
use serde::Deserialize;
use std::path::Path;

use crate::errors::ExemplarIoError;
use crate::fields::OrogenyClass;

#[derive(Debug, Deserialize)]
struct ManifestResolution {
    width_px: u32,
    height_px: u32,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    name: String,
    region: String,
    feature: String,
    png16_path: String,
    elevation_min_m: f64,
    elevation_max_m: f64,
    elevation_mean_m: f64,
    elevation_stddev_m: f64,
    resolution: ManifestResolution,
}

/// One decoded heightfield exemplar.
#[derive(Debug, Clone)]
pub struct Exemplar {
    /// Manifest id.
    pub id: String,
    /// Human-readable name from the manifest.
    pub name: String,
    /// Region tag matched against the orogeny classification.
    pub region: String,
    /// Landform tag from the manifest (e.g. "fold_ridge").
    pub feature: String,
    /// Minimum source elevation (m), from the manifest.
    pub elevation_min_m: f64,
    /// Maximum source elevation (m), from the manifest.
    pub elevation_max_m: f64,
    /// Mean source elevation (m), from the manifest.
    pub elevation_mean_m: f64,
    /// Source elevation standard deviation (m), from the manifest.
    pub elevation_stddev_m: f64,
    width: u32,
    height: u32,
    samples: Vec<f64>,
}

impl Exemplar {
    /// Bilinear sample at wrapped UV coordinates, normalized to 0..=1.
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);
        let x = u * (self.width - 1) as f64;
        let y = v * (self.height - 1) as f64;
        let (x0, y0) = (x.floor() as u32, y.floor() as u32);
        let (fx, fy) = (x - x0 as f64, y - y0 as f64);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let at = |x: u32, y: u32| self.samples[(y * self.width + x) as usize];
        let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
        let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Sampled value mapped into the exemplar's source elevation range (m).
    pub fn sample_elevation_m(&self, u: f64, v: f64) -> f64 {
        self.elevation_min_m + self.sample(u, v) * (self.elevation_max_m - self.elevation_min_m)
    }
}

fn decode_entry(dir: &Path, entry: ManifestEntry) -> Result<Exemplar, ExemplarIoError> {
    let image = dir.join(&entry.png16_path);
    let image = image::open(image)
        .map_err(|e| ExemplarIoError::Decode { id: entry.id.clone(), reason: e.to_string() })?;
    let gray = match image {
        DynamicImage::ImageLuma16(g) => g,
        other => {
            return Err(ExemplarIoError::Decode {
                id: entry.id,
                reason: format!("expected 16-bit grayscale, got {other:?}"),
            })
        }
    };
    let (width, height) = (gray.width(), gray.height());
    if width == 0 || height == 0 {
        return Err(ExemplarIoError::Decode {
            id: entry.id,
            reason: String::from("empty heightfield"),
        });
    }
    if width != entry.resolution.width_px || height != entry.resolution.height_px {
        return Err(ExemplarIoError::Decode {
            id: entry.id,
            reason: format!(
                "decoded {width}x{height}, manifest says {}x{}",
                entry.resolution.width_px, entry.resolution.height_px
            ),
        });
    }
    let samples = gray.pixels().map(|p| f64::from(p.0[0]) / 65535.0).collect();
    Ok(Exemplar {
        id: entry.id,
        name: entry.name,
        region: entry.region,
        feature: entry.feature,
        elevation_min_m: entry.elevation_min_m,
        elevation_max_m: entry.elevation_max_m,
        elevation_mean_m: entry.elevation_mean_m,
        elevation_stddev_m: entry.elevation_stddev_m,
        width,
        height,
        samples,
    })
}

/// Region tag an orogeny class draws exemplars from.
pub fn region_tag(class: OrogenyClass) -> &'static str {
    match class {
        OrogenyClass::Plain => "plain",
        OrogenyClass::OldMountains => "old_mountains",
        OrogenyClass::AndeanMountains => "andean",
        OrogenyClass::HimalayanMountains => "himalayan",
    }
}

/// All exemplars of a session, loaded once.
#[derive(Debug, Clone, Default)]
pub struct ExemplarLibrary {
    exemplars: Vec<Exemplar>,
}

impl ExemplarLibrary {
    /// Load the manifest and decode every referenced PNG16 heightfield.
    /// Paths in the manifest are relative to the manifest file. Entries whose
    /// heightfield cannot be decoded are logged and skipped; only a missing
    /// or malformed manifest fails the load.
    pub fn load(manifest_path: &Path) -> Result<Self, ExemplarIoError> {
        let text = std::fs::read_to_string(manifest_path)?;
        let entries: Vec<ManifestEntry> = serde_json::from_str(&text)?;
        let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));

        let mut exemplars = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = entry.id.clone();
            match decode_entry(dir, entry) {
                Ok(exemplar) => exemplars.push(exemplar),
                Err(e) => println!("[stageb] skipping exemplar {id}: {e}"),
            }
        }
        Ok(Self { exemplars })
    }

    /// Library with no exemplars; every lookup misses.
    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    /// Exemplars tagged for `class`, in manifest order.
    pub fn for_class(&self, class: OrogenyClass) -> Vec<&Exemplar> {
        let tag = region_tag(class);
        self.exemplars.iter().filter(|e| e.region == tag).collect()
    }

    /// Lookup by manifest id.
    pub fn by_id(&self, id: &str) -> Option<&Exemplar> {
        self.exemplars.iter().find(|e| e.id == id)
    }

    #[cfg(test)]
    pub(crate) fn from_exemplars(exemplars: Vec<Exemplar>) -> Self {
        Self { exemplars }
    }

    #[cfg(test)]
    pub(crate) fn synthetic(region: &str, min_m: f64, max_m: f64) -> Self {
        // A smooth 8x8 ramp is enough for blending and rescale tests.
        let (width, height) = (8u32, 8u32);
        let samples = (0..width * height)
            .map(|i| f64::from(i % width) / f64::from(width - 1))
            .collect();
        Self::from_exemplars(vec![Exemplar {
            id: format!("synthetic-{region}"),
            name: format!("Synthetic {region}"),
            region: region.to_string(),
            feature: String::from("ramp"),
            elevation_min_m: min_m,
            elevation_max_m: max_m,
            elevation_mean_m: 0.5 * (min_m + max_m),
            elevation_stddev_m: 0.25 * (max_m - min_m),
            width,
            height,
            samples,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_interpolates_and_wraps() {
        let lib = ExemplarLibrary::synthetic("plain", 0.0, 1000.0);
        let e = lib.for_class(OrogenyClass::Plain)[0];
        assert!(e.sample(0.0, 0.0).abs() < 1e-12);
        assert!((e.sample(1.0, 0.5) - e.sample(0.0, 0.5)).abs() < 1e-12);
        let mid = e.sample(0.5, 0.5);
        assert!(mid > 0.0 && mid < 1.0);
        assert!((e.sample_elevation_m(0.5, 0.5) - 1000.0 * mid).abs() < 1e-9);
    }

    #[test]
    fn missing_manifest_is_io_error() {
        let err = ExemplarLibrary::load(Path::new("/nonexistent/manifest.json")).unwrap_err();
        assert!(matches!(err, ExemplarIoError::Io(_)));
    }

    #[test]
    fn malformed_manifest_is_manifest_error() {
        let dir = std::env::temp_dir().join("orogen-exemplar-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ExemplarLibrary::load(&path).unwrap_err();
        assert!(matches!(err, ExemplarIoError::Manifest(_)));
    }

    #[test]
    fn class_lookup_filters_by_region() {
        let lib = ExemplarLibrary::synthetic("andean", -100.0, 4000.0);
        assert_eq!(lib.for_class(OrogenyClass::AndeanMountains).len(), 1);
        assert!(lib.for_class(OrogenyClass::Plain).is_empty());
    }

    fn write_png16(path: &Path, size: u32) {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_fn(size, size, |x, _| {
            image::Luma([(x * 16384) as u16])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn manifest_array_loads_and_bad_entries_are_skipped() {
        let dir = std::env::temp_dir().join("orogen-exemplar-manifest");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        write_png16(&dir.join("good.png"), 4);
        let manifest = r#"[
            {"id": "good", "name": "Good Ridge", "region": "andean",
             "feature": "fold_ridge", "png16_path": "good.png",
             "elevation_min_m": -50.0, "elevation_max_m": 3500.0,
             "elevation_mean_m": 1200.0, "elevation_stddev_m": 640.0,
             "resolution": {"width_px": 4, "height_px": 4}},
            {"id": "missing", "name": "Missing", "region": "plain",
             "feature": "plateau", "png16_path": "absent.png",
             "elevation_min_m": 0.0, "elevation_max_m": 100.0,
             "elevation_mean_m": 40.0, "elevation_stddev_m": 10.0,
             "resolution": {"width_px": 4, "height_px": 4}}
        ]"#;
        let path = dir.join("manifest.json");
        std::fs::write(&path, manifest).unwrap();

        let lib = ExemplarLibrary::load(&path).unwrap();
        let good = lib.by_id("good").expect("decodable entry survives");
        assert_eq!(good.name, "Good Ridge");
        assert_eq!(good.feature, "fold_ridge");
        assert_eq!(good.elevation_mean_m, 1200.0);
        assert!(lib.by_id("missing").is_none());
        assert_eq!(lib.for_class(OrogenyClass::AndeanMountains).len(), 1);
    }

    #[test]
    fn resolution_mismatch_drops_the_entry() {
        let dir = std::env::temp_dir().join("orogen-exemplar-resolution");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        write_png16(&dir.join("small.png"), 4);
        let manifest = r#"[
            {"id": "small", "name": "Small", "region": "plain",
             "feature": "plateau", "png16_path": "small.png",
             "elevation_min_m": 0.0, "elevation_max_m": 100.0,
             "elevation_mean_m": 40.0, "elevation_stddev_m": 10.0,
             "resolution": {"width_px": 8, "height_px": 8}}
        ]"#;
        let path = dir.join("manifest.json");
        std::fs::write(&path, manifest).unwrap();
        let lib = ExemplarLibrary::load(&path).unwrap();
        assert!(lib.is_empty());
    }
}
