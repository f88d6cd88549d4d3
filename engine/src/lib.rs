//! Orogen engine crate.
//! Deterministic plate tectonics on an icosphere, CPU only.
#![deny(missing_docs)]
#![deny(clippy::dbg_macro, clippy::large_enum_variant)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

pub mod boundaries;
pub mod config;
pub mod errors;
pub mod export;
pub mod fields;
pub mod history;
pub mod hotspots;
pub mod hydraulic;
pub mod mesh;
pub mod metrics;
pub mod plates;
pub mod retess;
pub mod session;
pub mod stageb;
pub mod surface;
pub mod terranes;
pub mod topology;
pub mod world;

pub use config::{SimulationParams, StageBOverrides, Toggles, STEP_DT_MY};
pub use errors::{ExemplarIoError, ExportError, ParameterError, TerraneError, TopologyError};
pub use session::Session;
pub use world::{Snapshot, StepStats, World};

/// Returns the engine version string from Cargo metadata.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
