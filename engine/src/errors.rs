//! Error types, one enum per failure domain.
//!
//! Domain errors never abort the simulation: topology failures roll back to
//! the pre-step snapshot, terrane and parameter errors reject the call without
//! mutating state, and export/exemplar failures degrade to no-ops.

/// Rejected parameter sets. The call that carried them must not mutate state.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParameterError {
    /// A numeric parameter fell outside its documented range.
    #[error("parameter `{name}` = {value} outside [{min}, {max}]")]
    OutOfRange {
        /// Parameter name as it appears on `SimulationParams`.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },
    /// Continental amplification requested but no exemplar manifest exists.
    #[error("exemplar library missing at `{0}`")]
    MissingExemplarLibrary(String),
}

/// Mesh/topology invariant violations detected by validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TopologyError {
    /// V - E + F differed from 2.
    #[error("Euler characteristic {0}, expected 2")]
    EulerCharacteristic(i64),
    /// An edge was shared by a number of triangles other than two.
    #[error("edge ({0}, {1}) borders {2} triangles")]
    NonManifoldEdge(u32, u32, u32),
    /// A vertex belongs to no triangle.
    #[error("orphan vertex {0}")]
    OrphanVertex(u32),
    /// A vertex strayed from the unit sphere.
    #[error("vertex {0} has length {1}")]
    NotUnitLength(u32, f64),
    /// Total mesh area diverged from 4π by more than the allowed fraction.
    #[error("sphere area {total} differs from 4π by more than {tolerance}")]
    AreaMismatch {
        /// Measured total area in steradians.
        total: f64,
        /// Allowed relative deviation.
        tolerance: f64,
    },
    /// A render vertex was left without a plate after a Voronoi rebuild.
    #[error("render vertex {0} has no plate assignment")]
    UnassignedVertex(u32),
    /// Plate bookkeeping disagreed with the executed topology event.
    #[error("plate count {actual} after topology event, expected {expected}")]
    PlateCountMismatch {
        /// Count implied by the event.
        expected: usize,
        /// Count observed.
        actual: usize,
    },
}

/// Rejected terrane operations; state is untouched when these are returned.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TerraneError {
    /// The vertex set splits into more than one connected component.
    #[error("vertex set is not contiguous ({components} components)")]
    NotContiguous {
        /// Number of BFS components found.
        components: usize,
    },
    /// Terrane area below the extraction minimum.
    #[error("area {area_km2:.1} km² below minimum {min_km2:.1} km²")]
    AreaBelowMinimum {
        /// Measured area.
        area_km2: f64,
        /// Required minimum.
        min_km2: f64,
    },
    /// A boundary vertex did not have exactly two boundary neighbors.
    #[error("boundary is not a single closed loop (vertex {vertex} has {neighbors} loop neighbors)")]
    OpenBoundary {
        /// Offending vertex index.
        vertex: u32,
        /// Boundary-neighbor count observed.
        neighbors: usize,
    },
    /// The vertex set contains a non-continental or foreign-plate vertex.
    #[error("vertex {0} is not continental crust of the source plate")]
    NotContinental(u32),
    /// No oceanic plate was available to carry the terrane.
    #[error("no oceanic carrier plate available")]
    NoCarrier,
    /// Unknown terrane id.
    #[error("terrane {0} not found")]
    UnknownTerrane(u32),
    /// Unknown or invalid plate id.
    #[error("plate {0} not found")]
    UnknownPlate(u32),
    /// Reattachment target must be continental.
    #[error("target plate {0} is not continental")]
    TargetNotContinental(u32),
}

/// Failures while loading the exemplar library. Continental amplification is
/// skipped for the affected class; consumers see amplified == base.
#[derive(Debug, thiserror::Error)]
pub enum ExemplarIoError {
    /// Filesystem failure reading manifest or heightfield.
    #[error("exemplar io: {0}")]
    Io(#[from] std::io::Error),
    /// Manifest was not valid JSON of the expected shape.
    #[error("exemplar manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    /// PNG16 decode failure or wrong pixel format.
    #[error("exemplar `{id}`: {reason}")]
    Decode {
        /// Exemplar id from the manifest.
        id: String,
        /// Human-readable decode failure.
        reason: String,
    },
}

/// Failures while writing CSV or PNG artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Filesystem failure.
    #[error("export io: {0}")]
    Io(#[from] std::io::Error),
    /// Image encoder failure.
    #[error("export encode: {0}")]
    Encode(String),
}
