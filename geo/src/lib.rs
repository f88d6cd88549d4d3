#![forbid(unsafe_code)]
#![deny(clippy::all)]

//! Spherical math primitives for the orogen engine.
//! Double precision throughout; the unit sphere is the canonical frame.

pub mod icosa;
mod math;


pub use icosa::{icosahedron_faces, icosahedron_vertices};
pub use math::{
    geodesic_distance, local_basis, rotate_about_axis, spherical_mean, spherical_triangle_area,
    Vec3,
};
