//! Identifiers, lon/lat bounds and local metric frames shared by every crate.

pub mod bounds;
pub mod ids;
pub mod math;

pub use bounds::*;
pub use ids::*;
