//! Mesh analytics: resolve a viewport center to its mesh and surveyed
//! overlap, then aggregate the trees standing in it.

pub mod analysis;
pub mod config;
pub mod report;

pub use analysis::*;
pub use config::AggregationConfig;
pub use report::*;
