//! Read-only survey model: tree records, the mesh grid and surveyed areas.
//!
//! Everything here is an immutable snapshot. Tree sets are swapped wholesale
//! when the active area changes; grids and areas never change after load.

pub mod area;
pub mod mesh;
pub mod region;
pub mod tree;

pub use area::*;
pub use mesh::*;
pub use region::*;
pub use tree::*;
