//! Support code for the `canopy` binary.

pub mod config;
pub mod sidebar;

pub use sidebar::render_sidebar;
