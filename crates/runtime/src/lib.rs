//! Viewport-driven refresh: track the survey area under the viewport, keep
//! its trees loaded, and publish mesh reports last-writer-wins.

pub mod area;
pub mod event_bus;
pub mod generation;
pub mod metrics;
pub mod pipeline;
pub mod refresher;

pub use area::*;
pub use event_bus::*;
pub use generation::*;
pub use metrics::Metrics;
pub use pipeline::*;
pub use refresher::*;
