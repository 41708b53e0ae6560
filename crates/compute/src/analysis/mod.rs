pub mod aggregate;
pub mod profile;
pub mod resolver;
pub mod spatial;
pub mod statistics;

pub use aggregate::*;
pub use profile::*;
pub use resolver::*;
pub use spatial::*;
pub use statistics::*;
