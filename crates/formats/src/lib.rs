pub mod geojson;
pub mod trees_csv;

pub use geojson::*;
pub use trees_csv::*;
