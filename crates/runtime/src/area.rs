use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use foundation::bounds::Aabb2;
use foundation::ids::AreaName;
use foundation::math::LocalFrame;
use formats::{CsvError, IngestReport, read_trees_csv};
use geo::{Closest, ClosestPoint, HaversineDistance, Point};
use survey::AreaSet;

pub const TREES_FILE: &str = "trees.csv";

/// Picks the survey area a viewport center belongs to.
#[derive(Debug, Clone)]
pub struct AreaTracker {
    areas: Arc<AreaSet>,
    buffer_m: f64,
}

impl AreaTracker {
    pub fn new(areas: Arc<AreaSet>, buffer_m: f64) -> Self {
        Self {
            areas,
            buffer_m: buffer_m.max(0.0),
        }
    }

    pub fn areas(&self) -> &AreaSet {
        &self.areas
    }

    pub fn buffer_m(&self) -> f64 {
        self.buffer_m
    }

    /// Containing area first (load order), otherwise the nearest one within
    /// `buffer_m` of its boundary.
    pub fn locate(&self, center: Point<f64>) -> Option<&AreaName> {
        let window = self.search_window(center);
        let mut nearest: Option<(&AreaName, f64)> = None;

        for area in self.areas.candidates(&window) {
            if area.region.contains_point(center) {
                return Some(&area.name);
            }
            if self.buffer_m == 0.0 {
                continue;
            }
            let closest = match area.region.polygon().closest_point(&center) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => p,
                Closest::Indeterminate => continue,
            };
            let d = center.haversine_distance(&closest);
            if d <= self.buffer_m && nearest.map(|(_, best)| d < best).unwrap_or(true) {
                nearest = Some((&area.name, d));
            }
        }
        nearest.map(|(name, _)| name)
    }

    /// Box around `center` reaching `buffer_m` in every direction.
    fn search_window(&self, center: Point<f64>) -> Aabb2 {
        let frame = LocalFrame::new(center.x(), center.y());
        let reach = self.buffer_m * 1.01;
        let dlon = reach / frame.m_per_deg_lon().max(1.0);
        let dlat = reach / frame.m_per_deg_lat().max(1.0);
        Aabb2::new(
            [center.x() - dlon, center.y() - dlat],
            [center.x() + dlon, center.y() + dlat],
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no tree file for area {area}")]
    NotFound { area: AreaName },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },
}

/// Where tree records for an area come from.
pub trait TreeSource: Send + Sync {
    fn load(&self, area: &AreaName) -> Result<IngestReport, SourceError>;
}

/// `<root>/<area>/trees.csv`, falling back to a shared `<root>/trees.csv`.
#[derive(Debug, Clone)]
pub struct DirTreeSource {
    root: PathBuf,
}

impl DirTreeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, area: &AreaName) -> Option<PathBuf> {
        [
            self.root.join(area.as_str()).join(TREES_FILE),
            self.root.join(TREES_FILE),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }
}

impl TreeSource for DirTreeSource {
    fn load(&self, area: &AreaName) -> Result<IngestReport, SourceError> {
        let path = self
            .path_for(area)
            .ok_or_else(|| SourceError::NotFound { area: area.clone() })?;
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        let report = read_trees_csv(BufReader::new(file))
            .map_err(|source| SourceError::Csv { path: path.clone(), source })?;
        tracing::info!(
            %area,
            path = %path.display(),
            trees = report.trees.len(),
            rejected = report.rejected_rows(),
            coerced = report.coerced_values(),
            "loaded trees"
        );
        Ok(report)
    }
}

impl<S: TreeSource + ?Sized> TreeSource for Arc<S> {
    fn load(&self, area: &AreaName) -> Result<IngestReport, SourceError> {
        (**self).load(area)
    }
}
