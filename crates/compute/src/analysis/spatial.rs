use foundation::bounds::Aabb2;
use foundation::math::{LocalFrame, LocalXy};
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::config::AggregationConfig;

/// Relative slack between planar and haversine distance inside the grid frame.
///
/// The frame uses WGS84 curvature radii while distances use the haversine
/// mean radius; east-west the two differ by up to about 0.45% near the poles.
const FRAME_DISTORTION: f64 = 5e-3;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpacingMethod {
    BruteForce,
    GridIndex,
}

/// Per-point nearest-neighbour distances (meters), parallel to the input.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestNeighbors {
    pub distances: Vec<f64>,
    pub method: SpacingMethod,
}

pub struct SpatialAnalysis;

impl SpatialAnalysis {
    pub fn bounds(points: &[Point<f64>]) -> Aabb2 {
        Aabb2::from_points(points.iter().map(|p| [p.x(), p.y()]))
    }

    /// Returns (index, haversine distance in meters), ignoring `skip`.
    pub fn nearest_point(
        points: &[Point<f64>],
        target: Point<f64>,
        skip: Option<usize>,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in points.iter().enumerate() {
            if Some(i) == skip {
                continue;
            }
            let d = target.haversine_distance(p);
            if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                best = Some((i, d));
            }
        }
        best
    }

    /// Distance from every point to its nearest other point.
    ///
    /// Exact O(n²) scan up to `config.brute_force_limit` points, a uniform grid
    /// index above it. Both return the same distances. Fewer than two points
    /// yield no distances.
    pub fn nearest_neighbor_distances(
        points: &[Point<f64>],
        config: &AggregationConfig,
    ) -> NearestNeighbors {
        if points.len() < 2 {
            return NearestNeighbors {
                distances: Vec::new(),
                method: SpacingMethod::BruteForce,
            };
        }
        if points.len() <= config.brute_force_limit {
            let distances = (0..points.len())
                .map(|i| {
                    Self::nearest_point(points, points[i], Some(i))
                        .map(|(_, d)| d)
                        .unwrap_or(0.0)
                })
                .collect();
            return NearestNeighbors {
                distances,
                method: SpacingMethod::BruteForce,
            };
        }

        let grid = GridIndex::build(points);
        let distances = (0..points.len())
            .map(|i| grid.nearest_distance(points, i, config.grid_tolerance_m))
            .collect();
        NearestNeighbors {
            distances,
            method: SpacingMethod::GridIndex,
        }
    }
}

/// Uniform bucket grid in a local metric frame.
struct GridIndex {
    cell_m: f64,
    min: LocalXy,
    cols: usize,
    rows: usize,
    local: Vec<LocalXy>,
    buckets: Vec<Vec<usize>>,
}

impl GridIndex {
    fn build(points: &[Point<f64>]) -> Self {
        let bounds = SpatialAnalysis::bounds(points);
        let [clon, clat] = bounds.center().unwrap_or([0.0, 0.0]);
        let frame = LocalFrame::new(clon, clat);
        let local: Vec<LocalXy> = points
            .iter()
            .map(|p| frame.to_local(p.x(), p.y()))
            .collect();

        let mut min = LocalXy {
            east: f64::INFINITY,
            north: f64::INFINITY,
        };
        let mut max = LocalXy {
            east: f64::NEG_INFINITY,
            north: f64::NEG_INFINITY,
        };
        for p in &local {
            min.east = min.east.min(p.east);
            min.north = min.north.min(p.north);
            max.east = max.east.max(p.east);
            max.north = max.north.max(p.north);
        }

        // About one point per cell on average.
        let w = (max.east - min.east).max(1.0);
        let h = (max.north - min.north).max(1.0);
        let cell_m = (w * h / local.len() as f64).sqrt().max(0.1);
        let cols = (w / cell_m).floor() as usize + 1;
        let rows = (h / cell_m).floor() as usize + 1;

        let mut grid = Self {
            cell_m,
            min,
            cols,
            rows,
            local,
            buckets: vec![Vec::new(); cols * rows],
        };
        for i in 0..grid.local.len() {
            let (cx, cy) = grid.cell_of(grid.local[i]);
            grid.buckets[cy * cols + cx].push(i);
        }
        grid
    }

    fn cell_of(&self, p: LocalXy) -> (usize, usize) {
        let cx = ((p.east - self.min.east) / self.cell_m).floor().max(0.0) as usize;
        let cy = ((p.north - self.min.north) / self.cell_m).floor().max(0.0) as usize;
        (cx.min(self.cols - 1), cy.min(self.rows - 1))
    }

    fn nearest_distance(&self, points: &[Point<f64>], i: usize, tolerance_m: f64) -> f64 {
        let (cx, cy) = self.cell_of(self.local[i]);
        let max_ring = self.cols.max(self.rows);
        let mut best = f64::INFINITY;

        for r in 0..=max_ring {
            self.visit_ring(cx, cy, r, |j| {
                if j != i {
                    best = best.min(points[i].haversine_distance(&points[j]));
                }
            });
            // Anything not yet visited is at least r cells away.
            let reach = r as f64 * self.cell_m;
            if best.is_finite() && best * (1.0 + FRAME_DISTORTION) + tolerance_m <= reach {
                break;
            }
        }
        if best.is_finite() { best } else { 0.0 }
    }

    fn visit_ring(&self, cx: usize, cy: usize, r: usize, mut f: impl FnMut(usize)) {
        let (cx, cy, r) = (cx as i64, cy as i64, r as i64);
        for y in (cy - r)..=(cy + r) {
            if y < 0 || y >= self.rows as i64 {
                continue;
            }
            let on_edge_row = y == cy - r || y == cy + r;
            let step = if on_edge_row || r == 0 {
                1
            } else {
                (2 * r) as usize
            };
            for x in ((cx - r)..=(cx + r)).step_by(step) {
                if x < 0 || x >= self.cols as i64 {
                    continue;
                }
                for &j in &self.buckets[y as usize * self.cols + x as usize] {
                    f(j);
                }
            }
        }
    }
}
