use std::collections::BTreeMap;

use geo::Point;
use survey::{MeshCell, TreeRecord, TreeSet};

use crate::analysis::resolver::Resolution;
use crate::analysis::spatial::SpatialAnalysis;
use crate::analysis::statistics::Statistics;
use crate::config::AggregationConfig;
use crate::report::{
    CutStats, MeshOutcome, MeshReport, MeshStats, MeshSummary, ShapeRatio, Spacing,
    SpeciesShare, Stock,
};

/// Per-mesh stand statistics.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Trees standing in `mesh` (boundary inclusive), in tree-set order.
    pub fn select_trees(mesh: &MeshCell, trees: &TreeSet) -> Vec<TreeRecord> {
        if !mesh.bounds().intersects(trees.bounds()) {
            return Vec::new();
        }
        trees
            .iter()
            .filter(|t| mesh.contains(t.point()))
            .cloned()
            .collect()
    }

    pub fn aggregate(&self, resolution: &Resolution<'_>, trees: &TreeSet) -> MeshReport {
        let Resolution::Resolved { mesh, overlap } = resolution else {
            return MeshReport {
                outcome: MeshOutcome::OutOfMesh,
                trees: Vec::new(),
            };
        };

        let selected = Self::select_trees(mesh, trees);
        let summary = MeshSummary {
            id: mesh.id.clone(),
            bounds: *mesh.bounds(),
        };

        let outcome = if !overlap.is_surveyed() {
            MeshOutcome::OutsideSurveyArea { mesh: summary }
        } else if selected.is_empty() {
            MeshOutcome::NoTrees {
                mesh: summary,
                overlap: overlap.clone(),
            }
        } else {
            MeshOutcome::Stats {
                mesh: summary,
                overlap: overlap.clone(),
                stats: self.stats(&selected, overlap.total_m2),
            }
        };

        tracing::debug!(
            mesh = %mesh.id,
            trees = selected.len(),
            overlap_m2 = overlap.total_m2,
            "aggregated mesh"
        );

        MeshReport {
            outcome,
            trees: selected,
        }
    }

    /// Statistics for a non-empty tree list over `overlap_m2` of surveyed ground.
    pub fn stats(&self, trees: &[TreeRecord], overlap_m2: f64) -> MeshStats {
        let count = trees.len();

        let heights: Vec<f64> = trees.iter().map(|t| t.height_m).collect();
        let dbhs: Vec<f64> = trees.iter().map(|t| t.dbh_cm).collect();
        let mean_height_m = Statistics::mean(&heights).unwrap_or(0.0);
        let mean_dbh_cm = Statistics::mean(&dbhs).unwrap_or(0.0);

        let basal_total = Statistics::sum(trees.iter().map(TreeRecord::basal_area_m2));
        let volume_total = Statistics::sum(trees.iter().map(|t| t.volume_m3));

        MeshStats {
            count,
            density_per_ha: Statistics::per_hectare(count as f64, overlap_m2),
            species: species_shares(trees),
            mean_height_m,
            mean_dbh_cm,
            basal_area: Stock {
                total: basal_total,
                per_ha: Statistics::per_hectare(basal_total, overlap_m2),
            },
            volume: Stock {
                total: volume_total,
                per_ha: Statistics::per_hectare(volume_total, overlap_m2),
            },
            shape_ratio: shape_ratio(trees),
            spacing: self.spacing(trees, mean_height_m),
            cut: cut_stats(trees, basal_total, volume_total),
        }
    }

    fn spacing(&self, trees: &[TreeRecord], mean_height_m: f64) -> Spacing {
        let points: Vec<Point<f64>> = trees.iter().map(TreeRecord::point).collect();
        let nn = SpatialAnalysis::nearest_neighbor_distances(&points, &self.config);
        let mean_nearest_m = Statistics::mean(&nn.distances);
        let relative_spacing_percent = mean_nearest_m
            .filter(|_| mean_height_m > 0.0)
            .map(|d| d / mean_height_m * 100.0);
        Spacing {
            mean_nearest_m,
            relative_spacing_percent,
            method: nn.method,
        }
    }
}

/// Shares by descending count, ties by species name.
fn species_shares(trees: &[TreeRecord]) -> Vec<SpeciesShare> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in trees {
        *counts.entry(t.species.as_str()).or_insert(0) += 1;
    }
    let total = trees.len() as f64;
    let mut shares: Vec<SpeciesShare> = counts
        .into_iter()
        .map(|(species, count)| SpeciesShare {
            species: species.to_string(),
            count,
            percent: Statistics::percent(count as f64, total),
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.species.cmp(&b.species)));
    shares
}

fn shape_ratio(trees: &[TreeRecord]) -> ShapeRatio {
    let mut ratios = Vec::with_capacity(trees.len());
    let mut excluded = Vec::new();
    for t in trees {
        match t.shape_ratio() {
            Some(r) => ratios.push(r),
            None => excluded.push(t.id.clone()),
        }
    }
    if !excluded.is_empty() {
        tracing::debug!(excluded = excluded.len(), "DBH=0 trees left out of shape ratio");
    }
    ShapeRatio {
        mean: Statistics::mean(&ratios),
        excluded,
    }
}

fn cut_stats(trees: &[TreeRecord], basal_total: f64, volume_total: f64) -> Option<CutStats> {
    let cut: Vec<&TreeRecord> = trees.iter().filter(|t| t.cut).collect();
    if cut.is_empty() {
        return None;
    }
    let basal_cut = Statistics::sum(cut.iter().map(|t| t.basal_area_m2()));
    let volume_cut = Statistics::sum(cut.iter().map(|t| t.volume_m3));
    Some(CutStats {
        count: cut.len(),
        count_rate_percent: Statistics::percent(cut.len() as f64, trees.len() as f64),
        basal_area_rate_percent: Statistics::percent(basal_cut, basal_total),
        volume_rate_percent: Statistics::percent(volume_cut, volume_total),
    })
}
