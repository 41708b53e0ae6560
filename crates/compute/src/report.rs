use foundation::bounds::Aabb2;
use foundation::ids::{MeshId, TreeId};
use serde::Serialize;
use survey::TreeRecord;

use crate::analysis::resolver::Overlap;
use crate::analysis::spatial::SpacingMethod;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshSummary {
    pub id: MeshId,
    pub bounds: Aabb2,
}

/// The four user-visible states of a mesh lookup. None of them is an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MeshOutcome {
    OutOfMesh,
    /// The mesh has no surveyed ground under it, whatever its tree count.
    OutsideSurveyArea {
        mesh: MeshSummary,
    },
    NoTrees {
        mesh: MeshSummary,
        overlap: Overlap,
    },
    Stats {
        mesh: MeshSummary,
        overlap: Overlap,
        stats: MeshStats,
    },
}

impl MeshOutcome {
    pub fn mesh(&self) -> Option<&MeshSummary> {
        match self {
            MeshOutcome::OutOfMesh => None,
            MeshOutcome::OutsideSurveyArea { mesh }
            | MeshOutcome::NoTrees { mesh, .. }
            | MeshOutcome::Stats { mesh, .. } => Some(mesh),
        }
    }

    pub fn stats(&self) -> Option<&MeshStats> {
        match self {
            MeshOutcome::Stats { stats, .. } => Some(stats),
            _ => None,
        }
    }

    /// Trees per hectare; defined only for surveyed meshes.
    pub fn density_per_ha(&self) -> Option<f64> {
        match self {
            MeshOutcome::NoTrees { .. } => Some(0.0),
            MeshOutcome::Stats { stats, .. } => Some(stats.density_per_ha),
            _ => None,
        }
    }
}

/// Aggregation result plus the trees it was computed from.
///
/// `trees` is the authoritative membership list for the mesh; consumers plot
/// it as-is instead of re-filtering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshReport {
    pub outcome: MeshOutcome,
    pub trees: Vec<TreeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesShare {
    pub species: String,
    pub count: usize,
    pub percent: f64,
}

/// A stock total and its per-hectare normalization.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Stock {
    pub total: f64,
    pub per_ha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeRatio {
    /// Mean height(m)/DBH(cm) over trees with DBH > 0.
    pub mean: Option<f64>,
    /// Trees left out because DBH is zero.
    pub excluded: Vec<TreeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spacing {
    pub mean_nearest_m: Option<f64>,
    /// Mean nearest-neighbour distance over mean height, in percent.
    pub relative_spacing_percent: Option<f64>,
    pub method: SpacingMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutStats {
    pub count: usize,
    pub count_rate_percent: f64,
    pub basal_area_rate_percent: f64,
    pub volume_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshStats {
    pub count: usize,
    pub density_per_ha: f64,
    pub species: Vec<SpeciesShare>,
    pub mean_height_m: f64,
    pub mean_dbh_cm: f64,
    /// m² and m²/ha.
    pub basal_area: Stock,
    /// m³ and m³/ha.
    pub volume: Stock,
    pub shape_ratio: ShapeRatio,
    pub spacing: Spacing,
    pub cut: Option<CutStats>,
}
