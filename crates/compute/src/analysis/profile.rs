use foundation::bounds::Aabb2;
use foundation::ids::TreeId;
use serde::Serialize;
use survey::TreeRecord;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAxis {
    EastWest,
    NorthSouth,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePoint {
    pub id: TreeId,
    /// Position across the mesh along the profile axis, in [0, 1].
    pub x: f64,
    pub height_m: f64,
    pub dbh_cm: f64,
    pub species: String,
    pub cut: bool,
    pub future: bool,
}

/// Side view of a mesh's trees, plotted against one horizontal axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeightProfile {
    pub axis: ProfileAxis,
    pub points: Vec<ProfilePoint>,
}

impl HeightProfile {
    pub fn east_west(mesh: &Aabb2, trees: &[TreeRecord]) -> Self {
        Self::build(ProfileAxis::EastWest, mesh, trees)
    }

    pub fn north_south(mesh: &Aabb2, trees: &[TreeRecord]) -> Self {
        Self::build(ProfileAxis::NorthSouth, mesh, trees)
    }

    fn build(axis: ProfileAxis, mesh: &Aabb2, trees: &[TreeRecord]) -> Self {
        let (lo, span) = match axis {
            ProfileAxis::EastWest => (mesh.min[0], mesh.width()),
            ProfileAxis::NorthSouth => (mesh.min[1], mesh.height()),
        };
        let points = trees
            .iter()
            .map(|t| {
                let v = match axis {
                    ProfileAxis::EastWest => t.lon,
                    ProfileAxis::NorthSouth => t.lat,
                };
                let x = if span > 0.0 {
                    ((v - lo) / span).clamp(0.0, 1.0)
                } else {
                    0.5
                };
                ProfilePoint {
                    id: t.id.clone(),
                    x,
                    height_m: t.height_m,
                    dbh_cm: t.dbh_cm,
                    species: t.species.clone(),
                    cut: t.cut,
                    future: t.is_future_tree(),
                }
            })
            .collect();
        Self { axis, points }
    }

    pub fn max_height_m(&self) -> Option<f64> {
        self.points.iter().map(|p| p.height_m).reduce(f64::max)
    }
}
