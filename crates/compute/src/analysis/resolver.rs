use std::panic::{AssertUnwindSafe, catch_unwind};

use foundation::ids::AreaName;
use geo::{BooleanOps, GeodesicArea, MultiPolygon, Point};
use serde::Serialize;
use survey::{AreaSet, MeshCell, MeshGrid};

/// Surveyed ground inside one mesh cell, per area polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaOverlap {
    pub name: AreaName,
    pub area_m2: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overlap {
    /// Sum over every intersecting area polygon (m²).
    pub total_m2: f64,
    pub areas: Vec<AreaOverlap>,
}

impl Overlap {
    pub fn is_surveyed(&self) -> bool {
        self.total_m2 > 0.0
    }
}

/// Where a viewport center falls.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    OutOfMesh,
    Resolved { mesh: &'a MeshCell, overlap: Overlap },
}

impl<'a> Resolution<'a> {
    pub fn mesh(&self) -> Option<&'a MeshCell> {
        match self {
            Resolution::OutOfMesh => None,
            Resolution::Resolved { mesh, .. } => Some(mesh),
        }
    }

    pub fn overlap_m2(&self) -> f64 {
        match self {
            Resolution::OutOfMesh => 0.0,
            Resolution::Resolved { overlap, .. } => overlap.total_m2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    #[error("degenerate polygon")]
    Degenerate,
    #[error("non-finite coordinate or area")]
    NonFinite,
    #[error("polygon operation failed: {0}")]
    Failed(String),
}

/// Geodesic area (m²) of `a ∩ b`.
///
/// Invalid input and panics inside the boolean-op sweep come back as errors.
pub fn intersection_area_m2(
    a: &MultiPolygon<f64>,
    b: &MultiPolygon<f64>,
) -> Result<f64, GeometryError> {
    validate(a)?;
    validate(b)?;

    let clipped = catch_unwind(AssertUnwindSafe(|| a.intersection(b))).map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string());
        GeometryError::Failed(msg)
    })?;

    let area: f64 = clipped.iter().map(|p| p.geodesic_area_unsigned()).sum();
    if !area.is_finite() {
        return Err(GeometryError::NonFinite);
    }
    Ok(area)
}

fn validate(mp: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    if mp.0.is_empty() {
        return Err(GeometryError::Degenerate);
    }
    for poly in mp.iter() {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            // Closed rings: at least a triangle plus the closing point.
            if ring.0.len() < 4 {
                return Err(GeometryError::Degenerate);
            }
            if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                return Err(GeometryError::NonFinite);
            }
        }
    }
    Ok(())
}

/// Maps a viewport center to its mesh cell and the surveyed ground under it.
#[derive(Debug, Copy, Clone)]
pub struct Resolver<'a> {
    grid: &'a MeshGrid,
    areas: &'a AreaSet,
}

impl<'a> Resolver<'a> {
    pub fn new(grid: &'a MeshGrid, areas: &'a AreaSet) -> Self {
        Self { grid, areas }
    }

    pub fn resolve(&self, center: Point<f64>) -> Resolution<'a> {
        let Some(mesh) = self.grid.locate(center) else {
            return Resolution::OutOfMesh;
        };
        let overlap = self.overlap(mesh);
        Resolution::Resolved { mesh, overlap }
    }

    pub fn overlap(&self, mesh: &MeshCell) -> Overlap {
        let mut out = Overlap::default();
        for area in self.areas.candidates(mesh.bounds()) {
            match intersection_area_m2(mesh.region.polygon(), area.region.polygon()) {
                Ok(a) if a > 0.0 => {
                    out.total_m2 += a;
                    out.areas.push(AreaOverlap {
                        name: area.name.clone(),
                        area_m2: a,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(
                        mesh = %mesh.id,
                        area = %area.name,
                        %err,
                        "mesh/area intersection failed; treating as unsurveyed"
                    );
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{GeometryError, Resolution, Resolver, intersection_area_m2};
    use foundation::ids::{AreaName, MeshId};
    use geo::{GeodesicArea, LineString, MultiPolygon, Point, Polygon};
    use survey::{AreaPolygon, AreaSet, MeshCell, MeshGrid};

    fn rect(west: f64, south: f64, east: f64, north: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (west, south),
                (east, south),
                (east, north),
                (west, north),
                (west, south),
            ]),
            vec![],
        )
    }

    fn assert_rel(a: f64, b: f64, rel: f64) {
        let diff = (a - b).abs();
        assert!(diff <= rel * b.abs(), "expected {a} ~= {b} (diff {diff})");
    }

    fn grid() -> MeshGrid {
        MeshGrid::new(vec![MeshCell::new(
            MeshId::new("m1"),
            rect(0.0, 0.0, 0.001, 0.001),
        )])
        .unwrap()
    }

    #[test]
    fn point_outside_grid_is_out_of_mesh() {
        let g = grid();
        let areas = AreaSet::default();
        let r = Resolver::new(&g, &areas).resolve(Point::new(0.002, 0.0005));
        assert_eq!(r, Resolution::OutOfMesh);
        assert_eq!(r.overlap_m2(), 0.0);
    }

    #[test]
    fn mesh_inside_area_overlaps_fully() {
        let g = grid();
        let areas = AreaSet::new(vec![AreaPolygon::new(
            AreaName::new("A"),
            rect(-0.01, -0.01, 0.01, 0.01),
        )]);
        let r = Resolver::new(&g, &areas).resolve(Point::new(0.0005, 0.0005));
        let mesh_area = rect(0.0, 0.0, 0.001, 0.001).geodesic_area_unsigned();
        assert_eq!(r.mesh().map(|m| m.id.as_str()), Some("m1"));
        assert_rel(r.overlap_m2(), mesh_area, 1e-6);
        assert_rel(mesh_area, 12_308.0, 1e-2);
    }

    #[test]
    fn overlaps_sum_over_area_polygons() {
        let g = grid();
        let areas = AreaSet::new(vec![
            AreaPolygon::new(AreaName::new("west"), rect(-0.01, -0.01, 0.0005, 0.01)),
            AreaPolygon::new(AreaName::new("east"), rect(0.0005, -0.01, 0.01, 0.01)),
            AreaPolygon::new(AreaName::new("far"), rect(1.0, 1.0, 1.1, 1.1)),
        ]);
        let Resolution::Resolved { overlap, .. } =
            Resolver::new(&g, &areas).resolve(Point::new(0.0001, 0.0001))
        else {
            panic!("expected a resolved mesh");
        };
        let names: Vec<_> = overlap.areas.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["west", "east"]);
        let mesh_area = rect(0.0, 0.0, 0.001, 0.001).geodesic_area_unsigned();
        assert_rel(overlap.total_m2, mesh_area, 1e-6);
        assert_rel(overlap.areas[0].area_m2, mesh_area / 2.0, 1e-3);
    }

    #[test]
    fn no_area_means_zero_overlap() {
        let g = grid();
        let areas = AreaSet::default();
        let r = Resolver::new(&g, &areas).resolve(Point::new(0.0005, 0.0005));
        assert!(matches!(r, Resolution::Resolved { .. }));
        assert_eq!(r.overlap_m2(), 0.0);
    }

    #[test]
    fn degenerate_area_degrades_to_unsurveyed() {
        let g = grid();
        let sliver = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (0.001, 0.001), (0.0, 0.0)]),
            vec![],
        );
        let err = intersection_area_m2(
            &MultiPolygon::new(vec![rect(0.0, 0.0, 0.001, 0.001)]),
            &MultiPolygon::new(vec![sliver.clone()]),
        )
        .unwrap_err();
        assert_eq!(err, GeometryError::Degenerate);

        let areas = AreaSet::new(vec![AreaPolygon::new(AreaName::new("bad"), sliver)]);
        let r = Resolver::new(&g, &areas).resolve(Point::new(0.0005, 0.0005));
        assert_eq!(r.overlap_m2(), 0.0);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let bad = rect(0.0, 0.0, f64::NAN, 0.001);
        let err = intersection_area_m2(
            &MultiPolygon::new(vec![bad]),
            &MultiPolygon::new(vec![rect(0.0, 0.0, 0.001, 0.001)]),
        )
        .unwrap_err();
        assert_eq!(err, GeometryError::NonFinite);
    }
}
