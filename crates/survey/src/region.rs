use foundation::bounds::Aabb2;
use geo::{Intersects, MultiPolygon, Point};

/// A polygonal region with a cached lon/lat bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygon: MultiPolygon<f64>,
    bounds: Aabb2,
}

impl Region {
    pub fn new(polygon: MultiPolygon<f64>) -> Self {
        let bounds = Aabb2::from_points(
            polygon
                .iter()
                .flat_map(|p| p.exterior().coords())
                .map(|c| [c.x, c.y]),
        );
        Self { polygon, bounds }
    }

    pub fn polygon(&self) -> &MultiPolygon<f64> {
        &self.polygon
    }

    pub fn bounds(&self) -> &Aabb2 {
        &self.bounds
    }

    /// Boundary-inclusive point test.
    pub fn contains_point(&self, point: Point<f64>) -> bool {
        if !self.bounds.contains([point.x(), point.y()]) {
            return false;
        }
        self.polygon.iter().any(|poly| point.intersects(poly))
    }
}

impl From<geo::Polygon<f64>> for Region {
    fn from(polygon: geo::Polygon<f64>) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use geo::{LineString, Polygon};

    /// Axis-aligned rectangle polygon in lon/lat degrees.
    pub fn rect(west: f64, south: f64, east: f64, north: f64) -> Polygon<f64> {
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
}

#[cfg(test)]
mod tests {
    use super::Region;
    use super::test_support::rect;
    use geo::Point;

    #[test]
    fn bounds_follow_exterior() {
        let r = Region::from(rect(1.0, 2.0, 3.0, 4.0));
        assert_eq!(r.bounds().min, [1.0, 2.0]);
        assert_eq!(r.bounds().max, [3.0, 4.0]);
    }

    #[test]
    fn boundary_points_are_inside() {
        let r = Region::from(rect(0.0, 0.0, 1.0, 1.0));
        assert!(r.contains_point(Point::new(0.5, 0.5)));
        assert!(r.contains_point(Point::new(1.0, 0.5)));
        assert!(r.contains_point(Point::new(0.0, 0.0)));
        assert!(!r.contains_point(Point::new(1.5, 0.5)));
    }
}
