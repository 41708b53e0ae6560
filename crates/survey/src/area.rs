use foundation::bounds::Aabb2;
use foundation::ids::AreaName;

use crate::region::Region;

/// Surveyed ground (TLS scan extent).
#[derive(Debug, Clone, PartialEq)]
pub struct AreaPolygon {
    pub name: AreaName,
    pub region: Region,
}

impl AreaPolygon {
    pub fn new(name: AreaName, region: impl Into<Region>) -> Self {
        Self {
            name,
            region: region.into(),
        }
    }

    pub fn bounds(&self) -> &Aabb2 {
        self.region.bounds()
    }
}

/// All survey areas, in load order. Names need not be unique: an area may be
/// split over several features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaSet {
    areas: Vec<AreaPolygon>,
}

impl AreaSet {
    pub fn new(areas: Vec<AreaPolygon>) -> Self {
        Self { areas }
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AreaPolygon> {
        self.areas.iter()
    }

    /// Areas whose bounding box touches `bounds`.
    pub fn candidates<'a>(
        &'a self,
        bounds: &Aabb2,
    ) -> impl Iterator<Item = &'a AreaPolygon> + use<'a> {
        let bounds = *bounds;
        self.areas.iter().filter(move |a| a.bounds().intersects(&bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::{AreaPolygon, AreaSet};
    use crate::region::test_support::rect;
    use foundation::bounds::Aabb2;
    use foundation::ids::AreaName;

    #[test]
    fn candidates_filter_by_bounds() {
        let set = AreaSet::new(vec![
            AreaPolygon::new(AreaName::new("a"), rect(0.0, 0.0, 1.0, 1.0)),
            AreaPolygon::new(AreaName::new("b"), rect(5.0, 5.0, 6.0, 6.0)),
        ]);
        let q = Aabb2::new([0.5, 0.5], [2.0, 2.0]);
        let names: Vec<_> = set.candidates(&q).map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    fn first_hit(set: &AreaSet, lon: f64, lat: f64) -> Option<&AreaPolygon> {
        let query = Aabb2::new([lon, lat], [lon, lat]);
        set.candidates(&query).next()
    }

    #[test]
    fn candidates_outlive_the_query_box() {
        let set = AreaSet::new(vec![AreaPolygon::new(
            AreaName::new("a"),
            rect(0.0, 0.0, 1.0, 1.0),
        )]);
        let hit = first_hit(&set, 0.5, 0.5).map(|a| &a.name);
        assert_eq!(hit.map(AreaName::as_str), Some("a"));
        assert!(first_hit(&set, 3.0, 3.0).is_none());
    }
}
