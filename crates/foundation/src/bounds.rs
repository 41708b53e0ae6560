use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in lon/lat degrees.
///
/// `min = [west, south]`, `max = [east, north]`. An empty box has
/// `min > max` and contains nothing.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn empty() -> Self {
        Aabb2 {
            min: [f64::INFINITY, f64::INFINITY],
            max: [f64::NEG_INFINITY, f64::NEG_INFINITY],
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = [f64; 2]>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.expand(p);
        }
        b
    }

    pub fn is_empty(&self) -> bool {
        !(self.min[0] <= self.max[0] && self.min[1] <= self.max[1])
    }

    pub fn expand(&mut self, p: [f64; 2]) {
        self.min[0] = self.min[0].min(p[0]);
        self.min[1] = self.min[1].min(p[1]);
        self.max[0] = self.max[0].max(p[0]);
        self.max[1] = self.max[1].max(p[1]);
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.max[1] - self.min[1]
    }

    /// Boundary-inclusive containment.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    pub fn intersects(&self, other: &Aabb2) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        !(other.min[0] > self.max[0]
            || other.max[0] < self.min[0]
            || other.min[1] > self.max[1]
            || other.max[1] < self.min[1])
    }

    pub fn center(&self) -> Option<[f64; 2]> {
        if self.is_empty() {
            return None;
        }
        Some([
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
        ])
    }
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb2;

    #[test]
    fn empty_box_contains_nothing() {
        let b = Aabb2::empty();
        assert!(b.is_empty());
        assert!(!b.contains([0.0, 0.0]));
        assert_eq!(b.width(), 0.0);
        assert!(b.center().is_none());
    }

    #[test]
    fn from_points_is_boundary_inclusive() {
        let b = Aabb2::from_points([[1.0, 2.0], [3.0, -1.0]]);
        assert_eq!(b.min, [1.0, -1.0]);
        assert_eq!(b.max, [3.0, 2.0]);
        assert!(b.contains([3.0, 2.0]));
        assert!(!b.contains([3.0001, 2.0]));
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb2::new([0.0, 0.0], [1.0, 1.0]);
        let b = Aabb2::new([1.0, 0.5], [2.0, 2.0]);
        let c = Aabb2::new([1.5, 0.0], [2.0, 1.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&Aabb2::empty()));
    }
}
