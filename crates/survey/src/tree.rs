use std::collections::BTreeMap;

use foundation::bounds::Aabb2;
use foundation::ids::TreeId;
use geo::Point;
use serde::{Deserialize, Serialize};

/// One surveyed tree.
///
/// Numeric fields are already sanitized at ingestion: finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub id: TreeId,
    pub species: String,
    /// Diameter at breast height (cm).
    pub dbh_cm: f64,
    pub height_m: f64,
    pub volume_m3: f64,
    /// Marked for thinning.
    pub cut: bool,
    pub comment: String,
    pub lon: f64,
    pub lat: f64,
}

impl TreeRecord {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Cross-sectional trunk area at breast height (m²).
    pub fn basal_area_m2(&self) -> f64 {
        let r = self.dbh_cm / 200.0;
        core::f64::consts::PI * r * r
    }

    /// Height/DBH shape ratio, `None` when DBH is zero.
    pub fn shape_ratio(&self) -> Option<f64> {
        if self.dbh_cm > 0.0 {
            Some(self.height_m / self.dbh_cm)
        } else {
            None
        }
    }

    /// Crop trees kept for the long rotation, marked by comment.
    pub fn is_future_tree(&self) -> bool {
        let normalized: String = self
            .comment
            .trim()
            .chars()
            .map(fold_full_width_digit)
            .collect();
        normalized == "将来木" || normalized == "100年木"
    }
}

fn fold_full_width_digit(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    }
}

/// Immutable tree snapshot for one survey area.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeSet {
    trees: Vec<TreeRecord>,
    by_id: BTreeMap<TreeId, usize>,
    bounds: Aabb2,
}

impl TreeSet {
    pub fn new(trees: Vec<TreeRecord>) -> Self {
        let mut by_id = BTreeMap::new();
        for (i, t) in trees.iter().enumerate() {
            // Later duplicates shadow earlier ones, the way the edit overlay did.
            by_id.insert(t.id.clone(), i);
        }
        let bounds = Aabb2::from_points(trees.iter().map(|t| [t.lon, t.lat]));
        Self {
            trees,
            by_id,
            bounds,
        }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeRecord> {
        self.trees.iter()
    }

    pub fn as_slice(&self) -> &[TreeRecord] {
        &self.trees
    }

    pub fn get(&self, id: &TreeId) -> Option<&TreeRecord> {
        self.by_id.get(id).and_then(|&i| self.trees.get(i))
    }

    pub fn bounds(&self) -> &Aabb2 {
        &self.bounds
    }
}

impl FromIterator<TreeRecord> for TreeSet {
    fn from_iter<I: IntoIterator<Item = TreeRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) fn tree(id: &str, lon: f64, lat: f64) -> TreeRecord {
    TreeRecord {
        id: TreeId::new(id),
        species: "スギ".to_string(),
        dbh_cm: 30.0,
        height_m: 20.0,
        volume_m3: 0.6,
        cut: false,
        comment: String::new(),
        lon,
        lat,
    }
}

#[cfg(test)]
mod tests {
    use super::{TreeSet, tree};
    use foundation::ids::TreeId;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn basal_area_uses_radius_in_meters() {
        let t = tree("1", 0.0, 0.0);
        assert_close(t.basal_area_m2(), core::f64::consts::PI * 0.15 * 0.15, 1e-12);
    }

    #[test]
    fn zero_dbh_has_no_shape_ratio() {
        let mut t = tree("1", 0.0, 0.0);
        assert_close(t.shape_ratio().unwrap(), 20.0 / 30.0, 1e-12);
        t.dbh_cm = 0.0;
        assert!(t.shape_ratio().is_none());
    }

    #[test]
    fn future_tree_comment_folds_full_width_digits() {
        let mut t = tree("1", 0.0, 0.0);
        t.comment = " １００年木 ".to_string();
        assert!(t.is_future_tree());
        t.comment = "将来木".to_string();
        assert!(t.is_future_tree());
        t.comment = "将来木?".to_string();
        assert!(!t.is_future_tree());
    }

    #[test]
    fn tree_set_indexes_by_id() {
        let set: TreeSet = vec![tree("a", 1.0, 2.0), tree("b", 3.0, 4.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(&TreeId::new("b")).map(|t| t.lon), Some(3.0));
        assert!(set.get(&TreeId::new("c")).is_none());
        assert_eq!(set.bounds().min, [1.0, 2.0]);
    }
}
