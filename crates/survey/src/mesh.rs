use std::collections::BTreeMap;

use foundation::bounds::Aabb2;
use foundation::ids::MeshId;
use geo::Point;

use crate::region::Region;

/// One cell of the fixed statistics grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshCell {
    pub id: MeshId,
    pub region: Region,
}

impl MeshCell {
    pub fn new(id: MeshId, region: impl Into<Region>) -> Self {
        Self {
            id,
            region: region.into(),
        }
    }

    pub fn bounds(&self) -> &Aabb2 {
        self.region.bounds()
    }

    pub fn contains(&self, point: Point<f64>) -> bool {
        self.region.contains_point(point)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshGridError {
    #[error("duplicate mesh id: {0}")]
    DuplicateId(MeshId),
}

/// The statistics grid, in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGrid {
    cells: Vec<MeshCell>,
    by_id: BTreeMap<MeshId, usize>,
    bounds: Aabb2,
}

impl MeshGrid {
    pub fn new(cells: Vec<MeshCell>) -> Result<Self, MeshGridError> {
        let mut by_id = BTreeMap::new();
        let mut bounds = Aabb2::empty();
        for (i, cell) in cells.iter().enumerate() {
            if by_id.insert(cell.id.clone(), i).is_some() {
                return Err(MeshGridError::DuplicateId(cell.id.clone()));
            }
            if !cell.bounds().is_empty() {
                bounds.expand(cell.bounds().min);
                bounds.expand(cell.bounds().max);
            }
        }
        Ok(Self {
            cells,
            by_id,
            bounds,
        })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[MeshCell] {
        &self.cells
    }

    pub fn get(&self, id: &MeshId) -> Option<&MeshCell> {
        self.by_id.get(id).and_then(|&i| self.cells.get(i))
    }

    pub fn bounds(&self) -> &Aabb2 {
        &self.bounds
    }

    /// The last cell (in load order) containing `point`, boundary inclusive.
    pub fn locate(&self, point: Point<f64>) -> Option<&MeshCell> {
        if !self.bounds.contains([point.x(), point.y()]) {
            return None;
        }
        self.cells.iter().rev().find(|c| c.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::{MeshCell, MeshGrid, MeshGridError};
    use crate::region::test_support::rect;
    use foundation::ids::MeshId;
    use geo::Point;

    fn grid_2x1() -> MeshGrid {
        MeshGrid::new(vec![
            MeshCell::new(MeshId::new("w"), rect(0.0, 0.0, 1.0, 1.0)),
            MeshCell::new(MeshId::new("e"), rect(1.0, 0.0, 2.0, 1.0)),
        ])
        .unwrap()
    }

    #[test]
    fn locate_finds_containing_cell() {
        let g = grid_2x1();
        assert_eq!(g.locate(Point::new(1.5, 0.5)).unwrap().id.as_str(), "e");
        assert!(g.locate(Point::new(2.5, 0.5)).is_none());
    }

    #[test]
    fn shared_edge_resolves_to_last_cell() {
        let g = grid_2x1();
        assert_eq!(g.locate(Point::new(1.0, 0.5)).unwrap().id.as_str(), "e");
        assert_eq!(g.locate(Point::new(0.0, 0.5)).unwrap().id.as_str(), "w");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = MeshGrid::new(vec![
            MeshCell::new(MeshId::new("a"), rect(0.0, 0.0, 1.0, 1.0)),
            MeshCell::new(MeshId::new("a"), rect(1.0, 0.0, 2.0, 1.0)),
        ])
        .unwrap_err();
        assert_eq!(err, MeshGridError::DuplicateId(MeshId::new("a")));
    }

    #[test]
    fn lookup_by_id() {
        let g = grid_2x1();
        assert_eq!(g.len(), 2);
        assert!(g.get(&MeshId::new("w")).is_some());
        assert_eq!(g.bounds().max, [2.0, 1.0]);
    }
}
