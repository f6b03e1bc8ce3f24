//! R-tree over projected bus stops for nearest-neighbour queries.
//!
//! Points must already be planar (metres), so plain Euclidean distance is
//! exact for the purposes of the walking-distance threshold.

use geo::Point;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

// ============================================================================
// Bus Stop Spatial Node
// ============================================================================

/// A projected bus stop, referring back to its row in the input table.
#[derive(Clone, Debug)]
pub struct StopNode {
    pub row: usize,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(row: usize, location: Point) -> Self {
        Self {
            row,
            point: [location.x(), location.y()],
        }
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================================
// Index
// ============================================================================

/// Nearest-stop lookup over projected bus stops.
pub struct StopIndex {
    tree: RTree<StopNode>,
}

impl StopIndex {
    pub fn new(nodes: Vec<StopNode>) -> Self {
        Self {
            tree: RTree::bulk_load(nodes),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The nearest stop to `point` as `(row, distance in metres)`.
    ///
    /// Equidistant stops resolve to the lowest row so results do not depend
    /// on tree layout.
    pub fn nearest(&self, point: Point) -> Option<(usize, f64)> {
        let query = [point.x(), point.y()];
        let mut candidates = self.tree.nearest_neighbor_iter_with_distance_2(&query);

        let (first, best_d2) = candidates.next()?;
        let row = candidates
            .take_while(|(_, d2)| *d2 <= best_d2)
            .map(|(node, _)| node.row)
            .fold(first.row, usize::min);

        Some((row, best_d2.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = StopIndex::new(Vec::new());
        assert!(index.is_empty());
        assert!(index.nearest(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_nearest_stop() {
        let index = StopIndex::new(vec![
            StopNode::new(0, Point::new(0.0, 0.0)),
            StopNode::new(1, Point::new(300.0, 400.0)),
            StopNode::new(2, Point::new(1000.0, 0.0)),
        ]);

        assert_eq!(index.len(), 3);
        let (row, distance) = index.nearest(Point::new(300.0, 390.0)).unwrap();
        assert_eq!(row, 1);
        assert!((distance - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_equidistant_stops_pick_lowest_row() {
        let index = StopIndex::new(vec![
            StopNode::new(5, Point::new(100.0, 0.0)),
            StopNode::new(2, Point::new(-100.0, 0.0)),
            StopNode::new(9, Point::new(0.0, 100.0)),
        ]);

        let (row, distance) = index.nearest(Point::new(0.0, 0.0)).unwrap();
        assert_eq!(row, 2);
        assert!((distance - 100.0).abs() < 1e-9);
    }
}
