use crate::geometry::Point;

/// A vertex of the Mesh.
/// Groups of 4 (2D) or 8 (3D) nodes describe Cells.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub coords: Point,
}

impl Node {
    pub fn new(id: usize, coords: Point) -> Self {
        Self { id, coords }
    }
}
