use crate::boundary::Tag;
use crate::geometry::{Axis, Dim, Point};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Identifier of a [Manifold](super::manifold::Manifold) registered on a Mesh
pub type ManifoldId = usize;

/// Boundary record of one cell face. Only faces on the boundary of the mesh carry one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceInfo {
    pub tag: Tag,
    /// new vertices on this face are projected onto this manifold during refinement
    pub manifold: Option<ManifoldId>,
}

impl FaceInfo {
    pub const fn tagged(tag: Tag) -> Self {
        Self {
            tag,
            manifold: None,
        }
    }
}

impl Default for FaceInfo {
    fn default() -> Self {
        Self::tagged(Tag::Unclassified)
    }
}

/// A quadrilateral (2D) or hexahedral (3D) cell.
///
/// Vertices are numbered lexicographically in the cell's parametric frame:
/// ```text
///  2D:                    3D (k = 0 / k = 1):
///     2-------3              2-------3      6-------7
///     |       |              |       |      |       |
///     |       |              |       |      |       |
///     0-------1              0-------1      4-------5
/// ```
/// so that vertex `v` sits at parametric corner `(v & 1, (v >> 1) & 1, (v >> 2) & 1)`.
///
/// Faces are numbered `2 * axis + side`: 0 = u-min, 1 = u-max, 2 = v-min, 3 = v-max, 4 = w-min, 5 = w-max.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    pub nodes: SmallVec<[usize; 8]>,
    pub boundary: SmallVec<[Option<FaceInfo>; 6]>,
    pub level: u8,
    pub material_id: usize,
}

impl Cell {
    pub fn new(id: usize, nodes: SmallVec<[usize; 8]>, dim: Dim) -> Self {
        Self {
            id,
            nodes,
            boundary: SmallVec::from_elem(None, dim.faces_per_cell()),
            level: 0,
            material_id: 0,
        }
    }

    pub fn dim(&self) -> Dim {
        if self.nodes.len() == 8 {
            Dim::Three
        } else {
            Dim::Two
        }
    }

    /// Node ids of a local face in lexicographic order
    pub fn face_nodes(&self, face: usize) -> SmallVec<[usize; 4]> {
        face_vertex_indices(self.dim(), face)
            .into_iter()
            .map(|v| self.nodes[v])
            .collect()
    }

    pub fn is_at_boundary(&self) -> bool {
        self.boundary.iter().any(|f| f.is_some())
    }

    /// Indices of the local faces that lie on the boundary, along with their records
    pub fn boundary_faces(&self) -> impl Iterator<Item = (usize, &FaceInfo)> + '_ {
        self.boundary
            .iter()
            .enumerate()
            .filter_map(|(f, info)| info.as_ref().map(|info| (f, info)))
    }

    pub fn has_node(&self, node_id: usize) -> bool {
        self.nodes.contains(&node_id)
    }
}

/// Parametric axis normal to a local face
pub fn face_axis(face: usize) -> Axis {
    match face / 2 {
        0 => Axis::X,
        1 => Axis::Y,
        _ => Axis::Z,
    }
}

/// Local vertex indices of a face, in lexicographic order
pub fn face_vertex_indices(dim: Dim, face: usize) -> SmallVec<[usize; 4]> {
    let axis = face / 2;
    let side = face % 2;
    (0..dim.vertices_per_cell())
        .filter(|v| (v >> axis) & 1 == side)
        .collect()
}

/// Sorted node ids; identifies a face (or any sub-entity) independently of the cell that sees it
pub fn entity_key(nodes: &[usize]) -> SmallVec<[usize; 8]> {
    let mut key: SmallVec<[usize; 8]> = nodes.iter().copied().collect();
    key.sort_unstable();
    key
}

/// Parametric axis of a cell whose edges run most closely along a real-space axis.
///
/// `points` are the cell's vertex coordinates in lexicographic order. Needed after
/// rotations, where a cell's `u`, `v`, `w` directions no longer match `x`, `y`, `z`.
pub fn parametric_axis_along(points: &[Point], dim: Dim, axis: Axis) -> Axis {
    let alignment = |a: &Axis| {
        let edge = points[1 << a.index()] - points[0];
        let len = edge.norm();
        if len > 0.0 {
            edge[axis].abs() / len
        } else {
            0.0
        }
    };

    dim.axes()
        .iter()
        .copied()
        .max_by(|a, b| alignment(a).partial_cmp(&alignment(b)).unwrap_or(Ordering::Equal))
        .unwrap_or(axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn quad_face_vertices() {
        assert_eq!(face_vertex_indices(Dim::Two, 0).as_slice(), &[0, 2]);
        assert_eq!(face_vertex_indices(Dim::Two, 1).as_slice(), &[1, 3]);
        assert_eq!(face_vertex_indices(Dim::Two, 2).as_slice(), &[0, 1]);
        assert_eq!(face_vertex_indices(Dim::Two, 3).as_slice(), &[2, 3]);
    }

    #[test]
    fn hex_face_vertices() {
        assert_eq!(face_vertex_indices(Dim::Three, 0).as_slice(), &[0, 2, 4, 6]);
        assert_eq!(face_vertex_indices(Dim::Three, 3).as_slice(), &[2, 3, 6, 7]);
        assert_eq!(face_vertex_indices(Dim::Three, 5).as_slice(), &[4, 5, 6, 7]);
        assert_eq!(face_axis(4), Axis::Z);
    }

    #[test]
    fn face_nodes_and_keys() {
        let cell = Cell::new(0, smallvec![7, 3, 9, 1], Dim::Two);
        assert_eq!(cell.face_nodes(1).as_slice(), &[3, 1]);
        assert_eq!(entity_key(&cell.face_nodes(1)).as_slice(), &[1, 3]);
        assert!(!cell.is_at_boundary());
        assert_eq!(cell.boundary.len(), 4);
    }

    #[test]
    fn aligned_axis_of_rotated_cell() {
        // hexahedron whose parametric w direction points along real y
        let points: Vec<Point> = (0..8)
            .map(|v| Point::new(-((v >> 1) & 1) as f64, 2.0 * ((v >> 2) & 1) as f64, (v & 1) as f64))
            .collect();
        assert_eq!(parametric_axis_along(&points, Dim::Three, Axis::Y), Axis::Z);
        assert_eq!(parametric_axis_along(&points, Dim::Three, Axis::Z), Axis::X);
        assert_eq!(parametric_axis_along(&points, Dim::Three, Axis::X), Axis::Y);
    }
}
