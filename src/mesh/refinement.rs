use crate::geometry::{Axis, Dim};

/// Description of a Cell refinement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refinement {
    /// split along every axis (4 children in 2D, 8 in 3D)
    Isotropic,
    /// anisotropic: split only across the given axis (2 children)
    Cut(Axis),
}

impl Refinement {
    /// Which parametric axes are halved by this refinement
    pub fn splits(&self, dim: Dim) -> [bool; 3] {
        match self {
            Self::Isotropic => [true, true, dim == Dim::Three],
            Self::Cut(axis) => {
                let mut s = [false; 3];
                s[axis.index()] = true;
                s
            }
        }
    }

    pub fn num_children(&self, dim: Dim) -> usize {
        1 << self.splits(dim).iter().filter(|s| **s).count()
    }

    pub(crate) fn is_valid_for(&self, dim: Dim) -> bool {
        match self {
            Self::Isotropic => true,
            Self::Cut(axis) => axis.index() < dim.n(),
        }
    }
}

/// Location of a child cell inside its parent, in half-cell units along each axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChildLoc {
    pub halves: [u8; 3],
}

impl ChildLoc {
    /// All child locations produced by a refinement, in lexicographic order
    pub fn all(refinement: Refinement, dim: Dim) -> Vec<Self> {
        let splits = refinement.splits(dim);
        let range = |a: usize| if splits[a] { 0..2_u8 } else { 0..1_u8 };

        let mut locs = Vec::with_capacity(refinement.num_children(dim));
        for k in range(2) {
            for j in range(1) {
                for i in range(0) {
                    locs.push(Self { halves: [i, j, k] });
                }
            }
        }
        locs
    }

    /// Position of a child's local vertex in the parent's parametric frame.
    ///
    /// Each coordinate is in half units: 0 = parent min, 1 = parent midplane, 2 = parent max
    pub fn vertex_position(&self, vertex: usize, splits: [bool; 3], dim: Dim) -> [u8; 3] {
        let mut t = [0_u8; 3];
        for a in 0..dim.n() {
            let bit = ((vertex >> a) & 1) as u8;
            t[a] = if splits[a] { self.halves[a] + bit } else { 2 * bit };
        }
        t
    }

    /// Whether the child's local face lies on the parent's face with the same index
    pub fn face_on_parent_face(&self, face: usize, splits: [bool; 3]) -> bool {
        let axis = face / 2;
        let side = (face % 2) as u8;
        !splits[axis] || self.halves[axis] == side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_counts() {
        assert_eq!(Refinement::Isotropic.num_children(Dim::Two), 4);
        assert_eq!(Refinement::Isotropic.num_children(Dim::Three), 8);
        assert_eq!(Refinement::Cut(Axis::Y).num_children(Dim::Three), 2);
        assert_eq!(ChildLoc::all(Refinement::Isotropic, Dim::Three).len(), 8);
    }

    #[test]
    fn cut_z_is_invalid_in_2d() {
        assert!(!Refinement::Cut(Axis::Z).is_valid_for(Dim::Two));
        assert!(Refinement::Cut(Axis::Z).is_valid_for(Dim::Three));
    }

    #[test]
    fn child_vertex_positions() {
        let splits = Refinement::Cut(Axis::X).splits(Dim::Two);
        let locs = ChildLoc::all(Refinement::Cut(Axis::X), Dim::Two);
        assert_eq!(locs[1].halves, [1, 0, 0]);
        // right child: x from the midplane to the max side, y over the full parent
        assert_eq!(locs[1].vertex_position(0, splits, Dim::Two), [1, 0, 0]);
        assert_eq!(locs[1].vertex_position(3, splits, Dim::Two), [2, 2, 0]);

        assert!(locs[1].face_on_parent_face(1, splits));
        assert!(!locs[1].face_on_parent_face(0, splits));
        assert!(locs[1].face_on_parent_face(2, splits));
    }
}
