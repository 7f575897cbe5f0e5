use crate::boundary::Tag;
use crate::geometry::{Axis, Dim};
use crate::mesh::Mesh;

use log::debug;
use std::collections::BTreeMap;

/// Boundary condition selectable for a face of a body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCondition {
    /// free surface
    None,
    /// zero displacement normal to the face
    Symmetry,
    /// zero displacement in every direction
    Fix,
    /// zero x displacement
    X0,
    /// zero x and z displacement
    X0Z0,
    /// zero y displacement
    Y0,
}

/// Prescribed displacement on every node of the faces carrying `tag`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirichletConstraint {
    pub tag: Tag,
    /// constrained component; `None` constrains all components
    pub axis: Option<Axis>,
    pub value: f64,
}

/// Collects the [DirichletConstraint]s of one load step in the order they are declared
#[derive(Clone, Debug)]
pub struct ConstraintList {
    apply_dirichlet_bc: bool,
    constraints: Vec<DirichletConstraint>,
}

impl ConstraintList {
    /// When `apply_dirichlet_bc` is false every prescribed value is replaced by zero,
    /// so that only the homogeneous part of the constraints is kept.
    pub fn new(apply_dirichlet_bc: bool) -> Self {
        Self {
            apply_dirichlet_bc,
            constraints: Vec::new(),
        }
    }

    /// Prescribe one displacement component on the faces tagged `tag`
    pub fn apply(&mut self, tag: Tag, axis: Axis, value: f64) {
        self.push(tag, Some(axis), value);
    }

    /// Clamp the faces tagged `tag`
    pub fn fix(&mut self, tag: Tag) {
        self.push(tag, None, 0.0);
    }

    fn push(&mut self, tag: Tag, axis: Option<Axis>, value: f64) {
        self.constraints.push(DirichletConstraint {
            tag,
            axis,
            value: if self.apply_dirichlet_bc { value } else { 0.0 },
        });
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn into_vec(self) -> Vec<DirichletConstraint> {
        self.constraints
    }
}

/// Constraint values per `(node, component)` pair
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodalConstraints {
    values: BTreeMap<(usize, Axis), f64>,
}

impl NodalConstraints {
    /// Map tag based constraints onto the nodes of a mesh.
    ///
    /// A degree of freedom touched by several constraints keeps the value of the first one.
    pub fn assemble(mesh: &Mesh, constraints: &[DirichletConstraint]) -> Self {
        let mut values = BTreeMap::new();
        let components = mesh.dim().axes();

        for constraint in constraints {
            let axes: &[Axis] = match &constraint.axis {
                Some(axis) if components.contains(axis) => std::slice::from_ref(axis),
                Some(_) => &[],
                None => components,
            };
            for bf in mesh.boundary_faces().filter(|bf| bf.info.tag == constraint.tag) {
                for node in bf.nodes.iter() {
                    for axis in axes {
                        values.entry((*node, *axis)).or_insert(constraint.value);
                    }
                }
            }
        }

        debug!("assembled {} constrained degrees of freedom", values.len());
        Self { values }
    }

    pub fn get(&self, node: usize, axis: Axis) -> Option<f64> {
        self.values.get(&(node, axis)).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Axis, f64)> + '_ {
        self.values.iter().map(|((node, axis), v)| (*node, *axis, *v))
    }
}

/// Components constrained to zero by a [BoundaryCondition] on a face normal to `normal`
pub(crate) fn zero_components(bc: BoundaryCondition, normal: Axis, dim: Dim) -> Vec<Option<Axis>> {
    match bc {
        BoundaryCondition::None => Vec::new(),
        BoundaryCondition::Symmetry => vec![Some(normal)],
        BoundaryCondition::Fix => vec![None],
        BoundaryCondition::X0 => vec![Some(Axis::X)],
        BoundaryCondition::X0Z0 if dim == Dim::Three => vec![Some(Axis::X), Some(Axis::Z)],
        BoundaryCondition::X0Z0 => vec![Some(Axis::X)],
        BoundaryCondition::Y0 => vec![Some(Axis::Y)],
    }
}

impl ConstraintList {
    /// Add the zero constraints implied by a [BoundaryCondition] on the faces tagged `tag`
    pub fn apply_condition(&mut self, tag: Tag, bc: BoundaryCondition, normal: Axis, dim: Dim) {
        for axis in zero_components(bc, normal, dim) {
            match axis {
                Some(axis) => self.apply(tag, axis, 0.0),
                None => self.fix(tag),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryClassifier;
    use crate::geometry::Point;
    use crate::mesh::generators::subdivided_hyper_rectangle;

    fn tagged_square() -> Mesh {
        let mut mesh =
            subdivided_hyper_rectangle(Dim::Two, &[2, 2], Point::origin(), Point::xy(1.0, 1.0))
                .unwrap();
        BoundaryClassifier::box_shaped(Dim::Two, [1.0, 1.0, 0.0])
            .classify_mesh(&mut mesh)
            .unwrap();
        mesh
    }

    #[test]
    fn first_constraint_wins() {
        let mesh = tagged_square();
        let mut list = ConstraintList::new(true);
        list.apply(Tag::MinusX, Axis::X, 0.0);
        list.fix(Tag::MinusY);
        list.apply(Tag::MinusY, Axis::X, 3.0);
        let nodal = NodalConstraints::assemble(&mesh, &list.into_vec());

        // corner at the origin: x from the symmetry plane, y from the clamp
        assert_eq!(nodal.get(0, Axis::X), Some(0.0));
        assert_eq!(nodal.get(0, Axis::Y), Some(0.0));
        // bottom right corner is clamped before the x value is prescribed
        assert_eq!(nodal.get(2, Axis::X), Some(0.0));
        // 3 nodes on x = 0, 3 nodes on y = 0 with both components
        assert_eq!(nodal.len(), 3 + 3 * 2 - 1);
        assert_eq!(nodal.get(4, Axis::X), None);
    }

    #[test]
    fn load_is_zeroed_without_dirichlet_values() {
        let mesh = tagged_square();
        let mut list = ConstraintList::new(false);
        list.apply(Tag::PlusY, Axis::Y, 0.25);
        let nodal = NodalConstraints::assemble(&mesh, &list.into_vec());
        assert_eq!(nodal.len(), 3);
        assert!(nodal.iter().all(|(_, axis, v)| axis == Axis::Y && v == 0.0));

        let mut list = ConstraintList::new(true);
        list.apply(Tag::PlusY, Axis::Y, 0.25);
        let nodal = NodalConstraints::assemble(&mesh, &list.into_vec());
        assert!(nodal.iter().all(|(_, _, v)| v == 0.25));
    }

    #[test]
    fn z_constraints_ignored_in_2d() {
        let mesh = tagged_square();
        let mut list = ConstraintList::new(true);
        list.apply_condition(Tag::PlusX, BoundaryCondition::X0Z0, Axis::X, Dim::Two);
        list.apply(Tag::PlusY, Axis::Z, 0.0);
        let nodal = NodalConstraints::assemble(&mesh, &list.into_vec());
        assert_eq!(nodal.len(), 3);
    }

    #[test]
    fn implied_components() {
        assert_eq!(zero_components(BoundaryCondition::Symmetry, Axis::Y, Dim::Two), vec![Some(Axis::Y)]);
        assert_eq!(
            zero_components(BoundaryCondition::X0Z0, Axis::Y, Dim::Three),
            vec![Some(Axis::X), Some(Axis::Z)]
        );
        assert!(zero_components(BoundaryCondition::None, Axis::X, Dim::Three).is_empty());
    }
}
