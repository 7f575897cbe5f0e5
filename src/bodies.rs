/// Notched bar with rectangular cross-section
pub mod hyper_rectangle;
/// Quarter of a plate with a central hole
pub mod quarter_plate;
/// Notched round bar
pub mod rod;

pub use hyper_rectangle::HyperRectangle;
pub use quarter_plate::QuarterPlate;
pub use rod::Rod;

use crate::constraints::DirichletConstraint;
use crate::error::Result;
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::{face_vertex_indices, Cell};
use crate::mesh::Mesh;
use crate::params::Parameters;

/// A point whose displacement component along `axis` is reported by the driver
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvalPoint {
    pub point: Point,
    pub axis: Axis,
}

impl EvalPoint {
    pub fn new(point: Point, axis: Axis) -> Self {
        Self { point, axis }
    }
}

/// A finished body: the tagged mesh along with its evaluation points
#[derive(Debug, Clone)]
pub struct Grid {
    pub mesh: Mesh,
    pub eval_points: Vec<EvalPoint>,
}

/// A parameterized benchmark body.
///
/// Implementors hold the body specific options; building a grid or a constraint list
/// depends on nothing but these options and the arguments.
pub trait Body {
    fn name(&self) -> &'static str;

    /// Build the tagged mesh of the body
    fn make_grid(&self, params: &Parameters, dim: Dim) -> Result<Grid>;

    /// Dirichlet constraints of one load step.
    ///
    /// The load is only prescribed as a displacement for the Dirichlet driver. With
    /// `apply_dirichlet_bc == false` every prescribed value is zero.
    fn make_constraints(
        &self,
        params: &Parameters,
        dim: Dim,
        apply_dirichlet_bc: bool,
        load_increment: f64,
    ) -> Vec<DirichletConstraint>;
}

/// Whether a boundary face of `cell` has its centroid on the plane `axis == value`
pub(crate) fn has_boundary_face_on_plane(
    cell: &Cell,
    points: &[Point],
    axis: Axis,
    value: f64,
    tol: f64,
) -> bool {
    cell.boundary_faces().any(|(face, _)| {
        let corners = face_vertex_indices(cell.dim(), face);
        let centroid = Point::centroid(corners.iter().map(|v| &points[*v]));
        (centroid[axis] - value).abs() < tol
    })
}
