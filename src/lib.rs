//! Parameterized hexahedral and quadrilateral grids for benchmark solid mechanics bodies.
//!
//! Three bodies are provided: a notched bar ([HyperRectangle]), a quarter of a plate with a
//! central hole ([QuarterPlate]) and a notched round bar ([Rod]). Each is built from a
//! [Parameters] set in 2D or 3D, and comes with tagged boundary faces, curved surfaces that
//! survive refinement and the Dirichlet constraints of a load step.
//!
//! ```ignore
//! use fem_bodies::{Body, Dim, Parameters, Rod};
//!
//! let params = Parameters::from_file("./test_input/parameters_rod.json")?;
//! let grid = Rod::default().make_grid(&params, Dim::Three)?;
//! let constraints = Rod::default().make_constraints(&params, Dim::Three, true, 0.1);
//! ```

/// The benchmark bodies
pub mod bodies;
/// Boundary identifiers and face classification
pub mod boundary;
/// Dirichlet constraints on tagged boundaries
pub mod constraints;
pub mod error;
/// Points, axes and dimensions
pub mod geometry;
/// Hanging-node capable mesh of quadrilaterals and hexahedra
pub mod mesh;
/// Notch profiles and vertex displacement
pub mod notch;
/// Body parameters read from JSON
pub mod params;

pub use bodies::{Body, EvalPoint, Grid, HyperRectangle, QuarterPlate, Rod};
pub use boundary::{BoundaryClassifier, CurvedSurface, Tag};
pub use constraints::{BoundaryCondition, DirichletConstraint, NodalConstraints};
pub use error::{GridError, Result};
pub use geometry::{Axis, Dim, Point};
pub use mesh::Mesh;
pub use notch::{NotchProfile, NotchSpecification, NotchSurface, NotchType};
pub use params::{Driver, Parameters, RefineSpecial};
