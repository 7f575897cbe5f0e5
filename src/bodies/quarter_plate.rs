use super::{Body, EvalPoint, Grid};
use crate::boundary::{verify_tag_coverage, BoundaryClassifier, CurvedSurface, Tag};
use crate::constraints::{BoundaryCondition, ConstraintList, DirichletConstraint};
use crate::error::Result;
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::{parametric_axis_along, ManifoldId};
use crate::mesh::generators::{hyper_cube_with_cylindrical_hole, hyper_rectangle_with_steps};
use crate::mesh::manifold::Manifold;
use crate::mesh::refinement::Refinement;
use crate::mesh::Mesh;
use crate::params::{Driver, Parameters, RefineSpecial};

use log::{debug, info};

const SEARCH_TOLERANCE: f64 = 1e-12;

/// Manifold of the hole edge
pub const HOLE_MANIFOLD_ID: ManifoldId = 10;

/// Material id of the cell at the bottom of the hole edge, where the stress peaks
pub const TRACKED_CORNER_MATERIAL_ID: usize = 1;

/// Fraction of the plate width refined in the 2D ligament above the symmetry plane
const LIGAMENT_BAND_2D: f64 = 0.3;

/// Fraction of the plate width refined in the 3D ligament above the symmetry plane
const LIGAMENT_BAND_3D: f64 = 1.0 / 3.0;

/// Global refinement level above which the tracked corner needs no extra passes
const TRACKED_CORNER_LEVEL: usize = 5;

/// One quarter of a square plate with a central circular hole, loaded along y.
///
/// The quarter spans `[0, width]^2` (in 3D `[0, width]^2 x [0, thickness / 2]`) and the
/// hole of radius `hole_radius` is centered at the origin. `ratio_x` is the fraction of the
/// plate (measured from the hole edge) covered by the block of cells built around the hole.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuarterPlate {
    pub bc_x_minus: BoundaryCondition,
    pub bc_x_plus: BoundaryCondition,
    pub apply_sym_constraint_on_top_face: bool,
}

impl Default for QuarterPlate {
    fn default() -> Self {
        Self {
            bc_x_minus: BoundaryCondition::Symmetry,
            bc_x_plus: BoundaryCondition::None,
            apply_sym_constraint_on_top_face: false,
        }
    }
}

/// Cell sizes covering `[0, half_extent]`: the hole block first, then roughly square cells
fn plate_steps(internal_half_width: f64, half_extent: f64) -> Vec<f64> {
    let remaining = half_extent - internal_half_width;
    let n_subs = ((remaining / internal_half_width).ceil() as usize).max(1);
    std::iter::once(internal_half_width)
        .chain(std::iter::repeat(remaining / n_subs as f64).take(n_subs))
        .collect()
}

impl QuarterPlate {
    /// The quarter plate with the hole manifold attached, globally refined
    fn make_plate_with_hole(params: &Parameters) -> Result<Mesh> {
        let half_width = params.width;
        let radius = params.hole_radius;
        let fraction = params.ratio_x;
        let internal_half_width = radius + fraction * (half_width - radius);

        let mut hole_block = hyper_cube_with_cylindrical_hole(radius, internal_half_width)?;
        hole_block.remove_cells(|_, points| {
            let center = Point::centroid(points.iter());
            center.x < 0.0 || center.y < 0.0
        })?;

        let mut mesh = if (fraction - 1.0).abs() < SEARCH_TOLERANCE {
            hole_block
        } else {
            let steps = plate_steps(internal_half_width, half_width);
            let mut plate =
                hyper_rectangle_with_steps(Dim::Two, &[steps.clone(), steps], Point::origin())?;
            plate.remove_cells(|_, points| {
                let center = Point::centroid(points.iter());
                center.x < internal_half_width && center.y < internal_half_width
            })?;
            hole_block.merge(plate, 1e-9 * half_width)?
        };

        let hole = CurvedSurface::hole(Point::origin(), radius);
        let flagged = BoundaryClassifier::box_shaped(Dim::Two, [half_width, half_width, 0.0])
            .with_curved_surface(hole)
            .with_tolerance(SEARCH_TOLERANCE)
            .flag_curved_faces(&mut mesh, HOLE_MANIFOLD_ID)?;
        mesh.set_manifold(HOLE_MANIFOLD_ID, Manifold::spherical(Point::origin()));
        debug!("{} faces follow the hole edge", flagged);

        if params.stepwise_global_refinement {
            mesh.refine_global(1)?;
        } else {
            mesh.refine_global(params.global_refinements)?;
        }

        info!("quarter plate with {} cells", mesh.n_cells());
        Ok(mesh)
    }

    /// Mark the cell on the symmetry plane `y = 0` touching the hole edge
    fn track_corner(mesh: &mut Mesh, corner: Point) {
        let tracked: Vec<usize> = mesh
            .cells
            .iter()
            .filter(|cell| {
                cell.boundary_faces().any(|(_, info)| info.tag == Tag::MinusY)
                    && cell
                        .nodes
                        .iter()
                        .any(|n| mesh.nodes[*n].coords.approx_eq(&corner, SEARCH_TOLERANCE))
            })
            .map(|cell| cell.id)
            .collect();

        for cell in mesh.cells.iter_mut() {
            cell.material_id = if tracked.contains(&cell.id) {
                TRACKED_CORNER_MATERIAL_ID
            } else {
                0
            };
        }
    }

    fn make_grid_2d(params: &Parameters) -> Result<Mesh> {
        let half_width = params.width;
        let mut mesh = Self::make_plate_with_hole(params)?;

        BoundaryClassifier::box_shaped(Dim::Two, [half_width, half_width, 0.0])
            .with_curved_surface(CurvedSurface::hole(Point::origin(), params.hole_radius))
            .with_tolerance(SEARCH_TOLERANCE)
            .classify_mesh(&mut mesh)?;
        Self::track_corner(&mut mesh, Point::xy(params.hole_radius, 0.0));

        if params.hole_edge_refinements > 0 {
            let band = LIGAMENT_BAND_2D * half_width;
            mesh.refine_with_filter(|_, points| {
                points.iter().any(|p| p.y < band).then(|| Refinement::Isotropic)
            })?;
            for _ in 1..params.hole_edge_refinements {
                // cut across the cell direction closest to real-space x, not reference axis 0
                mesh.refine_with_filter(|_, points| {
                    (Point::centroid(points.iter()).y < band)
                        .then(|| Refinement::Cut(parametric_axis_along(points, Dim::Two, Axis::X)))
                })?;
            }
        }

        Ok(mesh)
    }

    fn make_grid_3d(params: &Parameters) -> Result<Mesh> {
        let half_width = params.width;
        let half_thickness = params.thickness / 2.0;
        let radius = params.hole_radius;

        // the hole manifold becomes a cylinder along z
        let mut mesh = Self::make_plate_with_hole(params)?.extrude(params.elements_in_z, half_thickness)?;

        BoundaryClassifier::box_shaped(Dim::Three, [half_width, half_width, half_thickness])
            .with_curved_surface(CurvedSurface::cylinder(
                Point::origin(),
                Axis::Z,
                radius,
                Tag::HoleEdge,
            ))
            .with_tolerance(SEARCH_TOLERANCE)
            .classify_mesh(&mut mesh)?;
        Self::track_corner(&mut mesh, Point::new(radius, 0.0, 0.0));

        let band = LIGAMENT_BAND_3D * half_width;
        for _ in 0..params.hole_edge_refinements {
            mesh.refine_with_filter(|_, points| {
                (Point::centroid(points.iter()).y < band).then(|| Refinement::Isotropic)
            })?;
        }

        if params.refine_special == RefineSpecial::TrackedCorner {
            let corner = Point::xy(radius, 0.0);
            let passes = TRACKED_CORNER_LEVEL.saturating_sub(params.global_refinements);
            for _ in 0..passes {
                mesh.refine_with_filter(|_, points| {
                    points
                        .iter()
                        .any(|p| Point::xy(p.x, p.y).approx_eq(&corner, SEARCH_TOLERANCE))
                        .then(|| Refinement::Isotropic)
                })?;
            }
        }

        Ok(mesh)
    }
}

impl Body for QuarterPlate {
    fn name(&self) -> &'static str {
        "QuarterPlate"
    }

    fn make_grid(&self, params: &Parameters, dim: Dim) -> Result<Grid> {
        params.validate()?;
        let (mesh, corner) = match dim {
            Dim::Two => (
                Self::make_grid_2d(params)?,
                Point::xy(params.width, params.width),
            ),
            Dim::Three => (
                Self::make_grid_3d(params)?,
                Point::new(params.width, params.width, params.thickness / 2.0),
            ),
        };
        verify_tag_coverage(&mesh)?;

        info!(
            "{}D quarter plate with {} cells and {} nodes",
            dim.n(),
            mesh.n_cells(),
            mesh.n_nodes()
        );

        Ok(Grid {
            mesh,
            eval_points: vec![EvalPoint::new(corner, Axis::X)],
        })
    }

    fn make_constraints(
        &self,
        params: &Parameters,
        dim: Dim,
        apply_dirichlet_bc: bool,
        load_increment: f64,
    ) -> Vec<DirichletConstraint> {
        let mut constraints = ConstraintList::new(apply_dirichlet_bc);

        constraints.apply_condition(Tag::MinusX, self.bc_x_minus, Axis::X, dim);
        constraints.apply_condition(Tag::PlusX, self.bc_x_plus, Axis::X, dim);
        constraints.apply(Tag::MinusY, Axis::Y, 0.0);
        if dim == Dim::Three {
            constraints.apply(Tag::MinusZ, Axis::Z, 0.0);
            if self.apply_sym_constraint_on_top_face {
                constraints.apply(Tag::PlusZ, Axis::Z, 0.0);
            }
        }

        if params.driver == Driver::Dirichlet {
            constraints.apply(Tag::PlusY, Axis::Y, load_increment);
        }

        constraints.into_vec()
    }
}
