use super::{Body, EvalPoint, Grid};
use crate::boundary::{verify_tag_coverage, BoundaryClassifier, Tag};
use crate::constraints::{BoundaryCondition, ConstraintList, DirichletConstraint};
use crate::error::Result;
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::ManifoldId;
use crate::mesh::generators::subdivided_hyper_rectangle;
use crate::mesh::refinement::Refinement;
use crate::mesh::Mesh;
use crate::notch::{
    apply_notches, attach_fillet_manifolds, prepare_for_notching, NotchProfile,
    NotchSpecification, NotchSurface, NotchType,
};
use crate::params::{Driver, Parameters, RefineSpecial};

use log::{info, warn};

const SEARCH_TOLERANCE: f64 = 1e-12;

/// First of the two fillet manifolds of the notch on the x-plus face
pub const NOTCH_RIGHT_MANIFOLD_ID: ManifoldId = 11;
/// First of the two fillet manifolds of the notch on the x-minus face
pub const NOTCH_LEFT_MANIFOLD_ID: ManifoldId = 13;

/// Notches shallower than this are not carved
const MIN_NOTCH_DEPTH: f64 = 1e-20;

/// Half-width multiple of the band refined around the line joining two notches
const DAMAGE_BAND_FACTOR: f64 = 1.75;

/// A bar of `width x height (x thickness)` loaded along y, notched on its right face.
///
/// With `notch_twice` a second notch is cut into the left face, and the two notches sit
/// one `width` apart on either side of mid-height so that the ligament between them is
/// inclined by 45 degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HyperRectangle {
    pub notch_type: NotchType,
    pub notch_twice: bool,
    pub bc_x_minus: BoundaryCondition,
    pub bc_y_minus: BoundaryCondition,
    pub bc_z_minus: BoundaryCondition,
    pub bc_y_plus: BoundaryCondition,
    pub apply_sym_constraint_on_top_face: bool,
    /// keep the loaded face from sliding sideways according to `bc_y_plus`
    pub constrain_sideways_sliding: bool,
}

impl Default for HyperRectangle {
    fn default() -> Self {
        Self {
            notch_type: NotchType::Linear,
            notch_twice: false,
            bc_x_minus: BoundaryCondition::Symmetry,
            bc_y_minus: BoundaryCondition::Symmetry,
            bc_z_minus: BoundaryCondition::Symmetry,
            bc_y_plus: BoundaryCondition::None,
            apply_sym_constraint_on_top_face: false,
            constrain_sideways_sliding: false,
        }
    }
}

impl HyperRectangle {
    fn notch_depth(params: &Parameters) -> f64 {
        (1.0 - params.ratio_x) * params.width
    }

    /// The notch on the x-plus face, followed by the one on the x-minus face for `notch_twice`
    fn notches(&self, params: &Parameters) -> Result<Vec<NotchProfile>> {
        let (width, length) = (params.width, params.height);
        let offset = width;
        let y_right = if self.notch_twice {
            length / 2.0 + offset / 2.0
        } else {
            0.0
        };
        let y_left = length / 2.0 - offset / 2.0;

        let spec = |reference_point: Point, face_normal: Point, boundary_tag: Tag| {
            NotchProfile::new(NotchSpecification {
                notch_type: self.notch_type,
                half_width: params.notch_width / 2.0,
                depth: Self::notch_depth(params),
                reference_point,
                boundary_tag,
                face_normal,
                loading_axis: Axis::Y,
                extent: width,
                surface: NotchSurface::Planar,
            })
        };

        let mut notches = vec![spec(Point::xy(width, y_right), Axis::X.unit(), Tag::PlusX)?];
        if self.notch_twice {
            notches.push(spec(Point::xy(0.0, y_left), -Axis::X.unit(), Tag::MinusX)?);
        }
        Ok(notches)
    }

    /// The notched 2D bar before local refinement
    fn make_grid_flat(&self, params: &Parameters) -> Result<Mesh> {
        let (width, length) = (params.width, params.height);
        let n_x = params.grid_y_repetitions;
        let g = params.global_refinements + 1;

        // roughly square cells, rounding the count along y up
        let ratio = length / width;
        let n_y_homogeneous = n_x * ratio.ceil() as usize;
        let n_y_overhead = n_x * (ratio.ceil() - ratio).ceil() as usize;

        let mut mesh = if params.refine_special == RefineSpecial::CoarseAndFineBrick {
            let length_refined = width.min(0.9 * length);
            let n_y_fine = n_x + n_y_overhead;
            let n_y_coarse = n_y_homogeneous.saturating_sub(n_y_fine);

            let fine = subdivided_hyper_rectangle(
                Dim::Two,
                &[n_x * g, n_y_fine * g],
                Point::origin(),
                Point::xy(width, length_refined),
            )?;
            let coarse = subdivided_hyper_rectangle(
                Dim::Two,
                &[n_x * g, n_y_coarse * g],
                Point::xy(0.0, length_refined),
                Point::xy(width, length),
            )?;
            fine.merge(coarse, 1e-9 * length)?
        } else {
            subdivided_hyper_rectangle(
                Dim::Two,
                &[n_x * g, n_y_homogeneous * g],
                Point::origin(),
                Point::xy(width, length),
            )?
        };

        BoundaryClassifier::box_shaped(Dim::Two, [width, length, 0.0])
            .with_tolerance(SEARCH_TOLERANCE)
            .classify_mesh(&mut mesh)?;
        info!("flat bar with {} cells", mesh.n_cells());

        if Self::notch_depth(params) > MIN_NOTCH_DEPTH {
            let notches = self.notches(params)?;
            if self.notch_type == NotchType::Round {
                for notch in notches.iter() {
                    prepare_for_notching(&mut mesh, notch)?;
                }
            }

            apply_notches(&mut mesh, &notches);

            if self.notch_type == NotchType::Round {
                let ids = [NOTCH_RIGHT_MANIFOLD_ID, NOTCH_LEFT_MANIFOLD_ID];
                for (notch, id) in notches.iter().zip(ids) {
                    attach_fillet_manifolds(&mut mesh, notch, id)?;
                }
            }
        } else {
            warn!("notch depth is zero; the bar is left smooth");
        }

        Ok(mesh)
    }

    /// Refine the damage zone: the ligament between two notches, or the lower end of the bar
    fn refine_damage_zone(&self, mesh: &mut Mesh, params: &Parameters) -> Result<()> {
        let width = params.width;
        let y_left = params.height / 2.0 - width / 2.0;
        let band = DAMAGE_BAND_FACTOR * params.notch_width / 2.0;

        for _ in 0..params.hole_edge_refinements {
            mesh.refine_with_filter(|_, points| {
                let center = Point::centroid(points.iter());
                let in_zone = if self.notch_twice {
                    (center.y - (center.x + y_left)).abs() < band
                } else {
                    center.y < width
                };
                in_zone.then(|| Refinement::Isotropic)
            })?;
        }
        Ok(())
    }
}

impl Body for HyperRectangle {
    fn name(&self) -> &'static str {
        "HyperRectangle"
    }

    fn make_grid(&self, params: &Parameters, dim: Dim) -> Result<Grid> {
        params.validate()?;
        let flat = self.make_grid_flat(params)?;

        let mut mesh = match dim {
            Dim::Two => flat,
            // round notch fillets become cylinders along z
            Dim::Three => flat.extrude(params.elements_in_z, params.thickness)?,
        };

        self.refine_damage_zone(&mut mesh, params)?;
        verify_tag_coverage(&mesh)?;

        info!(
            "{}D bar with {} cells and {} nodes",
            dim.n(),
            mesh.n_cells(),
            mesh.n_nodes()
        );

        let depth = Self::notch_depth(params);
        Ok(Grid {
            mesh,
            eval_points: vec![
                EvalPoint::new(Point::new(params.width - depth, 0.0, 0.0), Axis::X),
                EvalPoint::new(Point::new(params.width, params.height, 0.0), Axis::X),
            ],
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
        constraints.apply_condition(Tag::MinusY, self.bc_y_minus, Axis::Y, dim);
        if dim == Dim::Three {
            constraints.apply_condition(Tag::MinusZ, self.bc_z_minus, Axis::Z, dim);
            if self.apply_sym_constraint_on_top_face {
                constraints.apply(Tag::PlusZ, Axis::Z, 0.0);
            }
        }
        if self.constrain_sideways_sliding {
            constraints.apply_condition(Tag::PlusY, self.bc_y_plus, Axis::Y, dim);
        }

        if params.driver == Driver::Dirichlet {
            constraints.apply(Tag::PlusY, Axis::Y, load_increment);
        }

        constraints.into_vec()
    }
}
