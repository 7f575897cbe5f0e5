use super::{has_boundary_face_on_plane, Body, EvalPoint, Grid};
use crate::boundary::{verify_tag_coverage, BoundaryClassifier, CurvedSurface, Tag};
use crate::constraints::{BoundaryCondition, ConstraintList, DirichletConstraint};
use crate::error::{GridError, Result};
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::{parametric_axis_along, ManifoldId};
use crate::mesh::generators::{cylinder, subdivided_hyper_rectangle, CYLINDER_MANIFOLD_ID};
use crate::mesh::manifold::Manifold;
use crate::mesh::refinement::Refinement;
use crate::mesh::Mesh;
use crate::notch::{
    apply_notches, attach_fillet_manifolds, NotchProfile, NotchSpecification, NotchSurface,
    NotchType,
};
use crate::params::{Driver, Parameters, RefineSpecial};

use log::{debug, info, warn};
use std::f64::consts::FRAC_PI_2;

const SEARCH_TOLERANCE: f64 = 1e-8;

/// Manifold of the lateral rod surface
pub const SURFACE_MANIFOLD_ID: ManifoldId = 10;

/// Manifolds of the notch fillets (2D round notches only)
pub const NOTCH_MANIFOLD_ID: ManifoldId = 11;

/// Upper bound on the number of axial cell layers in the region away from the notch
const MAX_COARSE_LAYERS: usize = 6;

/// Number of axial cell layers of the eighth cylinder once the coarse cylinder is refined twice
const BASE_LAYERS: usize = 4;

/// Number of localized refinements used by [RefineSpecial::Innermost] ahead of the innermost passes
const INNERMOST_LAYER_CUTS: usize = 4;

/// A round bar of length `width` and radius `hole_radius`, notched at mid length.
///
/// Only one eighth (3D) or the upper half of the axisymmetric cross-section (2D) is
/// meshed; the rod axis is `y`, the notch root lies at `y = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rod {
    pub notch_type: NotchType,
    pub bc_x_minus: BoundaryCondition,
    pub bc_y_plus: BoundaryCondition,
}

impl Default for Rod {
    fn default() -> Self {
        Self {
            notch_type: NotchType::Linear,
            bc_x_minus: BoundaryCondition::X0,
            bc_y_plus: BoundaryCondition::None,
        }
    }
}

/// Dimensions shared by the 2D and 3D meshes
#[derive(Clone, Copy, Debug)]
struct RodGeometry {
    half_length: f64,
    radius: f64,
    half_notch_length: f64,
    notch_radius: f64,
}

impl RodGeometry {
    fn new(params: &Parameters) -> Self {
        Self {
            half_length: params.width / 2.0,
            radius: params.hole_radius,
            half_notch_length: params.notch_width / 2.0,
            notch_radius: params.ratio_x * params.hole_radius,
        }
    }

    fn depth(&self) -> f64 {
        self.radius - self.notch_radius
    }

    fn eval_points(&self) -> Vec<EvalPoint> {
        vec![
            EvalPoint::new(Point::new(self.notch_radius, 0.0, 0.0), Axis::X),
            EvalPoint::new(Point::new(self.radius, self.half_length, 0.0), Axis::X),
        ]
    }
}

impl Rod {
    fn notch(&self, geo: &RodGeometry, dim: Dim) -> Result<NotchProfile> {
        let (boundary_tag, surface) = match dim {
            Dim::Two => (Tag::PlusX, NotchSurface::Planar),
            Dim::Three => (Tag::Surface, NotchSurface::Radial),
        };
        NotchProfile::new(NotchSpecification {
            notch_type: self.notch_type,
            half_width: geo.half_notch_length,
            depth: geo.depth(),
            reference_point: Point::new(geo.radius, 0.0, 0.0),
            boundary_tag,
            face_normal: Axis::X.unit(),
            loading_axis: Axis::Y,
            extent: geo.radius,
            surface,
        })
    }

    /// Half of the axisymmetric cross-section `[0, radius] x [0, half_length]`
    fn make_grid_2d(&self, params: &Parameters) -> Result<Mesh> {
        let geo = RodGeometry::new(params);
        let p1 = Point::origin();
        let p2 = Point::xy(geo.radius, geo.half_length);

        let mut mesh = match params.refine_special {
            RefineSpecial::Standard => {
                if params.hole_edge_refinements == 0 {
                    return Err(GridError::InvalidParameter(
                        "the standard rod mesh needs at least one hole edge refinement".to_string(),
                    ));
                }
                let mut mesh = subdivided_hyper_rectangle(Dim::Two, &[1, 1], p1, p2)?;
                mesh.refine_global(2)?;
                mesh
            }
            RefineSpecial::RodUniform | RefineSpecial::Simo => {
                subdivided_hyper_rectangle(Dim::Two, &[1, 4], p1, p2)?
            }
            RefineSpecial::None => subdivided_hyper_rectangle(Dim::Two, &[4, 1], p1, p2)?,
            RefineSpecial::RodUpsettingTapered => {
                subdivided_hyper_rectangle(Dim::Two, &[10, 15], p1, p2)?
            }
            RefineSpecial::RodAxRatio => subdivided_hyper_rectangle(
                Dim::Two,
                &[
                    params.elements_in_z * params.grid_y_repetitions,
                    params.grid_y_repetitions,
                ],
                p1,
                p2,
            )?,
            other => {
                return Err(GridError::InvalidParameter(format!(
                    "refinement strategy {} is not available for the 2D rod",
                    other
                )))
            }
        };

        BoundaryClassifier::box_shaped(Dim::Two, [geo.radius, geo.half_length, 0.0])
            .with_tolerance(SEARCH_TOLERANCE)
            .classify_mesh(&mut mesh)?;

        match params.refine_special {
            RefineSpecial::Standard => {
                cut_layers_at_notch(&mut mesh, params.hole_edge_refinements)?;
                grade_axial_layers(&mut mesh, &geo, params.hole_edge_refinements);
            }
            RefineSpecial::Simo => {
                for _ in 0..params.hole_edge_refinements {
                    mesh.refine_with_filter(|cell, points| {
                        cell.boundary_faces()
                            .any(|(_, info)| info.tag == Tag::MinusY)
                            .then(|| cut_along(points, Dim::Two, Axis::Y))
                    })?;
                }
            }
            RefineSpecial::RodAxRatio => {
                for _ in 0..params.hole_edge_refinements {
                    mesh.refine_with_filter(|_, points| {
                        (Point::centroid(points.iter()).x > 0.9 * geo.radius)
                            .then(|| Refinement::Isotropic)
                    })?;
                }
            }
            _ => (),
        }

        let notch = self.notch(&geo, Dim::Two)?;
        if notch.spec().depth > 0.0 {
            apply_notches(&mut mesh, &[notch]);
            if self.notch_type == NotchType::Round {
                attach_fillet_manifolds(&mut mesh, &notch, NOTCH_MANIFOLD_ID)?;
            }
        } else {
            warn!("rod notch has zero depth; the rod is left smooth");
        }

        mesh.refine_global(params.global_refinements)?;
        Ok(mesh)
    }

    /// One eighth of the rod: `x, y, z >= 0`
    fn make_grid_3d(&self, params: &Parameters) -> Result<Mesh> {
        let geo = RodGeometry::new(params);

        let (n_layer_cuts, n_innermost) = match params.refine_special {
            RefineSpecial::Innermost => (INNERMOST_LAYER_CUTS, params.hole_edge_refinements),
            _ => (params.hole_edge_refinements, 0),
        };
        if n_layer_cuts == 0 {
            return Err(GridError::InvalidParameter(
                "the 3D rod mesh needs at least one hole edge refinement".to_string(),
            ));
        }

        let mut mesh = cylinder(geo.radius, geo.half_length)?;
        mesh.refine_global(1)?;
        if params.refine_special == RefineSpecial::Uniform {
            mesh.refine_global(params.global_refinements)?;
        }

        // the cylinder axis becomes y
        mesh.rotate(FRAC_PI_2, Axis::Z);
        mesh.remove_cells(|_, points| {
            let center = Point::centroid(points.iter());
            center.x < 0.0 || center.y < 0.0 || center.z < 0.0
        })?;
        info!("eighth cylinder with {} cells", mesh.n_cells());

        let classifier = BoundaryClassifier::box_shaped(Dim::Three, [geo.radius, geo.half_length, geo.radius])
            .without_plane(Tag::PlusX)
            .without_plane(Tag::PlusZ)
            .with_curved_surface(CurvedSurface::cylinder(
                Point::origin(),
                Axis::Y,
                geo.radius,
                Tag::Surface,
            ))
            .with_tolerance(SEARCH_TOLERANCE);
        classifier.classify_mesh(&mut mesh)?;

        mesh.set_manifold(
            SURFACE_MANIFOLD_ID,
            Manifold::cylindrical(Axis::Y.unit(), Point::origin())?,
        );
        classifier.flag_curved_faces(&mut mesh, SURFACE_MANIFOLD_ID)?;
        mesh.clear_manifold_ids(CYLINDER_MANIFOLD_ID);
        mesh.reset_manifold(CYLINDER_MANIFOLD_ID);

        match params.refine_special {
            RefineSpecial::Standard | RefineSpecial::Innermost => {
                mesh.refine_global(1)?;
                cut_layers_at_notch(&mut mesh, n_layer_cuts)?;
                grade_axial_layers(&mut mesh, &geo, n_layer_cuts);
            }
            RefineSpecial::Simo => {
                mesh.refine_global(1)?;
                cut_layers_at_notch(&mut mesh, n_layer_cuts)?;
            }
            RefineSpecial::Uniform => {
                for _ in 0..n_layer_cuts {
                    mesh.refine_with_filter(|_, points| {
                        points
                            .iter()
                            .any(|p| classifier.curved_surface().map_or(false, |s| s.contains(p, SEARCH_TOLERANCE)))
                            .then(|| Refinement::Isotropic)
                    })?;
                }
            }
            _ => (),
        }

        if params.refine_special != RefineSpecial::Uniform {
            mesh.refine_global(params.global_refinements)?;
        }

        for pass in 0..n_innermost {
            mesh.refine_with_filter(|cell, points| {
                if !has_boundary_face_on_plane(cell, points, Axis::Y, 0.0, SEARCH_TOLERANCE) {
                    None
                } else if pass == 0 || pass == 2 {
                    Some(Refinement::Isotropic)
                } else {
                    Some(cut_along(points, Dim::Three, Axis::Y))
                }
            })?;
        }

        if (params.ratio_x - 1.0).abs() > 1e-10 {
            let notch = self.notch(&geo, Dim::Three)?;
            apply_notches(&mut mesh, &[notch]);
        } else {
            warn!("rod notch has zero depth; the rod is left smooth");
        }

        Ok(mesh)
    }
}

impl Body for Rod {
    fn name(&self) -> &'static str {
        "Rod"
    }

    fn make_grid(&self, params: &Parameters, dim: Dim) -> Result<Grid> {
        params.validate()?;
        let mesh = match dim {
            Dim::Two => self.make_grid_2d(params)?,
            Dim::Three => self.make_grid_3d(params)?,
        };
        verify_tag_coverage(&mesh)?;

        info!(
            "{} rod mesh with {} cells and {} nodes",
            params.refine_special,
            mesh.n_cells(),
            mesh.n_nodes()
        );

        Ok(Grid {
            mesh,
            eval_points: RodGeometry::new(params).eval_points(),
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
        constraints.apply(Tag::MinusY, Axis::Y, 0.0);
        if dim == Dim::Three {
            constraints.apply(Tag::MinusZ, Axis::Z, 0.0);
        }
        constraints.apply_condition(Tag::PlusY, self.bc_y_plus, Axis::Y, dim);

        if params.driver == Driver::Dirichlet {
            constraints.apply(Tag::PlusY, Axis::Y, load_increment);
        }

        constraints.into_vec()
    }
}

/// Anisotropic refinement of a cell across the real-space `axis`
fn cut_along(points: &[Point], dim: Dim, axis: Axis) -> Refinement {
    Refinement::Cut(parametric_axis_along(points, dim, axis))
}

/// Halve the cell layer touching the notch plane `y = 0` `n` times
fn cut_layers_at_notch(mesh: &mut Mesh, n: usize) -> Result<()> {
    let dim = mesh.dim();
    for _ in 0..n {
        mesh.refine_with_filter(|cell, points| {
            has_boundary_face_on_plane(cell, points, Axis::Y, 0.0, SEARCH_TOLERANCE)
                .then(|| cut_along(points, dim, Axis::Y))
        })?;
    }
    Ok(())
}

/// Redistribute the axial vertex layers left behind by [cut_layers_at_notch].
///
/// Before grading the layers sit at `L * 3/4, L/2, L/4` and then at `L/2^i` down to
/// `L/2^(n_cuts + 2)`. Afterwards the coarse layers are spread uniformly over
/// `[half_notch_length, L]` and the fine layers uniformly over `[0, half_notch_length]`.
/// Returns the height of the innermost layer.
fn grade_axial_layers(mesh: &mut Mesh, geo: &RodGeometry, n_cuts: usize) -> f64 {
    let l = geo.half_length;
    let h = geo.half_notch_length;

    let n_layers = BASE_LAYERS + n_cuts;
    let mut n_coarse = ((n_layers + 1) / 2).min(MAX_COARSE_LAYERS);
    let n_fine = n_layers - n_coarse;

    let coarse_position = |j: usize, n_coarse: usize| {
        (n_coarse - j) as f64 / n_coarse as f64 * (l - h) + h
    };

    for i in 1..=3 {
        let from = l * (4 - i) as f64 / 4.0;
        mesh.shift_vertex_layer(Axis::Y, from, coarse_position(i, n_coarse), SEARCH_TOLERANCE);
    }

    // more than four coarse layers take over some of the halved layers
    if n_coarse > 4 {
        for i in 3..=n_coarse - 2 {
            let from = l / 2f64.powi(i as i32);
            mesh.shift_vertex_layer(Axis::Y, from, coarse_position(i + 1, n_coarse), SEARCH_TOLERANCE);
        }
    }

    if n_cuts <= 2 {
        n_coarse = 4;
    }

    let mut innermost = h;
    for i in n_coarse - 1..=n_cuts + 2 {
        let from = l / 2f64.powi(i as i32);
        innermost = (n_layers - 1 - i) as f64 / n_fine as f64 * h;
        mesh.shift_vertex_layer(Axis::Y, from, innermost, SEARCH_TOLERANCE);
    }

    debug!(
        "graded {} axial layers ({} coarse, {} fine); innermost layer at {}",
        n_layers, n_coarse, n_fine, innermost
    );
    innermost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::NodalConstraints;

    fn rod_params(refine_special: RefineSpecial, hole_edge_refinements: usize) -> Parameters {
        Parameters {
            width: 20.0,
            hole_radius: 1.0,
            notch_width: 2.0,
            ratio_x: 0.9,
            global_refinements: 0,
            hole_edge_refinements,
            refine_special,
            ..Parameters::default()
        }
    }

    fn distinct_sorted(mut values: Vec<f64>) -> Vec<f64> {
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        values
    }

    #[test]
    fn graded_layers_2d() {
        let params = Parameters::from_file("./test_input/parameters_rod.json").unwrap();
        assert_eq!(params.refine_special, RefineSpecial::Standard);
        assert_eq!(params.hole_edge_refinements, 2);

        let grid = Rod::default().make_grid(&params, Dim::Two).unwrap();
        let mesh = &grid.mesh;
        assert_eq!(mesh.n_cells(), 24);

        let layers = distinct_sorted(mesh.nodes.iter().map(|n| n.coords.y).collect());
        let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 4.0, 7.0, 10.0];
        assert_eq!(layers.len(), expected.len());
        for (y, e) in layers.iter().zip(expected.iter()) {
            assert!((y - e).abs() < 1e-12, "layer at {} instead of {}", y, e);
        }
    }

    #[test]
    fn graded_layers_with_more_cuts() {
        let grid = Rod::default()
            .make_grid(&rod_params(RefineSpecial::Standard, 5), Dim::Two)
            .unwrap();
        let layers = distinct_sorted(grid.mesh.nodes.iter().map(|n| n.coords.y).collect());
        // 5 coarse layers above the notch and 4 fine layers inside
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0, 2.8, 4.6, 6.4, 8.2, 10.0];
        assert_eq!(layers.len(), expected.len());
        for (y, e) in layers.iter().zip(expected.iter()) {
            assert!((y - e).abs() < 1e-12, "layer at {} instead of {}", y, e);
        }
    }

    #[test]
    fn notch_root_2d() {
        let params = rod_params(RefineSpecial::Standard, 1);
        let grid = Rod::default().make_grid(&params, Dim::Two).unwrap();

        let root = grid.eval_points[0].point;
        assert!((root.x - 0.9).abs() < 1e-12);
        assert!(grid.mesh.nodes.iter().any(|n| n.coords.approx_eq(&root, 1e-12)));
        // no vertex lies outside the notched contour at the root
        assert!(grid
            .mesh
            .nodes
            .iter()
            .filter(|n| n.coords.y.abs() < 1e-12)
            .all(|n| n.coords.x <= 0.9 + 1e-12));
        assert!(grid.eval_points[1].point.approx_eq(&Point::xy(1.0, 10.0), 1e-14));
    }

    #[test]
    fn rod_strategies_2d() {
        for (strategy, cells) in [
            (RefineSpecial::RodUniform, 4),
            (RefineSpecial::None, 4),
            (RefineSpecial::RodUpsettingTapered, 150),
            (RefineSpecial::Simo, 6),
        ] {
            let grid = Rod::default().make_grid(&rod_params(strategy, 2), Dim::Two).unwrap();
            assert_eq!(grid.mesh.n_cells(), cells, "{}", strategy);
        }
        assert!(matches!(
            Rod::default().make_grid(&rod_params(RefineSpecial::CoarseAndFineBrick, 2), Dim::Two),
            Err(GridError::InvalidParameter(_))
        ));
        assert!(matches!(
            Rod::default().make_grid(&rod_params(RefineSpecial::Standard, 0), Dim::Two),
            Err(GridError::InvalidParameter(_))
        ));
    }

    #[test]
    fn eighth_cylinder_3d() {
        let grid = Rod::default()
            .make_grid(&rod_params(RefineSpecial::Standard, 1), Dim::Three)
            .unwrap();
        let mesh = &grid.mesh;
        assert_eq!(mesh.n_cells(), 100);
        assert!(mesh.nodes.iter().all(|n| n.coords.x > -1e-9 && n.coords.y > -1e-9 && n.coords.z > -1e-9));

        // every rim vertex at the notch root was pulled in to the notch radius
        let root_ring: Vec<f64> = mesh
            .nodes
            .iter()
            .filter(|n| n.coords.y.abs() < 1e-12)
            .map(|n| n.coords.reject_from(&Axis::Y.unit()).norm())
            .collect();
        assert!(root_ring.iter().all(|r| *r <= 0.9 + 1e-9));
        assert!(mesh.nodes.iter().any(|n| n.coords.approx_eq(&grid.eval_points[0].point, 1e-9)));

        for tag in [Tag::MinusX, Tag::MinusY, Tag::MinusZ, Tag::PlusY, Tag::Surface] {
            assert!(mesh.boundary_faces().any(|bf| bf.info.tag == tag), "no {} faces", tag);
        }
    }

    #[test]
    fn surface_stays_round_after_refinement() {
        let params = Parameters {
            ratio_x: 1.0,
            global_refinements: 1,
            ..rod_params(RefineSpecial::Simo, 1)
        };
        let grid = Rod::default().make_grid(&params, Dim::Three).unwrap();
        let mesh = &grid.mesh;
        for bf in mesh.boundary_faces().filter(|bf| bf.info.tag == Tag::Surface) {
            for n in bf.nodes.iter() {
                let r = mesh.nodes[*n].coords.reject_from(&Axis::Y.unit()).norm();
                assert!((r - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn innermost_needs_no_hole_edge_refinement() {
        let grid = Rod::default()
            .make_grid(&rod_params(RefineSpecial::Innermost, 0), Dim::Three)
            .unwrap();
        assert!(verify_tag_coverage(&grid.mesh).is_ok());
        assert!(matches!(
            Rod::default().make_grid(&rod_params(RefineSpecial::Standard, 0), Dim::Three),
            Err(GridError::InvalidParameter(_))
        ));
    }

    #[test]
    fn rod_constraints() {
        let params = rod_params(RefineSpecial::Standard, 1);
        let rod = Rod {
            bc_y_plus: BoundaryCondition::X0Z0,
            ..Rod::default()
        };
        let constraints = rod.make_constraints(&params, Dim::Three, true, 0.5);
        assert_eq!(
            constraints.last().copied(),
            Some(DirichletConstraint {
                tag: Tag::PlusY,
                axis: Some(Axis::Y),
                value: 0.5
            })
        );
        assert_eq!(constraints.iter().filter(|c| c.tag == Tag::PlusY).count(), 3);

        let neumann = Parameters {
            driver: Driver::Neumann,
            ..params.clone()
        };
        let constraints = Rod::default().make_constraints(&neumann, Dim::Two, true, 0.5);
        assert!(constraints.iter().all(|c| c.value == 0.0));
        assert_eq!(constraints.len(), 2);

        let grid = Rod::default().make_grid(&params, Dim::Two).unwrap();
        let nodal = NodalConstraints::assemble(
            &grid.mesh,
            &Rod::default().make_constraints(&params, Dim::Two, true, 0.5),
        );
        let top = grid
            .mesh
            .nodes
            .iter()
            .find(|n| (n.coords.y - 10.0).abs() < 1e-12)
            .unwrap();
        assert_eq!(nodal.get(top.id, Axis::Y), Some(0.5));
    }
}
