use crate::boundary::Tag;
use crate::error::{GridError, Result};
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::ManifoldId;
use crate::mesh::manifold::Manifold;
use crate::mesh::refinement::Refinement;
use crate::mesh::Mesh;

use log::{debug, warn};
use smallvec::SmallVec;

/// Slack used when deciding whether a vertex lies inside a notch band
const BAND_TOLERANCE: f64 = 1e-10;

/// Tolerance on the length of a notch's face normal
const UNIT_NORMAL_TOLERANCE: f64 = 1e-9;

/// Shape of the notch contour along the loading axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotchType {
    /// V-shaped: depth decreases linearly to zero at the band edge
    Linear,
    /// circular fillet meeting the undisturbed surface tangentially at the band edge
    Round,
}

/// How the notched surface is oriented
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotchSurface {
    /// a flat face with a fixed outward normal
    Planar,
    /// the lateral surface of a body of revolution around an axis parallel to the loading axis.
    /// The face normal is the outward radial direction at the reference point.
    Radial,
}

/// Geometric description of a notch carved into a body
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NotchSpecification {
    pub notch_type: NotchType,
    /// half the axial length of the notch band
    pub half_width: f64,
    pub depth: f64,
    /// point on the undisturbed notched surface at the notch's symmetry plane
    pub reference_point: Point,
    /// tag of the boundary faces the notch is cut into
    pub boundary_tag: Tag,
    /// outward unit normal of the notched surface at the reference point
    pub face_normal: Point,
    pub loading_axis: Axis,
    /// body width (or radius) behind the notched surface; displacements fade out over this distance
    pub extent: f64,
    pub surface: NotchSurface,
}

/// A validated [NotchSpecification] along with its derived geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NotchProfile {
    spec: NotchSpecification,
    fillet_radius: Option<f64>,
}

impl NotchProfile {
    pub fn new(spec: NotchSpecification) -> Result<Self> {
        let invalid = |msg: String| Err(GridError::InvalidNotchGeometry(msg));

        if !(spec.half_width > 0.0) || !spec.half_width.is_finite() {
            return invalid(format!("half width must be positive; got {}", spec.half_width));
        }
        if !(spec.depth >= 0.0) || !spec.depth.is_finite() {
            return invalid(format!("depth must not be negative; got {}", spec.depth));
        }
        if !(spec.extent > 0.0) || !spec.extent.is_finite() {
            return invalid(format!("extent must be positive; got {}", spec.extent));
        }
        if spec.depth > spec.extent {
            return invalid(format!(
                "depth {} exceeds the body extent {}",
                spec.depth, spec.extent
            ));
        }
        if (spec.face_normal.norm() - 1.0).abs() > UNIT_NORMAL_TOLERANCE {
            return invalid(format!("face normal {} is not a unit vector", spec.face_normal));
        }
        if spec.face_normal[spec.loading_axis].abs() > UNIT_NORMAL_TOLERANCE {
            return invalid(format!(
                "face normal {} is not perpendicular to the {} loading axis",
                spec.face_normal, spec.loading_axis
            ));
        }

        let fillet_radius = match spec.notch_type {
            NotchType::Linear => None,
            NotchType::Round if spec.depth > spec.half_width => {
                return invalid(format!(
                    "round notch depth {} exceeds its half width {}",
                    spec.depth, spec.half_width
                ))
            }
            NotchType::Round if spec.depth == 0.0 => None,
            NotchType::Round => Some(
                (spec.half_width * spec.half_width + spec.depth * spec.depth) / (2.0 * spec.depth),
            ),
        };

        Ok(Self {
            spec,
            fillet_radius,
        })
    }

    pub fn spec(&self) -> &NotchSpecification {
        &self.spec
    }

    /// Radius of the circular fillet (round notches of non-zero depth only)
    pub fn fillet_radius(&self) -> Option<f64> {
        self.fillet_radius
    }

    /// Inward displacement of the notched surface at axial distance `s` from the reference point
    pub fn offset(&self, s: f64) -> f64 {
        let s = s.abs();
        let NotchSpecification {
            half_width, depth, ..
        } = self.spec;

        if s > half_width {
            return 0.0;
        }

        match (self.spec.notch_type, self.fillet_radius) {
            (NotchType::Linear, _) => (depth * (1.0 - s / half_width)).clamp(0.0, depth),
            (NotchType::Round, Some(r)) => {
                // distance from the tangent point at the band edge
                let u = half_width - s;
                (r - (r * r - u * u).max(0.0).sqrt()).clamp(0.0, depth)
            }
            (NotchType::Round, None) => 0.0,
        }
    }

    /// Signed distance of a point from the notch's symmetry plane, along the loading axis
    pub fn axial_distance(&self, p: &Point) -> f64 {
        p[self.spec.loading_axis] - self.spec.reference_point[self.spec.loading_axis]
    }

    /// Point on the axis of a [NotchSurface::Radial] notch
    fn axis_point(&self) -> Point {
        self.spec.reference_point - self.spec.face_normal * self.spec.extent
    }

    /// Outward direction of the notched surface seen from `p` and the signed
    /// height of `p` above the undisturbed surface
    fn outward_frame(&self, p: &Point) -> Option<(Point, f64)> {
        match self.spec.surface {
            NotchSurface::Planar => {
                let n = self.spec.face_normal;
                Some((n, (*p - self.spec.reference_point).dot(&n)))
            }
            NotchSurface::Radial => {
                let radial = (*p - self.axis_point()).reject_from(&self.spec.loading_axis.unit());
                let rho = radial.norm();
                if rho < f64::EPSILON * self.spec.extent {
                    None
                } else {
                    Some((radial / rho, rho - self.spec.extent))
                }
            }
        }
    }

    /// Whether a vertex lies in the notch band: within `half_width` of the symmetry plane
    /// along the loading axis, and behind the notched surface within `extent`
    pub fn in_band(&self, p: &Point) -> bool {
        let tol = BAND_TOLERANCE * self.spec.extent;
        if self.axial_distance(p).abs() > self.spec.half_width + tol {
            return false;
        }
        match self.outward_frame(p) {
            Some((_, height)) => height <= tol && height >= -self.spec.extent - tol,
            None => self.spec.surface == NotchSurface::Radial,
        }
    }

    /// Displacement that carves the notch at vertex `p`, if `p` lies in the band.
    ///
    /// Vertices on the notched surface move inwards by the full offset; vertices deeper in
    /// the body move proportionally less, down to zero at `extent` behind the surface.
    pub fn displacement(&self, p: &Point) -> Option<Point> {
        if !self.in_band(p) {
            return None;
        }
        let (outward, height) = self.outward_frame(p)?;
        let weight = ((self.spec.extent + height) / self.spec.extent).clamp(0.0, 1.0);
        let offset = self.offset(self.axial_distance(p)) * weight;
        if offset == 0.0 {
            None
        } else {
            Some(-outward * offset)
        }
    }

    /// Centers of the fillet arcs on either side of the symmetry plane (round notches only).
    ///
    /// The arc on the `+` side is tangent to the surface at `s = half_width`, and its
    /// center lies `fillet_radius` inside the body.
    pub fn fillet_centers(&self) -> SmallVec<[Point; 2]> {
        let r = match self.fillet_radius {
            Some(r) => r,
            None => return SmallVec::new(),
        };
        let along = self.spec.loading_axis.unit() * self.spec.half_width;
        let inward = -self.spec.face_normal * r;
        [1.0, -1.0]
            .iter()
            .map(|side| self.spec.reference_point + along * *side + inward)
            .collect()
    }
}

/// Carve notches into a mesh by relocating vertices.
///
/// All displacements are computed from the positions before notching. A vertex inside
/// more than one band is owned by the first notch listed. Returns the number of moved vertices.
pub fn apply_notches(mesh: &mut Mesh, notches: &[NotchProfile]) -> usize {
    let moves: Vec<(usize, Point)> = mesh
        .nodes
        .iter()
        .filter_map(|node| {
            notches
                .iter()
                .find(|notch| notch.in_band(&node.coords))
                .and_then(|notch| notch.displacement(&node.coords))
                .map(|d| (node.id, d))
        })
        .collect();

    for (id, d) in moves.iter() {
        mesh.nodes[*id].coords = mesh.nodes[*id].coords + *d;
    }

    debug!("notching moved {} vertices", moves.len());
    moves.len()
}

/// Refine once every cell with a face on the notched boundary inside the notch band
pub fn prepare_for_notching(mesh: &mut Mesh, notch: &NotchProfile) -> Result<()> {
    let tag = notch.spec().boundary_tag;
    let flagged: Vec<usize> = mesh
        .boundary_faces()
        .filter(|bf| bf.info.tag == tag)
        .filter(|bf| {
            let centroid = mesh.face_centroid(bf.cell, bf.face);
            notch.axial_distance(&centroid).abs() <= notch.spec().half_width
        })
        .map(|bf| bf.cell)
        .collect();

    let mut cells = flagged;
    cells.dedup();
    mesh.refine_cells(cells, Refinement::Isotropic)
}

/// Attach curved manifolds following the fillet arcs of a round, planar notch.
///
/// The arc on the `+` side of the symmetry plane gets `first_id`, the other side `first_id + 1`.
/// Notched faces whose vertices all lie on one arc are flagged with that arc's manifold.
/// Returns the number of faces flagged.
pub fn attach_fillet_manifolds(
    mesh: &mut Mesh,
    notch: &NotchProfile,
    first_id: ManifoldId,
) -> Result<usize> {
    if notch.spec().surface == NotchSurface::Radial {
        warn!("fillet manifolds are not available for radial notches");
        return Ok(0);
    }

    let centers = notch.fillet_centers();
    let mut flagged = 0;
    for (i, (center, side)) in centers.iter().zip([1.0, -1.0]).enumerate() {
        let id = first_id + i;
        let manifold = match mesh.dim() {
            Dim::Two => Manifold::spherical(*center),
            Dim::Three => {
                let n = notch.spec().face_normal;
                let a = notch.spec().loading_axis.unit();
                let direction = Point::new(
                    n.y * a.z - n.z * a.y,
                    n.z * a.x - n.x * a.z,
                    n.x * a.y - n.y * a.x,
                );
                Manifold::cylindrical(direction, *center)?
            }
        };
        mesh.set_manifold(id, manifold);

        let tol = BAND_TOLERANCE * notch.spec().extent;
        let on_arc: Vec<(usize, usize)> = mesh
            .boundary_faces()
            .filter(|bf| bf.info.tag == notch.spec().boundary_tag)
            .filter(|bf| {
                bf.nodes.iter().all(|n| {
                    let s = notch.axial_distance(&mesh.nodes[*n].coords) * side;
                    s >= -tol && s <= notch.spec().half_width + tol
                })
            })
            .map(|bf| (bf.cell, bf.face))
            .collect();

        for (cell, face) in on_arc.iter() {
            mesh.set_face_manifold(*cell, *face, Some(id))?;
        }
        flagged += on_arc.len();
    }

    Ok(flagged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::generators::hyper_rectangle_with_steps;
    use approx::assert_abs_diff_eq;

    fn planar(notch_type: NotchType, half_width: f64, depth: f64) -> NotchSpecification {
        NotchSpecification {
            notch_type,
            half_width,
            depth,
            reference_point: Point::xy(2.0, 5.0),
            boundary_tag: Tag::PlusX,
            face_normal: Point::xy(1.0, 0.0),
            loading_axis: Axis::Y,
            extent: 20.0,
            surface: NotchSurface::Planar,
        }
    }

    #[test]
    fn linear_profile() {
        let notch = NotchProfile::new(planar(NotchType::Linear, 1.0, 0.5)).unwrap();
        assert_abs_diff_eq!(notch.offset(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(notch.offset(1.0), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(notch.offset(-0.5), 0.25, epsilon = 1e-15);
        assert_eq!(notch.offset(1.5), 0.0);

        let samples: Vec<f64> = (0..=20).map(|i| notch.offset(i as f64 * 0.05)).collect();
        assert!(samples.windows(2).all(|w| w[1] <= w[0]));
        assert!(notch.fillet_centers().is_empty());
    }

    #[test]
    fn round_profile() {
        let notch = NotchProfile::new(planar(NotchType::Round, 5.0, 2.0)).unwrap();
        let r = notch.fillet_radius().unwrap();
        assert_abs_diff_eq!(r, 29.0 / 4.0, epsilon = 1e-14);
        assert_abs_diff_eq!(notch.offset(0.0), 2.0, epsilon = 1e-9);
        assert_eq!(notch.offset(5.0), 0.0);

        // tangent to the undisturbed surface at the band edge
        let h = 1e-6;
        let slope = (notch.offset(5.0 - h) - notch.offset(5.0)) / h;
        assert!(slope.abs() < 1e-5);

        let samples: Vec<f64> = (0..=50).map(|i| notch.offset(i as f64 * 0.1)).collect();
        assert!(samples.windows(2).all(|w| w[1] <= w[0] + 1e-15));
    }

    #[test]
    fn round_profile_follows_fillet_arc() {
        let notch = NotchProfile::new(planar(NotchType::Round, 5.0, 2.0)).unwrap();
        let centers = notch.fillet_centers();
        assert_eq!(centers.len(), 2);
        for s in [0.0, 1.0, 2.5, 4.0] {
            let surface = Point::xy(2.0 - notch.offset(s), 5.0 + s);
            assert_abs_diff_eq!(
                surface.dist(&centers[0]),
                notch.fillet_radius().unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn round_too_deep() {
        let result = NotchProfile::new(planar(NotchType::Round, 5.0, 10.0));
        assert!(matches!(result, Err(GridError::InvalidNotchGeometry(_))));
    }

    #[test]
    fn invalid_geometries() {
        assert!(NotchProfile::new(planar(NotchType::Linear, 0.0, 0.5)).is_err());
        assert!(NotchProfile::new(planar(NotchType::Linear, 1.0, -0.1)).is_err());
        assert!(NotchProfile::new(planar(NotchType::Linear, 1.0, 25.0)).is_err());

        let mut unbounded = planar(NotchType::Linear, 1.0, f64::INFINITY);
        unbounded.extent = f64::INFINITY;
        assert!(matches!(
            NotchProfile::new(unbounded),
            Err(GridError::InvalidNotchGeometry(_))
        ));
        assert!(NotchProfile::new(planar(NotchType::Linear, 1.0, f64::NAN)).is_err());

        let mut skewed = planar(NotchType::Linear, 1.0, 0.5);
        skewed.face_normal = Point::xy(0.0, 1.0);
        assert!(NotchProfile::new(skewed).is_err());

        let mut long_normal = planar(NotchType::Linear, 1.0, 0.5);
        long_normal.face_normal = Point::xy(2.0, 0.0);
        assert!(NotchProfile::new(long_normal).is_err());
    }

    #[test]
    fn zero_depth_round_notch_is_flat() {
        let notch = NotchProfile::new(planar(NotchType::Round, 1.0, 0.0)).unwrap();
        assert_eq!(notch.offset(0.0), 0.0);
        assert!(notch.fillet_radius().is_none());
    }

    #[test]
    fn notched_strip() {
        // 2 x 10 strip with vertex rows at y = 0, 4, 5, 5.9, 6.5, 10
        let mut mesh = hyper_rectangle_with_steps(
            Dim::Two,
            &[vec![1.0, 1.0], vec![4.0, 1.0, 0.9, 0.6, 3.5]],
            Point::origin(),
        )
        .unwrap();
        let node_at = |x: f64, y: f64| {
            mesh.nodes
                .iter()
                .find(|n| n.coords.approx_eq(&Point::xy(x, y), 1e-12))
                .map(|n| n.id)
                .unwrap()
        };
        let probes: Vec<(usize, f64)> = [
            (2.0, 5.9, 1.95),
            (2.0, 5.0, 1.5),
            (2.0, 6.5, 2.0),
            (2.0, 4.0, 2.0),
            // half way through the strip the displacement has halved
            (1.0, 5.0, 0.75),
            (0.0, 5.0, 0.0),
        ]
        .iter()
        .map(|(x, y, expected)| (node_at(*x, *y), *expected))
        .collect();

        let mut spec = planar(NotchType::Linear, 1.0, 0.5);
        spec.extent = 2.0;
        let notch = NotchProfile::new(spec).unwrap();
        apply_notches(&mut mesh, &[notch]);

        for (id, expected) in probes {
            assert_abs_diff_eq!(mesh.nodes[id].coords.x, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn first_notch_owns_shared_vertices() {
        let mut mesh = hyper_rectangle_with_steps(
            Dim::Two,
            &[vec![2.0], vec![5.0, 5.0]],
            Point::origin(),
        )
        .unwrap();
        let mut a = planar(NotchType::Linear, 1.0, 0.5);
        a.extent = 2.0;
        let mut b = a;
        b.depth = 1.0;
        let moved = apply_notches(
            &mut mesh,
            &[NotchProfile::new(a).unwrap(), NotchProfile::new(b).unwrap()],
        );
        assert_eq!(moved, 1);
        let notched = mesh.nodes.iter().find(|n| (n.coords.y - 5.0).abs() < 1e-12 && n.coords.x > 1.0).unwrap();
        assert_abs_diff_eq!(notched.coords.x, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn radial_notch_scales_radius() {
        let spec = NotchSpecification {
            notch_type: NotchType::Linear,
            half_width: 1.0,
            depth: 0.4,
            reference_point: Point::new(2.0, 0.0, 0.0),
            boundary_tag: Tag::Surface,
            face_normal: Point::new(1.0, 0.0, 0.0),
            loading_axis: Axis::Y,
            extent: 2.0,
            surface: NotchSurface::Radial,
        };
        let notch = NotchProfile::new(spec).unwrap();

        let on_surface = Point::new(2.0_f64.sqrt(), 0.0, 2.0_f64.sqrt());
        let moved = on_surface + notch.displacement(&on_surface).unwrap();
        assert_abs_diff_eq!(moved.reject_from(&Axis::Y.unit()).norm(), 1.6, epsilon = 1e-12);

        let half_way = Point::new(1.0, 0.5, 0.0);
        let moved = half_way + notch.displacement(&half_way).unwrap();
        assert_abs_diff_eq!(moved.x, 1.0 - 0.5 * notch.offset(0.5), epsilon = 1e-12);

        assert!(notch.displacement(&Point::new(0.0, 0.0, 0.0)).is_none());
        assert!(notch.displacement(&Point::new(1.0, 1.5, 0.0)).is_none());
    }

    #[test]
    fn fillet_manifold_refinement_stays_on_arc() {
        let mut mesh = hyper_rectangle_with_steps(
            Dim::Two,
            &[vec![1.0, 1.0], vec![1.0; 10]],
            Point::origin(),
        )
        .unwrap();
        crate::boundary::BoundaryClassifier::box_shaped(Dim::Two, [2.0, 10.0, 0.0])
            .classify_mesh(&mut mesh)
            .unwrap();

        let mut spec = planar(NotchType::Round, 2.0, 0.5);
        spec.extent = 2.0;
        let notch = NotchProfile::new(spec).unwrap();
        apply_notches(&mut mesh, &[notch]);
        assert_eq!(attach_fillet_manifolds(&mut mesh, &notch, 20).unwrap(), 4);

        mesh.refine_global(1).unwrap();
        let r = notch.fillet_radius().unwrap();
        let center = notch.fillet_centers()[0];
        let mid = mesh
            .nodes
            .iter()
            .find(|n| (n.coords.y - 5.5).abs() < 0.4 && n.coords.x > 1.6)
            .unwrap();
        assert_abs_diff_eq!(mid.coords.dist(&center), r, epsilon = 1e-12);
    }
}
