use crate::error::{GridError, Result};
use crate::geometry::{Axis, Dim, Point};
use crate::mesh::cell::ManifoldId;
use crate::mesh::Mesh;

use log::debug;
use smallvec::SmallVec;
use std::fmt;

/// Default tolerance used to match face centroids against body planes
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// Label identifying which part of a body's boundary a face belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    MinusX,
    PlusX,
    MinusY,
    PlusY,
    MinusZ,
    PlusZ,
    /// the curved edge of a hole
    HoleEdge,
    /// a curved outer surface
    Surface,
    Unclassified,
}

impl Tag {
    /// Tag of the plane `axis = 0` (`upper == false`) or `axis = extent` (`upper == true`)
    pub const fn plane(axis: Axis, upper: bool) -> Self {
        match (axis, upper) {
            (Axis::X, false) => Self::MinusX,
            (Axis::X, true) => Self::PlusX,
            (Axis::Y, false) => Self::MinusY,
            (Axis::Y, true) => Self::PlusY,
            (Axis::Z, false) => Self::MinusZ,
            (Axis::Z, true) => Self::PlusZ,
        }
    }

    pub const fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::MinusX => "minus-x",
            Self::PlusX => "plus-x",
            Self::MinusY => "minus-y",
            Self::PlusY => "plus-y",
            Self::MinusZ => "minus-z",
            Self::PlusZ => "plus-z",
            Self::HoleEdge => "hole-edge",
            Self::Surface => "surface",
            Self::Unclassified => "unclassified",
        };
        write!(f, "{}", name)
    }
}

/// A circle/sphere (`axis == None`) or a cylinder around an axis through `center`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurvedSurface {
    pub center: Point,
    pub axis: Option<Axis>,
    pub radius: f64,
    /// tag assigned to faces on this surface
    pub tag: Tag,
}

impl CurvedSurface {
    pub fn hole(center: Point, radius: f64) -> Self {
        Self {
            center,
            axis: None,
            radius,
            tag: Tag::HoleEdge,
        }
    }

    pub fn cylinder(center: Point, axis: Axis, radius: f64, tag: Tag) -> Self {
        Self {
            center,
            axis: Some(axis),
            radius,
            tag,
        }
    }

    /// Distance of a point from the center (or from the axis)
    pub fn distance(&self, p: &Point) -> f64 {
        let rel = *p - self.center;
        match self.axis {
            Some(axis) => rel.reject_from(&axis.unit()).norm(),
            None => rel.norm(),
        }
    }

    pub fn contains(&self, p: &Point, tol: f64) -> bool {
        (self.distance(p) - self.radius).abs() < tol
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PlaneTest {
    axis: Axis,
    value: f64,
    tag: Tag,
}

/// Assigns a [Tag] to boundary faces of box-shaped bodies (optionally with one curved surface).
///
/// Planes are tested in a fixed priority order: x-minus, x-plus, y-minus, y-plus, z-minus, z-plus.
/// The first plane within tolerance of the face centroid wins, so faces on edges and corners of the
/// body are resolved towards x, then y, then z. Faces matching no plane are tested against the
/// curved surface.
#[derive(Clone, Debug)]
pub struct BoundaryClassifier {
    planes: SmallVec<[PlaneTest; 6]>,
    curved: Option<CurvedSurface>,
    tolerance: f64,
}

impl BoundaryClassifier {
    /// Classifier for the body `[0, extents[0]] x [0, extents[1]] (x [0, extents[2]])`
    pub fn box_shaped(dim: Dim, extents: [f64; 3]) -> Self {
        let planes = dim
            .axes()
            .iter()
            .flat_map(|axis| {
                [false, true].into_iter().map(move |upper| PlaneTest {
                    axis: *axis,
                    value: if upper { extents[axis.index()] } else { 0.0 },
                    tag: Tag::plane(*axis, upper),
                })
            })
            .collect();

        Self {
            planes,
            curved: None,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_curved_surface(mut self, curved: CurvedSurface) -> Self {
        self.curved = Some(curved);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Drop the plane test producing `tag` (for bodies that do not have that plane)
    pub fn without_plane(mut self, tag: Tag) -> Self {
        self.planes.retain(|p| p.tag != tag);
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn curved_surface(&self) -> Option<&CurvedSurface> {
        self.curved.as_ref()
    }

    /// Tag of the first plane the centroid lies on, if any
    pub fn classify_planar(&self, centroid: &Point) -> Option<Tag> {
        self.planes
            .iter()
            .find(|p| (centroid[p.axis] - p.value).abs() < self.tolerance)
            .map(|p| p.tag)
    }

    /// Classify a face from its centroid and vertices; [Tag::Unclassified] if nothing matches
    pub fn classify(&self, centroid: &Point, vertices: &[Point]) -> Tag {
        if let Some(tag) = self.classify_planar(centroid) {
            return tag;
        }
        match self.curved {
            Some(curved) if vertices.iter().any(|v| curved.contains(v, self.tolerance)) => curved.tag,
            _ => Tag::Unclassified,
        }
    }

    /// Tag every boundary face of the mesh, replacing previous tags.
    ///
    /// Returns [GridError::UnclassifiedBoundaryFace] for the first face that matches nothing.
    pub fn classify_mesh(&self, mesh: &mut Mesh) -> Result<()> {
        mesh.clear_tags();

        let mut tags = Vec::new();
        for bf in mesh.boundary_faces() {
            let points = mesh.face_points(bf.cell, bf.face);
            let centroid = Point::centroid(points.iter());
            match self.classify(&centroid, &points) {
                Tag::Unclassified => {
                    return Err(GridError::UnclassifiedBoundaryFace {
                        cell: bf.cell,
                        face: bf.face,
                        centroid,
                    })
                }
                tag => tags.push((bf.cell, bf.face, tag)),
            }
        }

        debug!("classified {} boundary faces", tags.len());
        for (cell, face, tag) in tags {
            mesh.set_face_tag(cell, face, tag)?;
        }
        Ok(())
    }

    /// Tag only the boundary faces lying on one of the planes, leaving all others untouched
    pub fn tag_planes(&self, mesh: &mut Mesh) -> Result<()> {
        let tags: Vec<(usize, usize, Tag)> = mesh
            .boundary_faces()
            .filter_map(|bf| {
                self.classify_planar(&mesh.face_centroid(bf.cell, bf.face))
                    .map(|tag| (bf.cell, bf.face, tag))
            })
            .collect();
        for (cell, face, tag) in tags {
            mesh.set_face_tag(cell, face, tag)?;
        }
        Ok(())
    }

    /// Attach `manifold` to every boundary face with at least one vertex on the curved surface.
    ///
    /// Returns the number of faces flagged.
    pub fn flag_curved_faces(&self, mesh: &mut Mesh, manifold: ManifoldId) -> Result<usize> {
        let curved = match self.curved {
            Some(c) => c,
            None => return Ok(0),
        };

        let flagged: Vec<(usize, usize)> = mesh
            .boundary_faces()
            .filter(|bf| {
                bf.nodes
                    .iter()
                    .any(|n| curved.contains(&mesh.nodes[*n].coords, self.tolerance))
            })
            .map(|bf| (bf.cell, bf.face))
            .collect();

        for (cell, face) in flagged.iter() {
            mesh.set_face_manifold(*cell, *face, Some(manifold))?;
        }
        Ok(flagged.len())
    }
}

/// Check that every boundary face carries a classified tag
pub fn verify_tag_coverage(mesh: &Mesh) -> Result<()> {
    match mesh.boundary_faces().find(|bf| !bf.info.tag.is_classified()) {
        Some(bf) => Err(GridError::UnclassifiedBoundaryFace {
            cell: bf.cell,
            face: bf.face,
            centroid: mesh.face_centroid(bf.cell, bf.face),
        }),
        None => Ok(()),
    }
}
