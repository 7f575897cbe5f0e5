use crate::error::{GridError, Result};
use crate::geometry::Point;
use nalgebra::{Rotation3, Unit, Vector3};

/// Curved geometry that new refinement vertices are projected onto
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Manifold {
    /// circle (2D) or sphere (3D) around a center
    Spherical { center: Point },
    /// cylinder around an axis given by a unit direction and a point on the axis
    Cylindrical { direction: Point, point: Point },
}

impl Manifold {
    pub fn spherical(center: Point) -> Self {
        Self::Spherical { center }
    }

    pub fn cylindrical(direction: Point, point: Point) -> Result<Self> {
        let norm = direction.norm();
        if norm < f64::EPSILON {
            return Err(GridError::DegenerateMeshOperation(
                "cylindrical manifold with zero axis direction".to_string(),
            ));
        }
        Ok(Self::Cylindrical {
            direction: direction / norm,
            point,
        })
    }

    /// Place a new vertex between `surrounding` vertices.
    ///
    /// The new vertex keeps the direction of the straight-sided average and takes the
    /// mean distance of the surrounding vertices from the center (or axis).
    pub fn new_point(&self, surrounding: &[Point]) -> Point {
        let linear = Point::centroid(surrounding.iter());
        match self {
            Self::Spherical { center } => {
                let c: Vector3<f64> = (*center).into();
                let mean_radius = surrounding
                    .iter()
                    .map(|p| (Vector3::from(*p) - c).norm())
                    .sum::<f64>()
                    / surrounding.len().max(1) as f64;

                match Unit::try_new(Vector3::from(linear) - c, f64::EPSILON) {
                    Some(dir) => (c + dir.into_inner() * mean_radius).into(),
                    None => linear,
                }
            }
            Self::Cylindrical { direction, point } => {
                let axis = Vector3::from(*direction).normalize();
                let origin: Vector3<f64> = (*point).into();
                let radial = |p: &Point| {
                    let rel = Vector3::from(*p) - origin;
                    rel - axis * rel.dot(&axis)
                };

                let mean_radius = surrounding.iter().map(|p| radial(p).norm()).sum::<f64>()
                    / surrounding.len().max(1) as f64;

                let rel = Vector3::from(linear) - origin;
                let on_axis = origin + axis * rel.dot(&axis);
                match Unit::try_new(radial(&linear), f64::EPSILON) {
                    Some(dir) => (on_axis + dir.into_inner() * mean_radius).into(),
                    None => linear,
                }
            }
        }
    }

    /// The same manifold after a rigid rotation of space
    pub fn rotated(&self, rotation: &Rotation3<f64>) -> Self {
        let rot = |p: Point| Point::from(rotation * Vector3::from(p));
        match self {
            Self::Spherical { center } => Self::Spherical {
                center: rot(*center),
            },
            Self::Cylindrical { direction, point } => Self::Cylindrical {
                direction: rot(*direction),
                point: rot(*point),
            },
        }
    }

    /// The manifold swept along z by an extrusion: circles become cylinders
    pub fn extruded(&self) -> Self {
        match self {
            Self::Spherical { center } => Self::Cylindrical {
                direction: Point::new(0.0, 0.0, 1.0),
                point: *center,
            },
            cyl => *cyl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

    #[test]
    fn spherical_arc_midpoint() {
        let m = Manifold::spherical(Point::origin());
        let p = m.new_point(&[Point::xy(1.0, 0.0), Point::xy(0.0, 1.0)]);
        assert!(p.approx_eq(&Point::xy(FRAC_1_SQRT_2, FRAC_1_SQRT_2), 1e-14));
    }

    #[test]
    fn spherical_radial_edge_stays_straight() {
        let m = Manifold::spherical(Point::origin());
        let p = m.new_point(&[Point::xy(1.0, 0.0), Point::xy(3.0, 0.0)]);
        assert!(p.approx_eq(&Point::xy(2.0, 0.0), 1e-14));
    }

    #[test]
    fn cylindrical_keeps_axial_position() {
        let m = Manifold::cylindrical(Point::new(0.0, 2.0, 0.0), Point::origin()).unwrap();
        let p = m.new_point(&[Point::new(2.0, 1.0, 0.0), Point::new(0.0, 3.0, 2.0)]);
        assert!((p.y - 2.0).abs() < 1e-14);
        assert!((p.reject_from(&Point::new(0.0, 1.0, 0.0)).norm() - 2.0).abs() < 1e-14);
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(Manifold::cylindrical(Point::origin(), Point::origin()).is_err());
    }

    #[test]
    fn rotation_moves_axis() {
        let m = Manifold::cylindrical(Point::new(1.0, 0.0, 0.0), Point::origin()).unwrap();
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        match m.rotated(&rot) {
            Manifold::Cylindrical { direction, .. } => {
                assert!(direction.approx_eq(&Point::new(0.0, 1.0, 0.0), 1e-14))
            }
            _ => panic!("rotation changed the manifold kind"),
        }
    }
}
