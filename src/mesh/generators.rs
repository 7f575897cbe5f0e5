use super::cell::ManifoldId;
use super::manifold::Manifold;
use super::Mesh;
use crate::error::{GridError, Result};
use crate::geometry::{Axis, Dim, Point};

use std::f64::consts::{FRAC_PI_4, SQRT_2};

/// Manifold id given to the lateral surface by [cylinder]
pub const CYLINDER_MANIFOLD_ID: ManifoldId = 0;

/// Structured brick between two opposite corners with `reps[axis]` equally sized cells along each axis
pub fn subdivided_hyper_rectangle(dim: Dim, reps: &[usize], p1: Point, p2: Point) -> Result<Mesh> {
    if reps.len() != dim.n() || reps.iter().any(|r| *r == 0) {
        return Err(GridError::DegenerateMeshOperation(format!(
            "invalid repetitions {:?} for a {}D brick",
            reps,
            dim.n()
        )));
    }

    let steps: Vec<Vec<f64>> = dim
        .axes()
        .iter()
        .zip(reps)
        .map(|(axis, n)| vec![(p2[*axis] - p1[*axis]) / *n as f64; *n])
        .collect();

    hyper_rectangle_with_steps(dim, &steps, p1)
}

/// Structured brick starting at `origin` with explicit cell sizes along each axis.
///
/// ```text
///   origin + (sum of x steps, sum of y steps)
///     *-----*----------*
///     |     |          |
///     *-----*----------*
///     |     |          |
///     *-----*----------*
///   origin
/// ```
pub fn hyper_rectangle_with_steps(dim: Dim, steps: &[Vec<f64>], origin: Point) -> Result<Mesh> {
    if steps.len() != dim.n() {
        return Err(GridError::DegenerateMeshOperation(format!(
            "{} step lists given for a {}D brick",
            steps.len(),
            dim.n()
        )));
    }
    if steps.iter().any(|s| s.is_empty() || s.iter().any(|h| !(*h > 0.0))) {
        return Err(GridError::DegenerateMeshOperation(
            "brick step sizes must be positive".to_string(),
        ));
    }

    // node coordinates along each axis
    let mut ticks: [Vec<f64>; 3] = [vec![0.0], vec![0.0], vec![0.0]];
    for (a, axis) in dim.axes().iter().enumerate() {
        ticks[a] = std::iter::once(origin[*axis])
            .chain(steps[a].iter().scan(origin[*axis], |pos, h| {
                *pos += h;
                Some(*pos)
            }))
            .collect();
    }
    if dim == Dim::Two {
        ticks[2] = vec![0.0];
    }

    let [nx, ny, nz] = [ticks[0].len(), ticks[1].len(), ticks[2].len()];
    let node_index = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

    let mut points = Vec::with_capacity(nx * ny * nz);
    for z in ticks[2].iter() {
        for y in ticks[1].iter() {
            for x in ticks[0].iter() {
                points.push(Point::new(*x, *y, *z));
            }
        }
    }

    let cz = if dim == Dim::Three { nz - 1 } else { 1 };
    let mut cells = Vec::with_capacity((nx - 1) * (ny - 1) * cz);
    for k in 0..cz {
        for j in 0..ny - 1 {
            for i in 0..nx - 1 {
                let mut cell = vec![
                    node_index(i, j, k),
                    node_index(i + 1, j, k),
                    node_index(i, j + 1, k),
                    node_index(i + 1, j + 1, k),
                ];
                if dim == Dim::Three {
                    cell.extend([
                        node_index(i, j, k + 1),
                        node_index(i + 1, j, k + 1),
                        node_index(i, j + 1, k + 1),
                        node_index(i + 1, j + 1, k + 1),
                    ]);
                }
                cells.push(cell);
            }
        }
    }

    Mesh::from_cells(dim, points, cells)
}

/// Square `[-half_width, half_width]^2` with a centered circular hole, built from 8 cells
/// arranged around the hole. Hole faces carry no manifold yet.
pub fn hyper_cube_with_cylindrical_hole(inner_radius: f64, half_width: f64) -> Result<Mesh> {
    if !(inner_radius > 0.0) || inner_radius >= half_width {
        return Err(GridError::DegenerateMeshOperation(format!(
            "hole radius {} does not fit inside a square of half width {}",
            inner_radius, half_width
        )));
    }

    // ray k at 45 degree increments: inner point on the circle, outer point on the square
    let mut points = Vec::with_capacity(16);
    for k in 0..8 {
        let theta = k as f64 * FRAC_PI_4;
        let (s, c) = theta.sin_cos();
        points.push(Point::xy(inner_radius * c, inner_radius * s));
        let to_square = half_width / c.abs().max(s.abs());
        points.push(Point::xy(to_square * c, to_square * s));
    }

    let cells = (0..8)
        .map(|k| {
            let next = (k + 1) % 8;
            vec![2 * k, 2 * k + 1, 2 * next, 2 * next + 1]
        })
        .collect();

    Mesh::from_cells(Dim::Two, points, cells)
}

/// Cylinder of the given radius along the x axis, spanning `[-half_length, half_length]`.
///
/// The cross-section is a central square surrounded by four cells; there are two cells
/// along the axis. Lateral faces are attached to a cylindrical manifold with id
/// [CYLINDER_MANIFOLD_ID].
pub fn cylinder(radius: f64, half_length: f64) -> Result<Mesh> {
    if !(radius > 0.0) || !(half_length > 0.0) {
        return Err(GridError::DegenerateMeshOperation(format!(
            "cylinder with radius {} and half length {}",
            radius, half_length
        )));
    }

    let d = radius / SQRT_2;
    let a = d * (1.0 + SQRT_2) / 3.0;

    // (y, z) of the outer and inner rings, counter-clockwise starting at (-, -)
    let outer = [(-d, -d), (d, -d), (d, d), (-d, d)];
    let inner = [(-a, -a), (a, -a), (a, a), (-a, a)];

    let mut points = Vec::with_capacity(24);
    for x in [-half_length, 0.0, half_length] {
        for (y, z) in outer.iter().chain(inner.iter()) {
            points.push(Point::new(x, *y, *z));
        }
    }

    // cross-section quads in terms of ring positions (outer: 0..4, inner: 4..8)
    let mut sections: Vec<[usize; 4]> = (0..4)
        .map(|k| {
            let next = (k + 1) % 4;
            [k, next, 4 + k, 4 + next]
        })
        .collect();
    sections.push([4, 5, 7, 6]);

    let mut cells = Vec::with_capacity(10);
    for layer in 0..2 {
        for quad in sections.iter() {
            let lower = quad.iter().map(|v| 8 * layer + v);
            let upper = quad.iter().map(|v| 8 * (layer + 1) + v);
            cells.push(lower.chain(upper).collect());
        }
    }

    let mut mesh = Mesh::from_cells(Dim::Three, points, cells)?;
    mesh.set_manifold(
        CYLINDER_MANIFOLD_ID,
        Manifold::cylindrical(Axis::X.unit(), Point::origin())?,
    );

    let tol = 1e-10 * radius;
    let lateral: Vec<(usize, usize)> = mesh
        .boundary_faces()
        .filter(|bf| {
            bf.nodes
                .iter()
                .all(|n| (mesh.nodes[*n].coords.reject_from(&Axis::X.unit()).norm() - radius).abs() < tol)
        })
        .map(|bf| (bf.cell, bf.face))
        .collect();
    for (cell, face) in lateral {
        mesh.set_face_manifold(cell, face, Some(CYLINDER_MANIFOLD_ID))?;
    }

    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    #[test]
    fn stepped_brick() {
        let mesh = hyper_rectangle_with_steps(
            Dim::Two,
            &[vec![1.0, 3.0], vec![0.5, 0.5, 1.0]],
            Point::xy(-1.0, 0.0),
        )
        .unwrap();
        assert_eq!(mesh.n_cells(), 6);
        assert_eq!(mesh.n_nodes(), 12);
        let top_right = mesh.nodes.last().unwrap().coords;
        assert!(top_right.approx_eq(&Point::xy(3.0, 2.0), 1e-14));
    }

    #[test]
    fn brick_3d() {
        let mesh = subdivided_hyper_rectangle(
            Dim::Three,
            &[2, 3, 1],
            Point::origin(),
            Point::new(1.0, 3.0, 0.5),
        )
        .unwrap();
        assert_eq!(mesh.n_cells(), 6);
        assert_eq!(mesh.n_nodes(), 24);
        assert_eq!(mesh.boundary_faces().count(), 2 * (2 * 3 + 2 + 3));
    }

    #[test]
    fn bad_bricks() {
        assert!(subdivided_hyper_rectangle(Dim::Two, &[0, 1], Point::origin(), Point::xy(1.0, 1.0)).is_err());
        assert!(subdivided_hyper_rectangle(Dim::Two, &[1, 1, 1], Point::origin(), Point::xy(1.0, 1.0)).is_err());
        assert!(subdivided_hyper_rectangle(Dim::Two, &[1, 1], Point::origin(), Point::xy(-1.0, 1.0)).is_err());
    }

    #[test]
    fn square_with_hole() {
        let mesh = hyper_cube_with_cylindrical_hole(0.5, 2.0).unwrap();
        assert_eq!(mesh.n_cells(), 8);
        assert_eq!(mesh.n_nodes(), 16);
        // 8 hole faces and 8 outer faces
        assert_eq!(mesh.boundary_faces().count(), 16);
        assert!(mesh.nodes[3].coords.approx_eq(&Point::xy(2.0, 2.0), 1e-12));
        assert!(mesh.nodes[2]
            .coords
            .approx_eq(&Point::xy(0.5 * FRAC_1_SQRT_2, 0.5 * FRAC_1_SQRT_2), 1e-12));
        assert!(hyper_cube_with_cylindrical_hole(2.0, 2.0).is_err());
    }

    #[test]
    fn cylinder_lateral_manifold() {
        let mut mesh = cylinder(1.0, 2.0).unwrap();
        assert_eq!(mesh.n_cells(), 10);
        assert_eq!(mesh.n_nodes(), 24);
        let lateral = mesh
            .boundary_faces()
            .filter(|bf| bf.info.manifold == Some(CYLINDER_MANIFOLD_ID))
            .count();
        assert_eq!(lateral, 8);

        mesh.refine_global(1).unwrap();
        let on_hull = mesh
            .nodes
            .iter()
            .filter(|n| (n.coords.reject_from(&Axis::X.unit()).norm() - 1.0).abs() < 1e-12)
            .count();
        // 8 points per ring on 5 rings after one refinement
        assert_eq!(on_hull, 40);
    }
}
