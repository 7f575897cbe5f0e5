/// Quadrilateral and hexahedral cells with their boundary records
pub mod cell;
/// Coarse mesh generators (bricks, plate with hole, cylinder)
pub mod generators;
/// Curved geometry descriptions used to place refinement vertices
pub mod manifold;
/// A vertex in real space
pub mod node;
/// Isotropic and anisotropic cell refinement descriptions
pub mod refinement;

use cell::{entity_key, Cell, FaceInfo, ManifoldId};
use manifold::Manifold;
use node::Node;
use refinement::{ChildLoc, Refinement};

use crate::boundary::Tag;
use crate::error::{GridError, Result};
use crate::geometry::{Axis, Dim, Point};

use log::debug;
use nalgebra::{Rotation3, Unit, Vector3};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Sorted node ids of the parent vertices that span a refinement vertex
type SpanKey = SmallVec<[usize; 8]>;

/// The expected number of cells sharing one face. Faces seen by more cells than this are malformed
const MAX_CELLS_PER_FACE: usize = 2;

/// Hands out consecutive ids starting from a given value
pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(first_id: usize) -> Self {
        Self { next_id: first_id }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }
}

/// Geometric structure, boundary records and refinement state of a grid.
///
/// Only active cells are stored; refining a cell replaces it with its children.
/// Vertices created by refinement are shared between neighbouring cells through a
/// registry keyed on the parent vertices they were spawned from, so cells refined
/// in separate passes still agree on their common vertices.
#[derive(Debug, Clone)]
pub struct Mesh {
    dim: Dim,
    pub nodes: Vec<Node>,
    pub cells: Vec<Cell>,
    manifolds: BTreeMap<ManifoldId, Manifold>,
    spawned: BTreeMap<SpanKey, usize>,
    conforming: bool,
}

/// A boundary face of the Mesh as seen from the cell that owns it
#[derive(Debug, Clone)]
pub struct BoundaryFace {
    pub cell: usize,
    pub face: usize,
    pub info: FaceInfo,
    pub nodes: SmallVec<[usize; 4]>,
}

impl Mesh {
    /// Construct a Mesh from vertex coordinates and lexicographically ordered cell vertex lists.
    ///
    /// Faces that belong to only one cell are recorded as (unclassified) boundary faces.
    pub fn from_cells(dim: Dim, points: Vec<Point>, cells: Vec<Vec<usize>>) -> Result<Self> {
        let nv = dim.vertices_per_cell();

        let mut mesh = Self {
            dim,
            nodes: points
                .into_iter()
                .enumerate()
                .map(|(id, coords)| Node::new(id, coords))
                .collect(),
            cells: Vec::with_capacity(cells.len()),
            manifolds: BTreeMap::new(),
            spawned: BTreeMap::new(),
            conforming: true,
        };

        for (cell_id, cell_nodes) in cells.into_iter().enumerate() {
            if cell_nodes.len() != nv {
                return Err(GridError::DegenerateMeshOperation(format!(
                    "cell {} has {} vertices; expected {}",
                    cell_id,
                    cell_nodes.len(),
                    nv
                )));
            }
            if let Some(bad) = cell_nodes.iter().find(|n| **n >= mesh.nodes.len()) {
                return Err(GridError::DegenerateMeshOperation(format!(
                    "cell {} references non-existent node {}",
                    cell_id, bad
                )));
            }
            if entity_key(&cell_nodes).windows(2).any(|w| w[0] == w[1]) {
                return Err(GridError::DegenerateMeshOperation(format!(
                    "cell {} references the same node twice",
                    cell_id
                )));
            }
            mesh.cells
                .push(Cell::new(cell_id, cell_nodes.into_iter().collect(), dim));
        }

        mesh.refresh_boundary()?;
        Ok(mesh)
    }

    // ----------------------------------------------------------------------------------------------------
    // General Data Retrieval
    // ----------------------------------------------------------------------------------------------------

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// False once a refinement pass has left hanging nodes behind
    pub fn is_conforming(&self) -> bool {
        self.conforming
    }

    pub fn cell_points(&self, cell_id: usize) -> SmallVec<[Point; 8]> {
        self.cells[cell_id]
            .nodes
            .iter()
            .map(|n| self.nodes[*n].coords)
            .collect()
    }

    pub fn cell_center(&self, cell_id: usize) -> Point {
        Point::centroid(self.cell_points(cell_id).iter())
    }

    pub fn face_points(&self, cell_id: usize, face: usize) -> SmallVec<[Point; 4]> {
        self.cells[cell_id]
            .face_nodes(face)
            .iter()
            .map(|n| self.nodes[*n].coords)
            .collect()
    }

    pub fn face_centroid(&self, cell_id: usize, face: usize) -> Point {
        Point::centroid(self.face_points(cell_id, face).iter())
    }

    /// Iterate over every boundary face of every cell.
    ///
    /// The iterator borrows the Mesh; it can be recreated any number of times.
    pub fn boundary_faces(&self) -> impl Iterator<Item = BoundaryFace> + '_ {
        self.cells.iter().flat_map(|cell| {
            cell.boundary_faces().map(move |(face, info)| BoundaryFace {
                cell: cell.id,
                face,
                info: *info,
                nodes: cell.face_nodes(face),
            })
        })
    }

    /// Ids of the nodes lying on any boundary face
    pub fn boundary_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        let mut on_boundary = vec![false; self.nodes.len()];
        for bf in self.boundary_faces() {
            for n in bf.nodes {
                on_boundary[n] = true;
            }
        }
        on_boundary
            .into_iter()
            .enumerate()
            .filter_map(|(id, b)| if b { Some(id) } else { None })
    }

    pub fn set_face_tag(&mut self, cell_id: usize, face: usize, tag: Tag) -> Result<()> {
        self.face_info_mut(cell_id, face)?.tag = tag;
        Ok(())
    }

    pub fn set_face_manifold(
        &mut self,
        cell_id: usize,
        face: usize,
        manifold: Option<ManifoldId>,
    ) -> Result<()> {
        self.face_info_mut(cell_id, face)?.manifold = manifold;
        Ok(())
    }

    fn face_info_mut(&mut self, cell_id: usize, face: usize) -> Result<&mut FaceInfo> {
        self.cells
            .get_mut(cell_id)
            .ok_or(GridError::CellDoesntExist(cell_id))?
            .boundary
            .get_mut(face)
            .and_then(|f| f.as_mut())
            .ok_or_else(|| {
                GridError::DegenerateMeshOperation(format!(
                    "face {} of cell {} is not a boundary face",
                    face, cell_id
                ))
            })
    }

    /// Clear every boundary tag back to [Tag::Unclassified]
    pub fn clear_tags(&mut self) {
        for info in self.cells.iter_mut().flat_map(|c| c.boundary.iter_mut().flatten()) {
            info.tag = Tag::Unclassified;
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Manifolds
    // ----------------------------------------------------------------------------------------------------

    pub fn set_manifold(&mut self, id: ManifoldId, manifold: Manifold) {
        self.manifolds.insert(id, manifold);
    }

    pub fn manifold(&self, id: ManifoldId) -> Option<&Manifold> {
        self.manifolds.get(&id)
    }

    /// Forget a manifold; faces still pointing at it are refined as straight-sided faces
    pub fn reset_manifold(&mut self, id: ManifoldId) {
        self.manifolds.remove(&id);
    }

    /// Remove a manifold id from every boundary face
    pub fn clear_manifold_ids(&mut self, id: ManifoldId) {
        for info in self.cells.iter_mut().flat_map(|c| c.boundary.iter_mut().flatten()) {
            if info.manifold == Some(id) {
                info.manifold = None;
            }
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // h-refinement methods
    // ----------------------------------------------------------------------------------------------------

    /// Apply a [Refinement] to every cell in the Mesh
    pub fn global_refinement(&mut self, refinement: Refinement) -> Result<()> {
        self.execute_refinements(self.cells.iter().map(|c| (c.id, refinement)).collect())
    }

    /// Isotropically refine every cell `n` times
    pub fn refine_global(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.global_refinement(Refinement::Isotropic)?;
        }
        Ok(())
    }

    /// Apply a [Refinement] to a list of cells by their ID
    pub fn refine_cells(&mut self, cells: Vec<usize>, refinement: Refinement) -> Result<()> {
        self.execute_refinements(cells.iter().map(|id| (*id, refinement)).collect())
    }

    /// Refine cells according to an external filter function.
    ///
    /// The filter sees each cell together with its vertex coordinates.
    pub fn refine_with_filter<F>(&mut self, filt: F) -> Result<()>
    where
        F: Fn(&Cell, &[Point]) -> Option<Refinement>,
    {
        let refinements = self
            .cells
            .iter()
            .filter_map(|cell| filt(cell, &self.cell_points(cell.id)).map(|r| (cell.id, r)))
            .collect();
        self.execute_refinements(refinements)
    }

    /// Execute a series of [Refinement]s on cells specified by their id
    pub fn execute_refinements(&mut self, refinements: Vec<(usize, Refinement)>) -> Result<()> {
        let mut refinements_map: BTreeMap<usize, Refinement> = BTreeMap::new();
        for (cell_id, refinement) in refinements {
            if cell_id >= self.cells.len() {
                return Err(GridError::CellDoesntExist(cell_id));
            }
            if !refinement.is_valid_for(self.dim) {
                return Err(GridError::DegenerateMeshOperation(format!(
                    "{:?} is not a valid refinement of a {}D cell",
                    refinement,
                    self.dim.n()
                )));
            }
            if refinements_map.insert(cell_id, refinement).is_some() {
                return Err(GridError::DoubleRefinement(cell_id));
            }
        }

        if refinements_map.is_empty() {
            debug!("refinement pass with no cells flagged");
            return Ok(());
        }

        let uniform = refinements_map.len() == self.cells.len()
            && refinements_map
                .values()
                .all(|r| Some(r) == refinements_map.values().next());
        if !uniform {
            self.conforming = false;
        }

        let mut node_id_tracker = IdTracker::new(self.nodes.len());
        let old_cells = std::mem::take(&mut self.cells);
        let mut new_cells = Vec::with_capacity(old_cells.len() + 7 * refinements_map.len());

        for cell in old_cells {
            match refinements_map.get(&cell.id) {
                Some(refinement) => {
                    new_cells.extend(self.refine_cell(&cell, *refinement, &mut node_id_tracker))
                }
                None => new_cells.push(cell),
            }
        }

        for (id, cell) in new_cells.iter_mut().enumerate() {
            cell.id = id;
        }
        self.cells = new_cells;

        debug!(
            "refined {} cells; mesh now has {} cells and {} nodes",
            refinements_map.len(),
            self.cells.len(),
            self.nodes.len()
        );

        Ok(())
    }

    fn refine_cell(
        &mut self,
        parent: &Cell,
        refinement: Refinement,
        node_id_tracker: &mut IdTracker,
    ) -> Vec<Cell> {
        let dim = self.dim;
        let splits = refinement.splits(dim);

        let mut children = Vec::with_capacity(refinement.num_children(dim));
        for loc in ChildLoc::all(refinement, dim) {
            let mut nodes = SmallVec::new();
            for v in 0..dim.vertices_per_cell() {
                let t = loc.vertex_position(v, splits, dim);
                nodes.push(self.node_at(parent, t, node_id_tracker));
            }

            let boundary = (0..dim.faces_per_cell())
                .map(|f| {
                    if loc.face_on_parent_face(f, splits) {
                        parent.boundary[f]
                    } else {
                        None
                    }
                })
                .collect();

            children.push(Cell {
                id: 0,
                nodes,
                boundary,
                level: parent.level + 1,
                material_id: parent.material_id,
            });
        }
        children
    }

    /// Retrieve (or create) the node at a parametric position of a parent cell given in half units
    fn node_at(&mut self, parent: &Cell, t: [u8; 3], node_id_tracker: &mut IdTracker) -> usize {
        // parent corners spanned by the position along each axis
        let mut corners: SmallVec<[usize; 8]> = SmallVec::from_elem(0, 1);
        for a in 0..self.dim.n() {
            corners = match t[a] {
                0 => corners,
                2 => corners.iter().map(|c| c | (1 << a)).collect(),
                _ => corners
                    .iter()
                    .flat_map(|c| [*c, c | (1 << a)])
                    .collect(),
            };
        }

        if corners.len() == 1 {
            return parent.nodes[corners[0]];
        }

        let span: SmallVec<[usize; 8]> = corners.iter().map(|c| parent.nodes[*c]).collect();
        let span_points: SmallVec<[Point; 8]> =
            span.iter().map(|n| self.nodes[*n].coords).collect();

        let projected = self
            .manifold_for_corners(parent, &corners)
            .map(|m| m.new_point(&span_points));

        let key = entity_key(&span);
        match self.spawned.get(&key) {
            Some(existing) => {
                if let Some(p) = projected {
                    self.nodes[*existing].coords = p;
                }
                *existing
            }
            None => {
                let id = node_id_tracker.next_id();
                let coords = projected.unwrap_or_else(|| Point::centroid(span_points.iter()));
                self.nodes.push(Node::new(id, coords));
                self.spawned.insert(key, id);
                id
            }
        }
    }

    /// The manifold of the first boundary face of `cell` that contains every listed local corner
    fn manifold_for_corners(&self, cell: &Cell, corners: &[usize]) -> Option<Manifold> {
        (0..self.dim.faces_per_cell())
            .filter(|f| {
                let (axis, side) = (f / 2, f % 2);
                corners.iter().all(|c| (c >> axis) & 1 == side)
            })
            .filter_map(|f| cell.boundary[f].and_then(|info| info.manifold))
            .find_map(|id| self.manifolds.get(&id).copied())
    }

    // ----------------------------------------------------------------------------------------------------
    // Mesh modification
    // ----------------------------------------------------------------------------------------------------

    /// Remove every cell for which `remove` returns true.
    ///
    /// Faces uncovered by the removal become unclassified boundary faces. Fails if the
    /// Mesh has hanging nodes, or if no cell (or every cell) would be removed.
    pub fn remove_cells<F>(&mut self, remove: F) -> Result<()>
    where
        F: Fn(&Cell, &[Point]) -> bool,
    {
        self.require_conforming("cell removal")?;

        let doomed: Vec<bool> = self
            .cells
            .iter()
            .map(|c| remove(c, &self.cell_points(c.id)))
            .collect();
        let n_removed = doomed.iter().filter(|d| **d).count();

        if n_removed == 0 {
            return Err(GridError::DegenerateMeshOperation(
                "cell removal would not remove any cell".to_string(),
            ));
        }
        if n_removed == self.cells.len() {
            return Err(GridError::DegenerateMeshOperation(
                "cell removal would remove every cell".to_string(),
            ));
        }

        let old_cells = std::mem::take(&mut self.cells);
        self.cells = old_cells
            .into_iter()
            .zip(doomed)
            .filter_map(|(c, d)| if d { None } else { Some(c) })
            .enumerate()
            .map(|(id, mut c)| {
                c.id = id;
                c
            })
            .collect();

        self.compact_nodes();
        self.refresh_boundary()
    }

    /// Glue two conforming meshes together.
    ///
    /// Nodes closer than `tol` are merged; faces shared after merging become interior faces.
    /// Manifolds of `self` take precedence over those of `other` with the same id.
    pub fn merge(mut self, other: Mesh, tol: f64) -> Result<Mesh> {
        if self.dim != other.dim {
            return Err(GridError::DegenerateMeshOperation(
                "cannot merge meshes of different dimension".to_string(),
            ));
        }
        self.require_conforming("merge")?;
        other.require_conforming("merge")?;

        let mut node_id_tracker = IdTracker::new(self.nodes.len());
        let mut node_map = Vec::with_capacity(other.nodes.len());
        for node in other.nodes.iter() {
            let matching = self
                .nodes
                .iter()
                .find(|n| n.coords.approx_eq(&node.coords, tol))
                .map(|n| n.id);
            node_map.push(match matching {
                Some(id) => id,
                None => {
                    let id = node_id_tracker.next_id();
                    self.nodes.push(Node::new(id, node.coords));
                    id
                }
            });
        }

        let first_id = self.cells.len();
        for (i, mut cell) in other.cells.into_iter().enumerate() {
            cell.id = first_id + i;
            cell.nodes.iter_mut().for_each(|n| *n = node_map[*n]);
            self.cells.push(cell);
        }

        for (span, node) in other.spawned {
            let span: SmallVec<[usize; 8]> = span.iter().map(|n| node_map[*n]).collect();
            self.spawned
                .entry(entity_key(&span))
                .or_insert(node_map[node]);
        }
        for (id, manifold) in other.manifolds {
            self.manifolds.entry(id).or_insert(manifold);
        }

        self.refresh_boundary()?;
        Ok(self)
    }

    /// Sweep a 2D mesh along +z into `layers` layers of hexahedra spanning `height`.
    ///
    /// Side faces keep their boundary records. Bottom and top faces are tagged
    /// [Tag::MinusZ] and [Tag::PlusZ]. Circular manifolds become cylinders along z.
    pub fn extrude(&self, layers: usize, height: f64) -> Result<Mesh> {
        if self.dim != Dim::Two {
            return Err(GridError::DegenerateMeshOperation(
                "only 2D meshes can be extruded".to_string(),
            ));
        }
        if layers == 0 || height <= 0.0 {
            return Err(GridError::DegenerateMeshOperation(format!(
                "extrusion into {} layers of height {}",
                layers, height
            )));
        }

        let n2 = self.nodes.len();
        let lift = |node: usize, layer: usize| layer * n2 + node;

        let mut nodes = Vec::with_capacity(n2 * (layers + 1));
        for k in 0..=layers {
            let z = height * k as f64 / layers as f64;
            for node in self.nodes.iter() {
                let coords = Point::new(node.coords.x, node.coords.y, z);
                nodes.push(Node::new(lift(node.id, k), coords));
            }
        }

        let mut cells = Vec::with_capacity(self.cells.len() * layers);
        for k in 0..layers {
            for flat in self.cells.iter() {
                let hex_nodes = flat
                    .nodes
                    .iter()
                    .map(|n| lift(*n, k))
                    .chain(flat.nodes.iter().map(|n| lift(*n, k + 1)))
                    .collect();

                let mut boundary: SmallVec<[Option<FaceInfo>; 6]> =
                    flat.boundary.iter().copied().collect();
                boundary.push((k == 0).then(|| FaceInfo::tagged(Tag::MinusZ)));
                boundary.push((k + 1 == layers).then(|| FaceInfo::tagged(Tag::PlusZ)));

                cells.push(Cell {
                    id: cells.len(),
                    nodes: hex_nodes,
                    boundary,
                    level: flat.level,
                    material_id: flat.material_id,
                });
            }
        }

        let mut spawned = BTreeMap::new();
        for k in 0..=layers {
            for (span, node) in self.spawned.iter() {
                let span: SmallVec<[usize; 8]> = span.iter().map(|n| lift(*n, k)).collect();
                spawned.insert(span, lift(*node, k));
            }
        }

        Ok(Mesh {
            dim: Dim::Three,
            nodes,
            cells,
            manifolds: self
                .manifolds
                .iter()
                .map(|(id, m)| (*id, m.extruded()))
                .collect(),
            spawned,
            conforming: self.conforming,
        })
    }

    /// Rotate every node (and manifold) by `angle` radians about a coordinate axis through the origin
    pub fn rotate(&mut self, angle: f64, axis: Axis) {
        let unit_axis: Unit<Vector3<f64>> = match axis {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        };
        let rotation = Rotation3::from_axis_angle(&unit_axis, angle);

        for node in self.nodes.iter_mut() {
            node.coords = (rotation * Vector3::from(node.coords)).into();
        }
        for manifold in self.manifolds.values_mut() {
            *manifold = manifold.rotated(&rotation);
        }
    }

    /// Move every node whose `axis` coordinate is within `tol` of `from` to `to`.
    ///
    /// Returns the number of nodes moved.
    pub fn shift_vertex_layer(&mut self, axis: Axis, from: f64, to: f64, tol: f64) -> usize {
        let mut moved = 0;
        for node in self.nodes.iter_mut() {
            if (node.coords[axis] - from).abs() < tol {
                node.coords[axis] = to;
                moved += 1;
            }
        }
        debug!("shifted {} nodes from {}={} to {}", moved, axis, from, to);
        moved
    }

    // ----------------------------------------------------------------------------------------------------
    // Internal bookkeeping
    // ----------------------------------------------------------------------------------------------------

    fn require_conforming(&self, operation: &str) -> Result<()> {
        if self.conforming {
            Ok(())
        } else {
            Err(GridError::DegenerateMeshOperation(format!(
                "{} requires a mesh without hanging nodes",
                operation
            )))
        }
    }

    /// Recompute which faces are on the boundary. Existing boundary records are kept,
    /// newly exposed faces get an unclassified record and shared faces lose theirs.
    fn refresh_boundary(&mut self) -> Result<()> {
        let mut face_counts: BTreeMap<SpanKey, usize> = BTreeMap::new();
        for cell in self.cells.iter() {
            for f in 0..self.dim.faces_per_cell() {
                *face_counts.entry(entity_key(&cell.face_nodes(f))).or_insert(0) += 1;
            }
        }

        if let Some((key, count)) = face_counts.iter().find(|(_, c)| **c > MAX_CELLS_PER_FACE) {
            return Err(GridError::DegenerateMeshOperation(format!(
                "face with nodes {:?} is shared by {} cells",
                key.as_slice(),
                count
            )));
        }

        for cell in self.cells.iter_mut() {
            for f in 0..self.dim.faces_per_cell() {
                let key = entity_key(&cell.face_nodes(f));
                if face_counts[&key] == 1 {
                    if cell.boundary[f].is_none() {
                        cell.boundary[f] = Some(FaceInfo::default());
                    }
                } else {
                    cell.boundary[f] = None;
                }
            }
        }

        Ok(())
    }

    /// Drop nodes no longer referenced by any cell and renumber the rest
    fn compact_nodes(&mut self) {
        let mut used = vec![false; self.nodes.len()];
        for cell in self.cells.iter() {
            for n in cell.nodes.iter() {
                used[*n] = true;
            }
        }

        let mut new_ids: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut node_id_tracker = IdTracker::new(0);
        let old_nodes = std::mem::take(&mut self.nodes);
        for node in old_nodes {
            if used[node.id] {
                let id = node_id_tracker.next_id();
                new_ids[node.id] = Some(id);
                self.nodes.push(Node::new(id, node.coords));
            }
        }

        for cell in self.cells.iter_mut() {
            for n in cell.nodes.iter_mut() {
                // every node of a remaining cell is in use
                *n = new_ids[*n].unwrap_or(*n);
            }
        }

        let old_spawned = std::mem::take(&mut self.spawned);
        for (span, node) in old_spawned {
            let span: Option<SmallVec<[usize; 8]>> = span.iter().map(|n| new_ids[*n]).collect();
            if let (Some(span), Some(node)) = (span, new_ids[node]) {
                self.spawned.insert(entity_key(&span), node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generators::subdivided_hyper_rectangle;
    use std::f64::consts::FRAC_PI_2;

    fn unit_square(reps: usize) -> Mesh {
        subdivided_hyper_rectangle(
            Dim::Two,
            &[reps, reps],
            Point::origin(),
            Point::xy(1.0, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn boundary_of_structured_square() {
        let mesh = unit_square(2);
        assert_eq!(mesh.n_cells(), 4);
        assert_eq!(mesh.n_nodes(), 9);
        assert_eq!(mesh.boundary_faces().count(), 8);
        assert_eq!(mesh.boundary_nodes().count(), 8);
    }

    #[test]
    fn global_refinement_shares_nodes() {
        let mut mesh = unit_square(2);
        mesh.refine_global(1).unwrap();
        assert_eq!(mesh.n_cells(), 16);
        assert_eq!(mesh.n_nodes(), 25);
        assert_eq!(mesh.boundary_faces().count(), 16);
        assert!(mesh.is_conforming());
    }

    #[test]
    fn children_inherit_boundary_records() {
        let mut mesh = unit_square(1);
        mesh.set_face_tag(0, 1, Tag::PlusX).unwrap();
        mesh.global_refinement(Refinement::Cut(Axis::Y)).unwrap();
        assert_eq!(mesh.n_cells(), 2);
        let plus_x = mesh
            .boundary_faces()
            .filter(|bf| bf.info.tag == Tag::PlusX)
            .count();
        assert_eq!(plus_x, 2);
        assert_eq!(mesh.boundary_faces().count(), 6);
    }

    #[test]
    fn local_refinement_leaves_hanging_nodes() {
        let mut mesh = unit_square(2);
        mesh.refine_cells(vec![0], Refinement::Isotropic).unwrap();
        assert_eq!(mesh.n_cells(), 7);
        assert!(!mesh.is_conforming());
        // refining the neighbour later reuses the hanging node on the shared edge
        let n_before = mesh.n_nodes();
        let neighbour = mesh
            .cells
            .iter()
            .map(|c| (c.id, c.level, mesh.cell_center(c.id)))
            .find(|(_, level, center)| *level == 0 && (center.x - 0.75).abs() < 1e-12 && center.y < 0.5)
            .map(|(id, _, _)| id)
            .unwrap();
        mesh.refine_cells(vec![neighbour], Refinement::Isotropic).unwrap();
        assert_eq!(mesh.n_nodes(), n_before + 4);
    }

    #[test]
    fn manifold_projection_on_refinement() {
        let mut mesh = unit_square(1);
        mesh.set_manifold(3, Manifold::spherical(Point::xy(0.5, -1.0)));
        mesh.set_face_manifold(0, 2, Some(3)).unwrap();
        mesh.refine_global(1).unwrap();

        let expected_radius = Point::xy(0.0, 0.0).dist(&Point::xy(0.5, -1.0));
        let bottom_mid = mesh
            .nodes
            .iter()
            .find(|n| (n.coords.x - 0.5).abs() < 1e-12 && n.coords.y < 0.5)
            .unwrap();
        assert!((bottom_mid.coords.dist(&Point::xy(0.5, -1.0)) - expected_radius).abs() < 1e-12);
        // the arc bulges away from the center below the square
        assert!(bottom_mid.coords.y > 0.1);
    }

    #[test]
    fn refine_non_existent() {
        let mut mesh = unit_square(1);
        assert!(matches!(
            mesh.refine_cells(vec![5], Refinement::Isotropic),
            Err(GridError::CellDoesntExist(5))
        ));
    }

    #[test]
    fn double_refinement() {
        let mut mesh = unit_square(2);
        assert!(matches!(
            mesh.execute_refinements(vec![(1, Refinement::Isotropic), (1, Refinement::Cut(Axis::X))]),
            Err(GridError::DoubleRefinement(1))
        ));
    }

    #[test]
    fn removal_exposes_new_boundary() {
        let mut mesh = unit_square(2);
        mesh.remove_cells(|_, pts| {
            let center = Point::centroid(pts.iter());
            center.x > 0.5 && center.y > 0.5
        })
        .unwrap();
        assert_eq!(mesh.n_cells(), 3);
        assert_eq!(mesh.n_nodes(), 8);
        assert_eq!(mesh.boundary_faces().count(), 8);
    }

    #[test]
    fn degenerate_removals() {
        let mut mesh = unit_square(2);
        assert!(matches!(
            mesh.remove_cells(|_, _| false),
            Err(GridError::DegenerateMeshOperation(_))
        ));
        assert!(matches!(
            mesh.remove_cells(|_, _| true),
            Err(GridError::DegenerateMeshOperation(_))
        ));
        mesh.refine_cells(vec![0], Refinement::Isotropic).unwrap();
        assert!(mesh.remove_cells(|c, _| c.id == 1).is_err());
    }

    #[test]
    fn merge_glues_shared_faces() {
        let left = unit_square(1);
        let right = subdivided_hyper_rectangle(
            Dim::Two,
            &[1, 1],
            Point::xy(1.0, 0.0),
            Point::xy(2.0, 1.0),
        )
        .unwrap();
        let merged = left.merge(right, 1e-12).unwrap();
        assert_eq!(merged.n_cells(), 2);
        assert_eq!(merged.n_nodes(), 6);
        assert_eq!(merged.boundary_faces().count(), 6);
    }

    #[test]
    fn extrusion_tags_caps() {
        let mut flat = unit_square(2);
        flat.set_face_tag(0, 0, Tag::MinusX).unwrap();
        let solid = flat.extrude(3, 1.5).unwrap();
        assert_eq!(solid.dim(), Dim::Three);
        assert_eq!(solid.n_cells(), 12);
        assert_eq!(solid.n_nodes(), 36);
        assert_eq!(solid.boundary_faces().filter(|bf| bf.info.tag == Tag::MinusZ).count(), 4);
        assert_eq!(solid.boundary_faces().filter(|bf| bf.info.tag == Tag::PlusZ).count(), 4);
        assert_eq!(solid.boundary_faces().filter(|bf| bf.info.tag == Tag::MinusX).count(), 3);
        assert_eq!(solid.boundary_faces().count(), 8 * 3 + 8);
        assert!((solid.nodes.iter().map(|n| n.coords.z).fold(0.0, f64::max) - 1.5).abs() < 1e-14);
    }

    #[test]
    fn rotation_and_layer_shift() {
        let mut mesh = unit_square(2);
        mesh.rotate(FRAC_PI_2, Axis::Z);
        assert!(mesh.nodes.iter().all(|n| n.coords.x <= 1e-12));

        let moved = mesh.shift_vertex_layer(Axis::Y, 0.5, 0.25, 1e-12);
        assert_eq!(moved, 3);
        assert!(mesh.nodes.iter().all(|n| (n.coords.y - 0.5).abs() > 1e-12));
    }
}
