use crate::geometry::Point;
use thiserror::Error;

/// Result alias used by every grid-building operation
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors raised while building, notching or refining a grid
#[derive(Error, Debug)]
pub enum GridError {
    /// A notch description that cannot be carved into the body
    #[error("invalid notch geometry: {0}")]
    InvalidNotchGeometry(String),

    /// A boundary face that matched none of the classification tests
    #[error("boundary face {face} of cell {cell} (centroid {centroid}) could not be classified")]
    UnclassifiedBoundaryFace {
        cell: usize,
        face: usize,
        centroid: Point,
    },

    /// A mesh operation whose result would be empty, unchanged or ill-formed
    #[error("degenerate mesh operation: {0}")]
    DegenerateMeshOperation(String),

    #[error("cell {0} does not exist")]
    CellDoesntExist(usize),

    #[error("cell {0} was scheduled for refinement more than once")]
    DoubleRefinement(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] json::Error),
}
