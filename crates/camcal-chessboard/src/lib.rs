//! Chessboard detection on top of raw ChESS corners, plus sub-pixel
//! refinement of the detected interior corners.
//!
//! ## Quickstart
//!
//! ```
//! use camcal_chessboard::{ChessboardDetector, ChessboardParams};
//! use camcal_core::{Corner, PatternSpec};
//!
//! let detector = ChessboardDetector::new(ChessboardParams::default());
//! let pattern = PatternSpec::new(8, 6, 28.0).unwrap();
//!
//! let corners: Vec<Corner> = Vec::new();
//! let result = detector.detect_from_corners(&corners, &pattern);
//! println!("detected: {}", result.is_some());
//! ```
//!
//! Algorithm (graph-based):
//! 1. Filter ChESS corners by relative strength.
//! 2. Estimate a base spacing from nearest-neighbor distances.
//! 3. Estimate the dominant grid axis from nearest-neighbor edges.
//! 4. For each corner, keep up to 4 neighbors (right/left/up/down) whose
//!    distance is close to the base spacing, whose edge follows a grid axis
//!    and whose orientation is orthogonal to the corner's own.
//! 5. Drop edges not confirmed from both ends.
//! 6. BFS each connected component and assign integer coordinates (i, j).
//! 7. Accept the component that is exactly the expected `cols × rows`
//!    (up to a quarter turn) and emit its corners in row-major order.

mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{
    assign_grid_coordinates, connected_components, GridGraph, NeighborDirection, NodeNeighbor,
};
pub use params::{ChessboardParams, GridGraphParams};
pub use subpix::{refine_corners_subpix, SubpixError};
