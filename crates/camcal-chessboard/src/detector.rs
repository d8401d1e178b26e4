use crate::gridgraph::{assign_grid_coordinates, connected_components, GridGraph};
use crate::params::ChessboardParams;
use camcal_core::{Corner, PatternSpec};
use log::{debug, info};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Interior corners of a detected board, row-major (`idx = row * cols + col`).
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    pub cols: u32,
    pub rows: u32,
    pub corners: Vec<Point2<f32>>,
    /// Median distance between adjacent corners, in pixels.
    pub spacing: f32,
}

/// Chessboard detector: assembles raw ChESS corners into a complete grid.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self { params }
    }

    /// Find the complete `cols × rows` interior-corner grid among `corners`.
    ///
    /// Returns `None` unless every interior corner was found; partial boards
    /// are not reported.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, corners, pattern), fields(num_corners = corners.len()))
    )]
    pub fn detect_from_corners(
        &self,
        corners: &[Corner],
        pattern: &PatternSpec,
    ) -> Option<ChessboardDetection> {
        let expected = pattern.corner_count();

        // 1. Filter by strength.
        let max_strength = corners
            .iter()
            .map(|c| c.strength)
            .fold(f32::NEG_INFINITY, f32::max);
        let min_strength = self.params.min_strength_rel * max_strength.max(0.0);
        let strong: Vec<Corner> = corners
            .iter()
            .filter(|c| c.strength >= min_strength)
            .cloned()
            .collect();

        debug!(
            "{} of {} raw ChESS corners pass the strength filter",
            strong.len(),
            corners.len()
        );

        if strong.len() < expected {
            debug!("too few corners for a {}x{} board", pattern.cols, pattern.rows);
            return None;
        }

        // 2. Neighbor graph.
        let Some(graph) = GridGraph::new(&strong, &self.params.graph) else {
            debug!("failed to build the corner graph");
            return None;
        };

        // 3. Components that can hold the full board.
        let mut components = connected_components(&graph);
        components.retain(|c| c.len() == expected);
        debug!("{} component(s) with {} corners", components.len(), expected);

        for component in components {
            let Some(coords) = assign_grid_coordinates(&graph, &component) else {
                debug!("component with inconsistent grid coordinates rejected");
                continue;
            };
            if let Some(ordered) = order_grid(&strong, &coords, pattern) {
                info!(
                    "chessboard {}x{} found, spacing {:.1}px",
                    pattern.cols, pattern.rows, graph.base_spacing
                );
                return Some(ChessboardDetection {
                    cols: pattern.cols,
                    rows: pattern.rows,
                    corners: ordered,
                    spacing: graph.base_spacing,
                });
            }
        }

        None
    }
}

/// Lay out BFS grid coordinates as a row-major `cols × rows` array.
///
/// A board seen with its axes swapped is rotated by a quarter turn so the
/// object frame stays right-handed.
fn order_grid(
    corners: &[Corner],
    coords: &[(usize, i32, i32)],
    pattern: &PatternSpec,
) -> Option<Vec<Point2<f32>>> {
    let min_i = coords.iter().map(|&(_, i, _)| i).min()?;
    let min_j = coords.iter().map(|&(_, _, j)| j).min()?;
    let width = (coords.iter().map(|&(_, i, _)| i).max()? - min_i + 1) as u32;
    let height = (coords.iter().map(|&(_, _, j)| j).max()? - min_j + 1) as u32;

    let (cols, rows) = (pattern.cols, pattern.rows);
    let swapped = if (width, height) == (cols, rows) {
        false
    } else if (width, height) == (rows, cols) {
        true
    } else {
        debug!(
            "component spans {}x{}, expected {}x{}",
            width, height, cols, rows
        );
        return None;
    };

    let mut grid: Vec<Option<Point2<f32>>> = vec![None; pattern.corner_count()];
    for &(node, i, j) in coords {
        let (i, j) = ((i - min_i) as u32, (j - min_j) as u32);
        let (col, row) = if swapped { (j, rows - 1 - i) } else { (i, j) };
        let slot = grid.get_mut((row * cols + col) as usize)?;
        if slot.is_some() {
            return None;
        }
        *slot = Some(corners[node].position);
    }

    grid.into_iter().collect()
}
