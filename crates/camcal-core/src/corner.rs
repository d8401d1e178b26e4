use nalgebra::Point2;

/// Raw chessboard corner candidate, as produced by a ChESS-style detector.
#[derive(Clone, Debug)]
pub struct Corner {
    /// Corner position in pixel coordinates.
    pub position: Point2<f32>,

    /// Dominant orientation at the corner, in radians.
    ///
    /// Defined modulo π because chessboard axes are undirected.
    pub orientation: f32,

    /// Detector response.
    pub strength: f32,
}

impl Corner {
    pub fn new(x: f32, y: f32, orientation: f32, strength: f32) -> Self {
        Self {
            position: Point2::new(x, y),
            orientation,
            strength,
        }
    }
}
