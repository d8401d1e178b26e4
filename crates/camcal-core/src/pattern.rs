use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("chessboard needs at least 2x2 interior corners (got {cols}x{rows})")]
    TooSmall { cols: u32, rows: u32 },
    #[error("square size must be positive and finite (got {0})")]
    InvalidSquareSize(f64),
}

/// Physical chessboard geometry.
///
/// `cols` x `rows` counts *interior* corners, not squares. `square_size` is
/// the edge length of one square in millimetres; object points inherit that
/// unit, and so do the estimated translations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub cols: u32,
    pub rows: u32,
    pub square_size: f64,
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self {
            cols: 8,
            rows: 6,
            square_size: 28.0,
        }
    }
}

impl PatternSpec {
    pub fn new(cols: u32, rows: u32, square_size: f64) -> Result<Self, PatternError> {
        let spec = Self {
            cols,
            rows,
            square_size,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), PatternError> {
        if self.cols < 2 || self.rows < 2 {
            return Err(PatternError::TooSmall {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return Err(PatternError::InvalidSquareSize(self.square_size));
        }
        Ok(())
    }

    /// Number of interior corners on the board.
    pub fn corner_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Board corners on the `z = 0` plane, row-major: index `i * cols + j`
    /// is `(j * s, i * s, 0)`.
    pub fn object_points(&self) -> Vec<Point3<f64>> {
        let s = self.square_size;
        (0..self.rows)
            .flat_map(|i| (0..self.cols).map(move |j| Point3::new(j as f64 * s, i as f64 * s, 0.0)))
            .collect()
    }
}
