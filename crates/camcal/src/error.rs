use camcal_chessboard::SubpixError;
use camcal_core::PatternError;
use camcal_solver::SolveError;
use std::path::PathBuf;

/// Errors that abort a calibration or rectification run.
///
/// Per-image problems during corner extraction are not errors; they are
/// reported as [`crate::SkippedImage`] entries.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid file name pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("invalid board: {0}")]
    Board(#[from] PatternError),

    #[error(transparent)]
    Subpix(#[from] SubpixError),

    #[error("calibration failed: {0}")]
    Solve(#[from] SolveError),

    #[error("invalid camera parameters: {0}")]
    InvalidParams(String),

    #[error("failed to read image {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CalibError {
    pub(crate) fn write(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Write {
            path: path.into(),
            source: source.into(),
        }
    }
}
