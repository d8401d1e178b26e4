use crate::CalibError;
use camcal_chessboard::ChessboardParams;
use camcal_core::PatternSpec;
use camcal_solver::SolverOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a calibration run needs, with the defaults of the classic
/// 8x6 / 28 mm board workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Folder holding the calibration images.
    pub source_dir: PathBuf,
    /// Folder receiving the rectified images.
    pub dest_dir: PathBuf,
    /// File name glob, e.g. `*.jpg`.
    pub pattern: String,
    /// Where the `K` / `D` parameter file is written.
    pub params_path: PathBuf,
    /// Optional JSON report with per-image results.
    pub report_path: Option<PathBuf>,
    /// Folder for corner overlays and rectified previews; defaults to
    /// `dest_dir/preview`.
    pub preview_dir: Option<PathBuf>,
    pub board: PatternSpec,
    /// Write preview images.
    pub show: bool,
    /// Write rectified images.
    pub save: bool,
    /// Process images on the rayon thread pool.
    pub parallel: bool,
    /// Edge length of the sub-pixel refinement window, in pixels.
    pub subpix_window: usize,
    pub detector: ChessboardParams,
    pub solver: SolverOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("images"),
            dest_dir: PathBuf::from("rectified"),
            pattern: "*.jpg".to_string(),
            params_path: PathBuf::from("rectified/intrinsics.json"),
            report_path: None,
            preview_dir: None,
            board: PatternSpec::default(),
            show: false,
            save: true,
            parallel: false,
            subpix_window: 5,
            detector: ChessboardParams::default(),
            solver: SolverOptions::default(),
        }
    }
}

impl CalibrationConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the preview output folder.
    pub fn preview_dir(&self) -> PathBuf {
        self.preview_dir
            .clone()
            .unwrap_or_else(|| self.dest_dir.join("preview"))
    }
}
