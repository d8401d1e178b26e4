use crate::{CalibError, CameraParams, SkippedImage};
use camcal_core::ImageSize;
use camcal_solver::LmTermination;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of one accepted view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewReport {
    pub path: PathBuf,
    /// Mean reprojection error of this view, in pixels.
    pub error: f64,
    pub rvec: [f64; 3],
    pub tvec: [f64; 3],
}

/// Full calibration report, written when `report_path` is configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub image_size: ImageSize,
    pub camera: CameraParams,
    /// Root mean squared error over all corners at the solver optimum.
    pub rms: f64,
    pub iterations: usize,
    pub termination: LmTermination,
    pub converged: bool,
    pub views: Vec<ViewReport>,
    /// Unweighted mean of the per-view errors.
    pub average_error: f64,
    pub skipped: Vec<SkippedImage>,
}

impl CalibrationReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CalibError::write(parent, e))?;
        }
        fs::write(path, json).map_err(|e| CalibError::write(path, e))
    }
}
