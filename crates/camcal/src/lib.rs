//! Camera intrinsic calibration from a folder of chessboard photographs.
//!
//! The pipeline is strictly linear:
//! 1. [`list_images`] enumerates the calibration images;
//! 2. [`extract_corners`] finds and refines the chessboard corners, skipping
//!    images that cannot be read or show no complete board;
//! 3. [`calibrate_camera`] estimates the shared camera matrix, distortion and
//!    one pose per accepted image;
//! 4. [`reprojection_errors`] reports per-image and average error;
//! 5. the parameters are saved as [`CameraParams`] and every accepted image
//!    is undistorted with [`rectify_images`].
//!
//! [`run_pipeline`] chains all stages from a [`CalibrationConfig`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use camcal::{run_pipeline, CalibrationConfig, ChessCornerFinder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::default();
//! let finder = ChessCornerFinder::new(config.detector.clone());
//! let out = run_pipeline(&config, &finder)?;
//! println!("average error: {:.4}px", out.reprojection.average);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camcal::core`: pattern geometry, camera model, homographies, logging.
//! - `camcal::chessboard`: chessboard grid detection and sub-pixel refinement.
//! - `camcal::solver`: closed-form initialisation and LM calibration.

pub use camcal_chessboard as chessboard;
pub use camcal_core as core;
pub use camcal_solver as solver;

pub use camcal_core::{CameraModel, Distortion, ImageSize, Intrinsics, PatternSpec, PoseEstimate};
pub use camcal_solver::{calibrate_camera, Calibration, SolveError, SolverOptions};

mod config;
pub mod detect;
mod error;
mod evaluate;
mod extract;
mod loader;
mod params_io;
mod pipeline;
pub mod preview;
pub mod rectify;
mod report;

pub use config::CalibrationConfig;
pub use detect::{ChessCornerFinder, CornerFinder};
pub use error::CalibError;
pub use evaluate::{mean_distance, reprojection_errors, ReprojectionReport};
pub use extract::{extract_corners, AcceptedView, ExtractOptions, Extraction, SkipReason, SkippedImage};
pub use loader::list_images;
pub use params_io::CameraParams;
pub use pipeline::{rectify_folder, run_pipeline, PipelineOutput};
pub use rectify::{rectify_images, undistort_image, RectifyOptions};
pub use report::{CalibrationReport, ViewReport};
