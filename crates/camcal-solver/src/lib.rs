//! Joint calibration of a pinhole camera with Brown–Conrady distortion from
//! several views of a planar target.
//!
//! The solver follows the usual planar pipeline:
//! 1. per-view plane→image homographies (normalised DLT);
//! 2. closed-form focal lengths with the principal point fixed at the image
//!    centre and zero skew;
//! 3. per-view poses from homography decomposition;
//! 4. Levenberg–Marquardt over intrinsics, distortion and all poses.
//!
//! ```no_run
//! use camcal_core::{ImageSize, PatternSpec};
//! use camcal_solver::{calibrate_camera, SolverOptions};
//! # let image_points: Vec<Vec<nalgebra::Point2<f64>>> = Vec::new();
//!
//! let pattern = PatternSpec::default();
//! let object = vec![pattern.object_points(); image_points.len()];
//! let calib = calibrate_camera(
//!     &object,
//!     &image_points,
//!     ImageSize::new(640, 480),
//!     &SolverOptions::default(),
//! );
//! ```

mod calibrate;
mod init;
mod lm;
mod planar_pose;

pub use calibrate::{calibrate_camera, Calibration, SolveError};
pub use init::initial_intrinsics;
pub use lm::{levenberg_marquardt, LeastSquaresProblem, LmReport, LmTermination, SolverOptions};
pub use planar_pose::pose_from_homography;
