//! Core types and utilities for chessboard camera calibration.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, solver or image codec: the
//! detector, solver and pipeline crates all speak in terms of the types
//! defined here.

mod camera;
mod corner;
mod homography;
mod image;
mod logger;
mod pattern;

pub use camera::{CameraModel, Distortion, ImageSize, Intrinsics, PoseEstimate};
pub use corner::Corner;
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImageView};
pub use pattern::{PatternError, PatternSpec};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, LOG_ENV};
