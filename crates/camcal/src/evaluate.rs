use camcal_core::{CameraModel, PoseEstimate};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Reprojection error of a calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionReport {
    /// Mean per-corner pixel distance, one entry per view.
    pub per_image: Vec<f64>,
    /// Unweighted mean of `per_image`: every view counts the same,
    /// whatever its number of corners.
    pub average: f64,
}

impl ReprojectionReport {
    pub fn from_per_image(per_image: Vec<f64>) -> Self {
        let average = if per_image.is_empty() {
            0.0
        } else {
            per_image.iter().sum::<f64>() / per_image.len() as f64
        };
        Self { per_image, average }
    }
}

/// Mean Euclidean distance between paired points.
pub fn mean_distance(projected: &[Point2<f64>], observed: &[Point2<f64>]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let total: f64 = projected
        .iter()
        .zip(observed)
        .map(|(p, q)| (p - q).norm())
        .sum();
    total / observed.len() as f64
}

/// Project `object_points[n]` through `poses[n]` and compare with
/// `image_points[n]` for every view.
pub fn reprojection_errors(
    model: &CameraModel,
    poses: &[PoseEstimate],
    object_points: &[Vec<Point3<f64>>],
    image_points: &[Vec<Point2<f64>>],
) -> ReprojectionReport {
    let per_image = poses
        .iter()
        .zip(object_points.iter().zip(image_points))
        .map(|(pose, (obj, img))| mean_distance(&model.project(pose, obj), img))
        .collect();
    ReprojectionReport::from_per_image(per_image)
}
