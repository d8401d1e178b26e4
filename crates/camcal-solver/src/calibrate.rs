use crate::init::initial_intrinsics;
use crate::lm::{levenberg_marquardt, LeastSquaresProblem, LmTermination, SolverOptions};
use crate::planar_pose::pose_from_homography;
use camcal_core::{
    estimate_homography, CameraModel, Distortion, Homography, ImageSize, Intrinsics, PoseEstimate,
};
use log::{debug, info};
use nalgebra::{DMatrix, DVector, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveError {
    #[error("not enough views: {found} usable, at least {required} required")]
    NotEnoughViews { found: usize, required: usize },
    #[error("{object} object point sets but {image} image point sets")]
    ViewCountMismatch { object: usize, image: usize },
    #[error("view {view}: {object_points} object points but {image_points} image points")]
    MismatchedView {
        view: usize,
        object_points: usize,
        image_points: usize,
    },
    #[error("view {view}: {count} points, at least 4 required")]
    TooFewPoints { view: usize, count: usize },
    #[error("degenerate configuration: {0}")]
    Degenerate(&'static str),
}

/// Result of a joint calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    pub model: CameraModel,
    /// One pose per input view, in input order.
    pub poses: Vec<PoseEstimate>,
    /// Root mean squared reprojection error over all points, in pixels.
    pub rms: f64,
    pub iterations: usize,
    pub termination: LmTermination,
    /// The optimiser stopped at a minimum, not on a limit or a stall.
    pub converged: bool,
}

const NUM_INTRINSICS: usize = 9;
const NUM_POSE: usize = 6;

/// Parameter layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by
/// `[rvec, tvec]` per view.
struct PlanarCalibProblem<'a> {
    object: &'a [Vec<Point3<f64>>],
    image: &'a [Vec<Point2<f64>>],
    /// First residual row of each view.
    offsets: Vec<usize>,
    num_residuals: usize,
}

impl<'a> PlanarCalibProblem<'a> {
    fn new(object: &'a [Vec<Point3<f64>>], image: &'a [Vec<Point2<f64>>]) -> Self {
        let mut offsets = Vec::with_capacity(image.len());
        let mut acc = 0;
        for view in image {
            offsets.push(acc);
            acc += 2 * view.len();
        }
        Self {
            object,
            image,
            offsets,
            num_residuals: acc,
        }
    }

    fn pack(model: &CameraModel, poses: &[PoseEstimate]) -> DVector<f64> {
        let k = &model.intrinsics;
        let d = model.distortion.to_array();
        let mut x = DVector::<f64>::zeros(NUM_INTRINSICS + NUM_POSE * poses.len());
        x.as_mut_slice()[..4].copy_from_slice(&[k.fx, k.fy, k.cx, k.cy]);
        x.as_mut_slice()[4..NUM_INTRINSICS].copy_from_slice(&d);
        for (v, pose) in poses.iter().enumerate() {
            let base = NUM_INTRINSICS + NUM_POSE * v;
            x.as_mut_slice()[base..base + 3].copy_from_slice(pose.rvec.as_slice());
            x.as_mut_slice()[base + 3..base + 6].copy_from_slice(pose.tvec.as_slice());
        }
        x
    }

    fn model(x: &DVector<f64>) -> CameraModel {
        CameraModel::new(
            Intrinsics {
                fx: x[0],
                fy: x[1],
                cx: x[2],
                cy: x[3],
            },
            Distortion::from_array([x[4], x[5], x[6], x[7], x[8]]),
        )
    }

    fn pose(x: &DVector<f64>, view: usize) -> PoseEstimate {
        let b = NUM_INTRINSICS + NUM_POSE * view;
        PoseEstimate::new(
            Vector3::new(x[b], x[b + 1], x[b + 2]),
            Vector3::new(x[b + 3], x[b + 4], x[b + 5]),
        )
    }

    fn view_residuals(&self, model: &CameraModel, pose: &PoseEstimate, view: usize, out: &mut [f64]) {
        let projected = model.project(pose, &self.object[view]);
        for (k, (p, q)) in projected.iter().zip(&self.image[view]).enumerate() {
            out[2 * k] = p.x - q.x;
            out[2 * k + 1] = p.y - q.y;
        }
    }

    fn view_rows(&self, view: usize) -> std::ops::Range<usize> {
        let start = self.offsets[view];
        start..start + 2 * self.image[view].len()
    }
}

fn step_size(value: f64) -> f64 {
    1e-6 * value.abs().max(1.0)
}

impl LeastSquaresProblem for PlanarCalibProblem<'_> {
    fn num_residuals(&self) -> usize {
        self.num_residuals
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let model = Self::model(params);
        for view in 0..self.image.len() {
            let pose = Self::pose(params, view);
            let rows = self.view_rows(view);
            self.view_residuals(&model, &pose, view, &mut out.as_mut_slice()[rows]);
        }
    }

    /// Central differences. Intrinsics touch every row; a pose only touches
    /// the rows of its own view.
    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>) {
        out.fill(0.0);
        let mut plus = DVector::<f64>::zeros(self.num_residuals);
        let mut minus = DVector::<f64>::zeros(self.num_residuals);
        let mut x = params.clone();

        for c in 0..NUM_INTRINSICS {
            let h = step_size(params[c]);
            x[c] = params[c] + h;
            self.residuals(&x, &mut plus);
            x[c] = params[c] - h;
            self.residuals(&x, &mut minus);
            x[c] = params[c];
            out.set_column(c, &((&plus - &minus) / (2.0 * h)));
        }

        let model = Self::model(params);
        for view in 0..self.image.len() {
            let rows = self.view_rows(view);
            let len = rows.len();
            let mut rp = vec![0.0; len];
            let mut rm = vec![0.0; len];
            for k in 0..NUM_POSE {
                let c = NUM_INTRINSICS + NUM_POSE * view + k;
                let h = step_size(params[c]);
                x[c] = params[c] + h;
                self.view_residuals(&model, &Self::pose(&x, view), view, &mut rp);
                x[c] = params[c] - h;
                self.view_residuals(&model, &Self::pose(&x, view), view, &mut rm);
                x[c] = params[c];
                for (r, row) in rows.clone().enumerate() {
                    out[(row, c)] = (rp[r] - rm[r]) / (2.0 * h);
                }
            }
        }
    }
}

fn validate(
    object: &[Vec<Point3<f64>>],
    image: &[Vec<Point2<f64>>],
    opts: &SolverOptions,
) -> Result<(), SolveError> {
    if object.len() != image.len() {
        return Err(SolveError::ViewCountMismatch {
            object: object.len(),
            image: image.len(),
        });
    }
    let required = opts.min_views.max(1);
    if image.len() < required {
        return Err(SolveError::NotEnoughViews {
            found: image.len(),
            required,
        });
    }
    for (view, (obj, img)) in object.iter().zip(image).enumerate() {
        if obj.len() != img.len() {
            return Err(SolveError::MismatchedView {
                view,
                object_points: obj.len(),
                image_points: img.len(),
            });
        }
        if img.len() < 4 {
            return Err(SolveError::TooFewPoints {
                view,
                count: img.len(),
            });
        }
    }
    Ok(())
}

/// Jointly estimate intrinsics, distortion and one pose per view.
///
/// `object_points[n]` lie on the `z = 0` plane of the board and correspond
/// index by index to `image_points[n]`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(object_points, image_points, opts), fields(views = image_points.len()))
)]
pub fn calibrate_camera(
    object_points: &[Vec<Point3<f64>>],
    image_points: &[Vec<Point2<f64>>],
    image_size: ImageSize,
    opts: &SolverOptions,
) -> Result<Calibration, SolveError> {
    validate(object_points, image_points, opts)?;

    let homographies = object_points
        .iter()
        .zip(image_points)
        .map(|(obj, img)| {
            let plane: Vec<Point2<f64>> = obj.iter().map(|p| Point2::new(p.x, p.y)).collect();
            estimate_homography(&plane, img)
        })
        .collect::<Option<Vec<Homography>>>()
        .ok_or(SolveError::Degenerate("homography estimation failed"))?;

    let intrinsics = initial_intrinsics(&homographies, image_size)
        .ok_or(SolveError::Degenerate("views do not constrain the focal length"))?;
    debug!(
        "initial intrinsics: fx {:.2}, fy {:.2}, cx {:.2}, cy {:.2}",
        intrinsics.fx, intrinsics.fy, intrinsics.cx, intrinsics.cy
    );

    let poses = homographies
        .iter()
        .map(|h| pose_from_homography(&intrinsics, h))
        .collect::<Option<Vec<PoseEstimate>>>()
        .ok_or(SolveError::Degenerate("pose initialisation failed"))?;

    let problem = PlanarCalibProblem::new(object_points, image_points);
    let mut params = PlanarCalibProblem::pack(&CameraModel::new(intrinsics, Distortion::zero()), &poses);
    let report = levenberg_marquardt(&problem, &mut params, opts);

    if !report.cost.is_finite() || params.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::Degenerate("non-finite solution"));
    }
    if params[0] <= 0.0 || params[1] <= 0.0 {
        return Err(SolveError::Degenerate("non-positive focal length"));
    }

    let total_points: usize = image_points.iter().map(Vec::len).sum();
    let rms = (report.cost / total_points as f64).sqrt();
    info!(
        "calibration finished after {} iterations ({:?}), rms {:.4}px",
        report.iterations, report.termination, rms
    );

    Ok(Calibration {
        model: PlanarCalibProblem::model(&params),
        poses: (0..image_points.len())
            .map(|v| PlanarCalibProblem::pose(&params, v))
            .collect(),
        rms,
        iterations: report.iterations,
        termination: report.termination,
        converged: report.converged,
    })
}
