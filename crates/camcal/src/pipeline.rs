use crate::detect::CornerFinder;
use crate::evaluate::{reprojection_errors, ReprojectionReport};
use crate::extract::{extract_corners, ExtractOptions, Extraction};
use crate::loader::list_images;
use crate::rectify::{rectify_images, RectifyOptions};
use crate::report::{CalibrationReport, ViewReport};
use crate::{CalibError, CalibrationConfig, CameraParams};
use camcal_core::ImageSize;
use camcal_solver::{calibrate_camera, Calibration, SolveError};
use log::info;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Everything a calibration run produced.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub extraction: Extraction,
    /// Poses are index-aligned with `extraction.accepted`.
    pub calibration: Calibration,
    pub reprojection: ReprojectionReport,
    pub params: CameraParams,
    /// Rectified images written to `dest_dir`.
    pub rectified: Vec<PathBuf>,
}

/// Run load → extract → calibrate → evaluate → rectify.
///
/// Per-image failures only shrink the set of views; the run fails when fewer
/// than `solver.min_views` views remain, when the solver fails, or when an
/// output cannot be written.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn run_pipeline<F: CornerFinder>(
    config: &CalibrationConfig,
    finder: &F,
) -> Result<PipelineOutput, CalibError> {
    config.board.validate()?;
    let preview_dir = config.show.then(|| config.preview_dir());

    info!("== loading images ==");
    let paths = list_images(&config.source_dir, &config.pattern)?;
    info!(
        "{} image(s) matching {:?} in {}",
        paths.len(),
        config.pattern,
        config.source_dir.display()
    );

    info!("== extracting corners ==");
    let extraction = extract_corners(
        &paths,
        &config.board,
        finder,
        &ExtractOptions {
            subpix_window: config.subpix_window,
            parallel: config.parallel,
            preview_dir: preview_dir.clone(),
        },
    )?;

    info!("== calibrating ==");
    let Some(image_size) = extraction.image_size.filter(|_| !extraction.accepted.is_empty()) else {
        return Err(SolveError::NotEnoughViews {
            found: 0,
            required: config.solver.min_views.max(1),
        }
        .into());
    };
    let object_points = vec![config.board.object_points(); extraction.accepted.len()];
    let image_points: Vec<_> = extraction
        .accepted
        .iter()
        .map(|v| v.corners.clone())
        .collect();
    let calibration = calibrate_camera(&object_points, &image_points, image_size, &config.solver)?;

    info!("== evaluating ==");
    let reprojection = reprojection_errors(
        &calibration.model,
        &calibration.poses,
        &object_points,
        &image_points,
    );
    for (view, error) in extraction.accepted.iter().zip(&reprojection.per_image) {
        info!("{}: reprojection error {:.5}px", view.path.display(), error);
    }
    info!("average reprojection error: {:.5}px", reprojection.average);
    log_results(&calibration, &extraction);

    let params = CameraParams::from_model(&calibration.model)
        .with_image_size(image_size)
        .with_average_error(reprojection.average);
    params.write_json(&config.params_path)?;
    info!("camera parameters written to {}", config.params_path.display());

    if let Some(report_path) = &config.report_path {
        build_report(image_size, &params, &calibration, &reprojection, &extraction).write_json(report_path)?;
        info!("report written to {}", report_path.display());
    }

    info!("== rectifying ==");
    let accepted_paths: Vec<PathBuf> = extraction.accepted.iter().map(|v| v.path.clone()).collect();
    let rectified = rectify_images(
        &accepted_paths,
        &calibration.model,
        &RectifyOptions {
            dest_dir: config.dest_dir.clone(),
            save: config.save,
            preview_dir,
            parallel: config.parallel,
        },
    )?;
    info!("== done ==");

    Ok(PipelineOutput {
        extraction,
        calibration,
        reprojection,
        params,
        rectified,
    })
}

/// Undistort every image in `source_dir` matching `pattern` with saved
/// parameters.
pub fn rectify_folder(
    params: &CameraParams,
    source_dir: &Path,
    pattern: &str,
    opts: &RectifyOptions,
) -> Result<Vec<PathBuf>, CalibError> {
    params.validate()?;
    let paths = list_images(source_dir, pattern)?;
    info!(
        "{} image(s) matching {:?} in {}",
        paths.len(),
        pattern,
        source_dir.display()
    );
    rectify_images(&paths, &params.model(), opts)
}

fn log_results(calibration: &Calibration, extraction: &Extraction) {
    let k = calibration.model.intrinsics.matrix();
    info!("K = [{:.6}, {:.6}, {:.6};", k[(0, 0)], k[(0, 1)], k[(0, 2)]);
    info!("     {:.6}, {:.6}, {:.6};", k[(1, 0)], k[(1, 1)], k[(1, 2)]);
    info!("     {:.6}, {:.6}, {:.6}]", k[(2, 0)], k[(2, 1)], k[(2, 2)]);
    info!("D = {:?}", calibration.model.distortion.to_array());
    for (view, pose) in extraction.accepted.iter().zip(&calibration.poses) {
        info!(
            "{}: rvec [{:.6}, {:.6}, {:.6}], tvec [{:.4}, {:.4}, {:.4}]",
            view.path.display(),
            pose.rvec.x,
            pose.rvec.y,
            pose.rvec.z,
            pose.tvec.x,
            pose.tvec.y,
            pose.tvec.z
        );
    }
}

fn build_report(
    image_size: ImageSize,
    params: &CameraParams,
    calibration: &Calibration,
    reprojection: &ReprojectionReport,
    extraction: &Extraction,
) -> CalibrationReport {
    CalibrationReport {
        image_size,
        camera: params.clone(),
        rms: calibration.rms,
        iterations: calibration.iterations,
        termination: calibration.termination,
        converged: calibration.converged,
        views: extraction
            .accepted
            .iter()
            .zip(&calibration.poses)
            .zip(&reprojection.per_image)
            .map(|((view, pose), &error)| ViewReport {
                path: view.path.clone(),
                error,
                rvec: pose.rvec.into(),
                tvec: pose.tvec.into(),
            })
            .collect(),
        average_error: reprojection.average,
        skipped: extraction.skipped.clone(),
    }
}
