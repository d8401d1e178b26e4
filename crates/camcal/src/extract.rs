use crate::detect::{gray_view, CornerFinder};
use crate::preview::{draw_corners, save_preview};
use crate::CalibError;
use camcal_chessboard::{refine_corners_subpix, SubpixError};
use camcal_core::{ImageSize, PatternSpec};
use log::{info, warn};
use nalgebra::Point2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

const SUBPIX_MAX_ITERS: usize = 30;
const SUBPIX_EPS: f64 = 1e-3;

/// Why an image took no further part in the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The file could not be decoded as an image.
    Unreadable,
    /// The image size differs from the first decoded image.
    SizeMismatch,
    /// No complete chessboard was found.
    NoChessboard,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// An image whose chessboard was found, with refined corners in row-major
/// board order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptedView {
    pub path: PathBuf,
    pub corners: Vec<Point2<f64>>,
}

#[derive(Clone, Debug, Default)]
pub struct Extraction {
    /// Size of the first decoded image; `None` if nothing could be decoded.
    pub image_size: Option<ImageSize>,
    pub accepted: Vec<AcceptedView>,
    pub skipped: Vec<SkippedImage>,
}

#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Edge length of the sub-pixel search window.
    pub subpix_window: usize,
    pub parallel: bool,
    /// Write corner overlays here when set.
    pub preview_dir: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            subpix_window: 5,
            parallel: false,
            preview_dir: None,
        }
    }
}

enum ImageOutcome {
    Unreadable,
    /// Decoded, but not the expected size; detection was not attempted.
    WrongSize(ImageSize),
    Decoded {
        size: ImageSize,
        corners: Option<Vec<Point2<f64>>>,
    },
}

/// Detect and refine chessboard corners in every image of `paths`.
///
/// Images that cannot be decoded, whose size differs from the first decoded
/// image, or without a complete board are skipped with a warning. Accepted
/// views keep the order of `paths`, also when `parallel` is set.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = paths.len()))
)]
pub fn extract_corners<F: CornerFinder>(
    paths: &[PathBuf],
    pattern: &PatternSpec,
    finder: &F,
    opts: &ExtractOptions,
) -> Result<Extraction, CalibError> {
    if opts.subpix_window < 3 {
        return Err(SubpixError::InvalidWindow(opts.subpix_window).into());
    }
    let total = paths.len();
    let progress = |idx: usize, path: &Path| {
        info!("extracting corners {}/{}: {}", idx + 1, total, path.display());
    };

    let mut extraction = Extraction::default();
    if opts.parallel {
        // Header-only size of the first readable image lets workers skip
        // detection on odd-sized images; the fold below re-checks it.
        let hint = paths
            .iter()
            .find_map(|p| image::image_dimensions(p).ok())
            .map(|(w, h)| ImageSize::new(w, h));
        let outcomes: Vec<ImageOutcome> = paths
            .par_iter()
            .enumerate()
            .map(|(idx, path)| {
                progress(idx, path);
                process_image(path, hint, pattern, finder, opts)
            })
            .collect::<Result<_, _>>()?;
        for (path, outcome) in paths.iter().zip(outcomes) {
            let outcome = match outcome {
                ImageOutcome::WrongSize(size)
                    if extraction.image_size.is_none_or(|expected| expected == size) =>
                {
                    process_image(path, None, pattern, finder, opts)?
                }
                other => other,
            };
            classify(&mut extraction, path, outcome, opts);
        }
    } else {
        for (idx, path) in paths.iter().enumerate() {
            progress(idx, path);
            let outcome = process_image(path, extraction.image_size, pattern, finder, opts)?;
            classify(&mut extraction, path, outcome, opts);
        }
    }

    info!(
        "{} of {} image(s) accepted for calibration",
        extraction.accepted.len(),
        total
    );
    Ok(extraction)
}

/// Record one outcome; the first decoded image fixes the expected size.
fn classify(extraction: &mut Extraction, path: &Path, outcome: ImageOutcome, opts: &ExtractOptions) {
    let reason = match outcome {
        ImageOutcome::Unreadable => SkipReason::Unreadable,
        ImageOutcome::WrongSize(_) => SkipReason::SizeMismatch,
        ImageOutcome::Decoded { size, corners } => {
            let expected = *extraction.image_size.get_or_insert(size);
            match corners {
                _ if size != expected => SkipReason::SizeMismatch,
                None => SkipReason::NoChessboard,
                Some(corners) => {
                    if let Some(dir) = &opts.preview_dir {
                        write_corner_preview(path, &corners, dir);
                    }
                    extraction.accepted.push(AcceptedView {
                        path: path.to_path_buf(),
                        corners,
                    });
                    return;
                }
            }
        }
    };

    match reason {
        SkipReason::Unreadable => warn!("{}: cannot read image, skipped", path.display()),
        SkipReason::SizeMismatch => warn!(
            "{}: image size differs from {}, skipped",
            path.display(),
            extraction.image_size.map(|s| s.to_string()).unwrap_or_default()
        ),
        SkipReason::NoChessboard => {
            warn!("{}: chessboard not found, skipped", path.display())
        }
    }
    extraction.skipped.push(SkippedImage {
        path: path.to_path_buf(),
        reason,
    });
}

/// Overlay for an accepted view. Failures are logged only.
fn write_corner_preview(path: &Path, corners: &[Point2<f64>], dir: &Path) {
    let result = image::open(path)
        .map_err(|source| CalibError::Read {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|img| {
            let overlay = image::DynamicImage::ImageRgb8(draw_corners(&img.to_luma8(), corners));
            save_preview(&overlay, dir, path, "corners")
        });
    if let Err(err) = result {
        warn!("{err}");
    }
}

fn process_image<F: CornerFinder>(
    path: &Path,
    expected: Option<ImageSize>,
    pattern: &PatternSpec,
    finder: &F,
    opts: &ExtractOptions,
) -> Result<ImageOutcome, CalibError> {
    let img = match image::open(path) {
        Ok(img) => img.to_luma8(),
        Err(err) => {
            log::debug!("{}: {err}", path.display());
            return Ok(ImageOutcome::Unreadable);
        }
    };
    let size = ImageSize::new(img.width(), img.height());
    if expected.is_some_and(|e| e != size) {
        return Ok(ImageOutcome::WrongSize(size));
    }

    let Some(mut corners) = finder.find_corners(&img, pattern) else {
        return Ok(ImageOutcome::Decoded {
            size,
            corners: None,
        });
    };
    if corners.len() != pattern.corner_count() {
        warn!(
            "{}: detector returned {} corners, expected {}",
            path.display(),
            corners.len(),
            pattern.corner_count()
        );
        return Ok(ImageOutcome::Decoded {
            size,
            corners: None,
        });
    }

    refine_corners_subpix(
        &gray_view(&img),
        &mut corners,
        opts.subpix_window,
        SUBPIX_MAX_ITERS,
        SUBPIX_EPS,
    )?;

    Ok(ImageOutcome::Decoded {
        size,
        corners: Some(corners),
    })
}
