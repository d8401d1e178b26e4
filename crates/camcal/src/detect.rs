use camcal_chessboard::{ChessboardDetector, ChessboardParams};
use camcal_core::{Corner, GrayImageView, PatternSpec};
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
use log::warn;
use nalgebra::Point2;
use std::f32::consts::PI;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Finds the interior corners of a chessboard in a grayscale image.
///
/// Implementations return exactly `pattern.corner_count()` points in
/// row-major order, or `None` when the board is not fully visible.
pub trait CornerFinder: Sync {
    fn find_corners(
        &self,
        img: &image::GrayImage,
        pattern: &PatternSpec,
    ) -> Option<Vec<Point2<f64>>>;
}

/// ChESS corners from `chess-corners`, assembled by [`ChessboardDetector`].
pub struct ChessCornerFinder {
    chess: ChessConfig,
    detector: ChessboardDetector,
}

impl ChessCornerFinder {
    pub fn new(params: ChessboardParams) -> Self {
        let mut chess = ChessConfig::single_scale();
        chess.threshold_mode = ThresholdMode::Relative;
        chess.threshold_value = params.threshold_rel;
        chess.nms_radius = params.nms_radius;
        Self {
            chess,
            detector: ChessboardDetector::new(params),
        }
    }
}

impl Default for ChessCornerFinder {
    fn default() -> Self {
        Self::new(ChessboardParams::default())
    }
}

impl CornerFinder for ChessCornerFinder {
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img, pattern), fields(width = img.width(), height = img.height()))
    )]
    fn find_corners(
        &self,
        img: &image::GrayImage,
        pattern: &PatternSpec,
    ) -> Option<Vec<Point2<f64>>> {
        let corners = detect_corners(img, &self.chess);
        let detection = self.detector.detect_from_corners(&corners, pattern)?;
        Some(
            detection
                .corners
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect(),
        )
    }
}

/// Borrow an `image::GrayImage` as a [`GrayImageView`].
pub fn gray_view(img: &image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Detect raw ChESS corners and adapt them into [`Corner`].
///
/// A detector failure is logged and treated as an image without corners.
pub fn detect_corners(img: &image::GrayImage, cfg: &ChessConfig) -> Vec<Corner> {
    match find_chess_corners_image(img, cfg) {
        Ok(found) => found.iter().map(adapt_chess_corner).collect(),
        Err(err) => {
            warn!("ChESS detection failed: {err}");
            Vec::new()
        }
    }
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner::new(c.x, c.y, dark_sector_bisector(c), c.response)
}

/// Direction of the dark diagonal, modulo π.
///
/// The sector swept from `axes[0]` to `axes[1]` is dark, so its bisector
/// turns by a quarter turn between adjacent board corners.
fn dark_sector_bisector(c: &CornerDescriptor) -> f32 {
    (0.5 * (c.axes[0].angle + c.axes[1].angle)).rem_euclid(PI)
}
