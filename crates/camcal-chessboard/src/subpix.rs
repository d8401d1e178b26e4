//! Sub-pixel corner refinement.
//!
//! For a saddle point `p` every image gradient `g(q)` in its neighborhood is
//! orthogonal to `q - p`, so `p` is the least-squares solution of
//! `Σ w g gᵀ p = Σ w g gᵀ q` over the search window.

use camcal_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubpixError {
    #[error("sub-pixel search window must be at least 3 pixels, got {0}")]
    InvalidWindow(usize),
}

/// Refine `corners` in place.
///
/// `window` is the edge length of the square search window in pixels (odd
/// values are centred exactly; an even value uses `window / 2` as radius).
/// A corner whose neighborhood carries no usable gradient is left unchanged,
/// and a corner is never moved further than the window radius from its start.
pub fn refine_corners_subpix(
    view: &GrayImageView<'_>,
    corners: &mut [Point2<f64>],
    window: usize,
    max_iters: usize,
    eps: f64,
) -> Result<(), SubpixError> {
    if window < 3 {
        return Err(SubpixError::InvalidWindow(window));
    }
    let radius = (window / 2) as i64;
    let sigma = radius as f64;
    let max_x = view.width as f64 - 2.0;
    let max_y = view.height as f64 - 2.0;

    let sample = |x: f64, y: f64| sample_bilinear(view, x as f32, y as f32) as f64;

    for corner in corners.iter_mut() {
        let start = *corner;
        let mut p = start;

        for _ in 0..max_iters {
            let mut a = Matrix2::<f64>::zeros();
            let mut b = Vector2::<f64>::zeros();

            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    let x = p.x + dx as f64;
                    let y = p.y + dy as f64;
                    // Central differences need both neighbors.
                    if x < 1.0 || y < 1.0 || x > max_x || y > max_y {
                        continue;
                    }
                    let g = Vector2::new(
                        0.5 * (sample(x + 1.0, y) - sample(x - 1.0, y)),
                        0.5 * (sample(x, y + 1.0) - sample(x, y - 1.0)),
                    );
                    let weight =
                        (-((dx * dx + dy * dy) as f64) / (2.0 * sigma * sigma)).exp();
                    let ggt = weight * g * g.transpose();
                    a += ggt;
                    b += ggt * Vector2::new(x, y);
                }
            }

            // Flat or single-edge neighborhoods leave the system singular.
            if a.determinant().abs() < 1e-6 * (a.trace() * a.trace()).max(1e-12) {
                break;
            }
            let Some(inv) = a.try_inverse() else {
                break;
            };
            let next = Point2::from(inv * b);
            let shift = (next - p).norm();
            p = next;
            if shift < eps {
                break;
            }
        }

        if p.x.is_finite()
            && p.y.is_finite()
            && (p - start).abs().max() <= radius as f64
        {
            *corner = p;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Anti-aliased saddle at `(cx, cy)`, supersampled 8×8 per pixel.
    fn saddle_image(width: usize, height: usize, cx: f64, cy: f64) -> Vec<u8> {
        let ss = 8;
        let mut data = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let mut acc = 0.0;
                for sy in 0..ss {
                    for sx in 0..ss {
                        let px = x as f64 - 0.5 + (sx as f64 + 0.5) / ss as f64;
                        let py = y as f64 - 0.5 + (sy as f64 + 0.5) / ss as f64;
                        acc += if (px - cx) * (py - cy) > 0.0 { 200.0 } else { 40.0 };
                    }
                }
                data[y * width + x] = (acc / (ss * ss) as f64).round() as u8;
            }
        }
        data
    }

    #[test]
    fn refines_towards_true_saddle() {
        let (cx, cy) = (20.3, 19.6);
        let data = saddle_image(40, 40, cx, cy);
        let view = GrayImageView::new(40, 40, &data).expect("view");

        let mut corners = [Point2::new(21.0, 19.0)];
        refine_corners_subpix(&view, &mut corners, 5, 30, 1e-3).expect("refine");

        let err = (corners[0] - Point2::new(cx, cy)).norm();
        assert!(err < 0.15, "refined to {:?}, err {err}", corners[0]);
    }

    #[test]
    fn flat_image_leaves_corners_unchanged() {
        let data = vec![90u8; 20 * 20];
        let view = GrayImageView::new(20, 20, &data).expect("view");
        let mut corners = [Point2::new(7.25, 11.5)];
        refine_corners_subpix(&view, &mut corners, 5, 30, 1e-3).expect("refine");
        assert_eq!(corners[0], Point2::new(7.25, 11.5));
    }

    #[test]
    fn rejects_tiny_window() {
        let data = vec![0u8; 4];
        let view = GrayImageView::new(2, 2, &data).expect("view");
        let mut corners: [Point2<f64>; 0] = [];
        assert_eq!(
            refine_corners_subpix(&view, &mut corners, 1, 10, 1e-3),
            Err(SubpixError::InvalidWindow(1))
        );
    }
}
