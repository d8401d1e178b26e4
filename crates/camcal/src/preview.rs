//! Preview images written when `show` is enabled.

use crate::CalibError;
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use nalgebra::Point2;
use std::fs;
use std::path::{Path, PathBuf};

const FIRST: Rgb<u8> = Rgb([255, 0, 0]);
const OTHER: Rgb<u8> = Rgb([0, 255, 0]);

/// Grayscale image with a cross over every corner; the first corner is red.
pub fn draw_corners(img: &GrayImage, corners: &[Point2<f64>]) -> RgbImage {
    let mut out = RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    });
    let arm = (img.width().min(img.height()) / 100).max(3) as i64;

    for (k, p) in corners.iter().enumerate() {
        let color = if k == 0 { FIRST } else { OTHER };
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        for d in -arm..=arm {
            put(&mut out, cx + d, cy, color);
            put(&mut out, cx, cy + d, color);
        }
    }
    out
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// `dir/<stem>_<suffix>.png` for the source image `source`.
pub fn preview_path(dir: &Path, source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    dir.join(format!("{stem}_{suffix}.png"))
}

/// Save a preview image as PNG, creating `dir` when needed.
pub fn save_preview(
    img: &DynamicImage,
    dir: &Path,
    source: &Path,
    suffix: &str,
) -> Result<PathBuf, CalibError> {
    fs::create_dir_all(dir).map_err(|e| CalibError::write(dir, e))?;
    let path = preview_path(dir, source, suffix);
    img.save_with_format(&path, ImageFormat::Png)
        .map_err(|e| CalibError::write(&path, e))?;
    Ok(path)
}
