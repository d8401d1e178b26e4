use crate::preview::save_preview;
use crate::CalibError;
use camcal_core::CameraModel;
use image::{DynamicImage, ImageBuffer, Pixel};
use log::{info, warn};
use nalgebra::Point2;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug)]
pub struct RectifyOptions {
    pub dest_dir: PathBuf,
    /// Write rectified images to `dest_dir`.
    pub save: bool,
    /// Also write PNG previews here when set.
    pub preview_dir: Option<PathBuf>,
    pub parallel: bool,
}

#[inline]
fn tap<P: Pixel<Subpixel = u8>>(src: &ImageBuffer<P, Vec<u8>>, x: i64, y: i64, c: usize) -> f64 {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return 0.0;
    }
    src.get_pixel(x as u32, y as u32).channels()[c] as f64
}

/// Bilinear sample of channel `c`; outside the image reads as black.
#[inline]
fn sample<P: Pixel<Subpixel = u8>>(src: &ImageBuffer<P, Vec<u8>>, p: Point2<f64>, c: usize) -> f64 {
    let x0 = p.x.floor();
    let y0 = p.y.floor();
    let (fx, fy) = (p.x - x0, p.y - y0);
    let (xi, yi) = (x0 as i64, y0 as i64);

    let p00 = tap(src, xi, yi, c);
    let p10 = tap(src, xi + 1, yi, c);
    let p01 = tap(src, xi, yi + 1, c);
    let p11 = tap(src, xi + 1, yi + 1, c);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Remove lens distortion from an 8-bit image buffer.
///
/// Every destination pixel is normalised with `K`, pushed through the forward
/// distortion model and mapped back with the same `K`; the source is sampled
/// there. The output has the size of the input.
pub fn undistort_buffer<P>(src: &ImageBuffer<P, Vec<u8>>, model: &CameraModel) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    ImageBuffer::from_fn(src.width(), src.height(), |x, y| {
        let s = model.distorted_source(Point2::new(x as f64, y as f64));
        let mut px = *src.get_pixel(0, 0);
        for (c, v) in px.channels_mut().iter_mut().enumerate().take(channels) {
            *v = sample(src, s, c).round().clamp(0.0, 255.0) as u8;
        }
        px
    })
}

/// [`undistort_buffer`] for any decoded image. 8-bit luma and RGB(A)
/// layouts are kept; other layouts are converted to RGB8.
pub fn undistort_image(img: &DynamicImage, model: &CameraModel) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(b) => DynamicImage::ImageLuma8(undistort_buffer(b, model)),
        DynamicImage::ImageLumaA8(b) => DynamicImage::ImageLumaA8(undistort_buffer(b, model)),
        DynamicImage::ImageRgb8(b) => DynamicImage::ImageRgb8(undistort_buffer(b, model)),
        DynamicImage::ImageRgba8(b) => DynamicImage::ImageRgba8(undistort_buffer(b, model)),
        other => DynamicImage::ImageRgb8(undistort_buffer(&other.to_rgb8(), model)),
    }
}

/// Re-read each image, undistort it and write it to `dest_dir/<file name>`.
///
/// Returns the written paths in input order. Any read or write failure
/// aborts the run.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(images = paths.len()))
)]
pub fn rectify_images(
    paths: &[PathBuf],
    model: &CameraModel,
    opts: &RectifyOptions,
) -> Result<Vec<PathBuf>, CalibError> {
    if opts.save {
        fs::create_dir_all(&opts.dest_dir).map_err(|e| CalibError::write(&opts.dest_dir, e))?;
    }
    let total = paths.len();

    let process = |(idx, path): (usize, &PathBuf)| -> Result<Option<PathBuf>, CalibError> {
        info!("rectifying {}/{}: {}", idx + 1, total, path.display());
        rectify_one(path, model, opts)
    };

    let written: Vec<Option<PathBuf>> = if opts.parallel {
        paths
            .par_iter()
            .enumerate()
            .map(process)
            .collect::<Result<_, _>>()?
    } else {
        paths
            .iter()
            .enumerate()
            .map(process)
            .collect::<Result<_, _>>()?
    };

    Ok(written.into_iter().flatten().collect())
}

fn rectify_one(
    path: &Path,
    model: &CameraModel,
    opts: &RectifyOptions,
) -> Result<Option<PathBuf>, CalibError> {
    let img = image::open(path).map_err(|source| CalibError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let rectified = undistort_image(&img, model);

    if let Some(dir) = &opts.preview_dir {
        if let Err(err) = save_preview(&rectified, dir, path, "rectified") {
            warn!("{err}");
        }
    }

    if !opts.save {
        return Ok(None);
    }
    let Some(name) = path.file_name() else {
        return Ok(None);
    };
    let out = opts.dest_dir.join(name);
    rectified
        .save(&out)
        .map_err(|e| CalibError::write(&out, e))?;
    Ok(Some(out))
}
