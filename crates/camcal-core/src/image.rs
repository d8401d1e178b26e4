/// Borrowed row-major 8-bit grayscale image.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl<'a> GrayImageView<'a> {
    /// Wrap a raw buffer; `None` when the length does not match `width * height`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Option<Self> {
        let expected = width.checked_mul(height)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample at a sub-pixel location; pixels outside the image read as 0.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_samples_return_stored_pixels() {
        let data: Vec<u8> = (0..12).map(|v| v * 10).collect();
        let view = GrayImageView::new(4, 3, &data).expect("valid view");
        assert_eq!(sample_bilinear(&view, 2.0, 1.0), 60.0);
        assert_eq!(sample_bilinear(&view, 0.0, 0.0), 0.0);
    }

    #[test]
    fn half_pixel_sample_interpolates() {
        let data = [0u8, 100, 0, 100];
        let view = GrayImageView::new(2, 2, &data).expect("valid view");
        assert!((sample_bilinear(&view, 0.5, 0.5) - 50.0).abs() < 1e-5);
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let data = [0u8; 5];
        assert!(GrayImageView::new(2, 3, &data).is_none());
    }
}
