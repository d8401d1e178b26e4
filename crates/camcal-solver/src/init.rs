use camcal_core::{Homography, ImageSize, Intrinsics};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Closed-form focal lengths from plane homographies.
///
/// The principal point is fixed at the image centre and skew at zero. After
/// removing the principal point from each `H`, the images of two orthogonal
/// board directions (its columns, and their half sum and difference) must be
/// orthogonal under `diag(1/fx², 1/fy², 1)`, which is linear in
/// `(1/fx², 1/fy²)` and solved in the least-squares sense.
///
/// Returns `None` when the views do not constrain the focal lengths, e.g. all
/// boards are parallel to the image plane.
pub fn initial_intrinsics(homographies: &[Homography], size: ImageSize) -> Option<Intrinsics> {
    if homographies.is_empty() {
        return None;
    }
    let c = size.center();
    let a_inv = Matrix3::new(
        1.0, 0.0, -c.x, //
        0.0, 1.0, -c.y, //
        0.0, 0.0, 1.0,
    );

    let m = homographies.len();
    let mut a = DMatrix::<f64>::zeros(2 * m, 2);
    let mut b = DVector::<f64>::zeros(2 * m);

    for (k, hom) in homographies.iter().enumerate() {
        let h = a_inv * hom.h;
        let h1: Vector3<f64> = h.column(0).into_owned();
        let h2: Vector3<f64> = h.column(1).into_owned();
        let d1 = (h1 + h2) * 0.5;
        let d2 = (h1 - h2) * 0.5;

        let (Some(h1), Some(h2), Some(d1), Some(d2)) = (
            h1.try_normalize(1e-15),
            h2.try_normalize(1e-15),
            d1.try_normalize(1e-15),
            d2.try_normalize(1e-15),
        ) else {
            return None;
        };

        a[(2 * k, 0)] = h1[0] * h2[0];
        a[(2 * k, 1)] = h1[1] * h2[1];
        b[2 * k] = -h1[2] * h2[2];

        a[(2 * k + 1, 0)] = d1[0] * d2[0];
        a[(2 * k + 1, 1)] = d1[1] * d2[1];
        b[2 * k + 1] = -d1[2] * d2[2];
    }

    let f = a.svd(true, true).solve(&b, 1e-12).ok()?;
    // 1/f² this small means a focal length beyond 1e7 px.
    if f[0].abs() < 1e-14 || f[1].abs() < 1e-14 {
        return None;
    }
    let fx = (1.0 / f[0]).abs().sqrt();
    let fy = (1.0 / f[1]).abs().sqrt();
    if !(fx.is_finite() && fy.is_finite()) || fx <= 0.0 || fy <= 0.0 {
        return None;
    }

    Some(Intrinsics {
        fx,
        fy,
        cx: c.x,
        cy: c.y,
    })
}
