use camcal_core::{Homography, Intrinsics, PoseEstimate};
use nalgebra::{Matrix3, Rotation3, Vector3};

/// Pose of a planar board (`Z = 0`) from its plane→image homography.
///
/// `H ~ K [r1 r2 t]`; the scale is the mean norm of the first two columns of
/// `K⁻¹H` and its sign puts the board in front of the camera. The rotation is
/// projected onto SO(3) with an SVD.
pub fn pose_from_homography(intrinsics: &Intrinsics, hom: &Homography) -> Option<PoseEstimate> {
    let k_inv = intrinsics.matrix().try_inverse()?;
    let m = k_inv * hom.h;

    let m1: Vector3<f64> = m.column(0).into_owned();
    let m2: Vector3<f64> = m.column(1).into_owned();
    let m3: Vector3<f64> = m.column(2).into_owned();

    let norm = 0.5 * (m1.norm() + m2.norm());
    if norm <= f64::EPSILON {
        return None;
    }
    let mut lambda = 1.0 / norm;
    if m3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = m1 * lambda;
    let r2 = m2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // Nearest rotation (polar decomposition).
    let svd = r.svd(true, true);
    let (mut u, v_t) = (svd.u?, svd.v_t?);
    if (u * v_t).determinant() < 0.0 {
        u.column_mut(2).neg_mut();
    }
    let rot = Rotation3::from_matrix_unchecked(u * v_t);

    Some(PoseEstimate::new(rot.scaled_axis(), m3 * lambda))
}
