use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Compute the absolute difference between two angles (radians),
/// normalized into `[0, π]`.
pub fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    // Normalize angle difference to [-π, π).
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Check whether two undirected orientations (defined modulo π) are
/// approximately orthogonal within `tolerance`.
pub fn is_orthogonal(reference_angle: f32, other_angle: f32, tolerance: f32) -> bool {
    let diff = angle_diff_abs(reference_angle, other_angle);
    let diff = diff.min(PI - diff);
    (FRAC_PI_2 - diff).abs() <= tolerance.abs()
}

/// Angle between an undirected axis `axis_angle` (modulo π) and a directed
/// vector angle. Returns a value in `[0, π/2]`.
pub fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let diff_abs = angle_diff_abs(axis_angle, vec_angle);
    diff_abs.min(PI - diff_abs)
}

/// Dominant grid axis angle, in `(-π/4, π/4]`, from a set of edge angles.
///
/// Grid edges are four-fold symmetric, so the angles are averaged in
/// quadruple-angle space.
pub fn dominant_axis_angle(edge_angles: impl IntoIterator<Item = f32>) -> Option<f32> {
    let (mut sx, mut sy) = (0.0f32, 0.0f32);
    for a in edge_angles {
        sx += (4.0 * a).cos();
        sy += (4.0 * a).sin();
    }
    if sx * sx + sy * sy < 1e-12 {
        return None;
    }
    let theta = 0.25 * sy.atan2(sx);
    debug_assert!(theta > -FRAC_PI_4 - 1e-6 && theta <= FRAC_PI_4 + 1e-6);
    Some(theta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_and_orthogonal_cases() {
        let tol = 1e-3;

        assert!(is_orthogonal(0.0, FRAC_PI_2, tol));
        // Orientations are modulo π.
        assert!(is_orthogonal(FRAC_PI_4, -FRAC_PI_4 + PI, tol));
        assert!(!is_orthogonal(0.0, 0.25, 0.05));
    }

    #[test]
    fn axis_vector_difference_is_folded() {
        assert!((axis_vec_diff(0.0, PI) - 0.0).abs() < 1e-6);
        assert!((axis_vec_diff(0.0, FRAC_PI_2) - FRAC_PI_2).abs() < 1e-6);
        assert!((axis_vec_diff(FRAC_PI_4, 0.0) - FRAC_PI_4).abs() < 1e-6);
    }

    #[test]
    fn dominant_axis_ignores_quarter_turns() {
        let base = 0.2f32;
        let angles = [base, base + FRAC_PI_2, base + PI, base - FRAC_PI_2];
        let theta = dominant_axis_angle(angles).expect("axis");
        assert!((theta - base).abs() < 1e-5);
    }
}
