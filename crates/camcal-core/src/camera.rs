use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Geometric centre of the pixel grid, `((w - 1) / 2, (h - 1) / 2)`.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(
            (self.width as f64 - 1.0) * 0.5,
            (self.height as f64 - 1.0) * 0.5,
        )
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pinhole intrinsics without skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// `fx = fy = 1`, principal point at the origin.
    pub fn identity() -> Self {
        Self {
            fx: 1.0,
            fy: 1.0,
            cx: 0.0,
            cy: 0.0,
        }
    }

    /// The 3x3 camera matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Read `fx, fy, cx, cy` back from a camera matrix. Skew is ignored.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    #[inline]
    pub fn normalize(&self, px: Point2<f64>) -> Point2<f64> {
        Point2::new((px.x - self.cx) / self.fx, (px.y - self.cy) / self.fy)
    }

    #[inline]
    pub fn denormalize(&self, n: Point2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }
}

/// Brown–Conrady distortion with three radial and two tangential terms.
///
/// Serialized and exchanged in the conventional `[k1, k2, p1, p2, k3]` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_array(d: [f64; 5]) -> Self {
        Self {
            k1: d[0],
            k2: d[1],
            p1: d[2],
            p2: d[3],
            k3: d[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    /// Apply the forward model to a normalized image point.
    #[inline]
    pub fn distort(&self, n: Point2<f64>) -> Point2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        Point2::new(x * radial + x_tan, y * radial + y_tan)
    }
}

/// Extrinsics of one view: board frame to camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Rotation vector (axis scaled by angle, radians).
    pub rvec: Vector3<f64>,
    /// Translation in pattern units.
    pub tvec: Vector3<f64>,
}

impl PoseEstimate {
    pub fn new(rvec: Vector3<f64>, tvec: Vector3<f64>) -> Self {
        Self { rvec, tvec }
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }
}

/// Estimated camera: shared intrinsics plus lens distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    pub intrinsics: Intrinsics,
    pub distortion: Distortion,
}

impl CameraModel {
    pub fn new(intrinsics: Intrinsics, distortion: Distortion) -> Self {
        Self {
            intrinsics,
            distortion,
        }
    }

    /// Project a point already expressed in the camera frame.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project_camera_point(&self, pc: &Point3<f64>) -> Option<Point2<f64>> {
        if pc.z <= f64::EPSILON {
            return None;
        }
        let n = Point2::new(pc.x / pc.z, pc.y / pc.z);
        Some(self.intrinsics.denormalize(self.distortion.distort(n)))
    }

    /// Project board points through `pose`. Points behind the camera map to NaN
    /// so the output stays index-aligned with the input.
    pub fn project(&self, pose: &PoseEstimate, points: &[Point3<f64>]) -> Vec<Point2<f64>> {
        let rot = pose.rotation();
        points
            .iter()
            .map(|p| {
                let pc = rot * p + pose.tvec;
                self.project_camera_point(&pc)
                    .unwrap_or_else(|| Point2::new(f64::NAN, f64::NAN))
            })
            .collect()
    }

    /// Source pixel that lands on `dst` after undistortion (the remap used by
    /// rectification, with the same `K` on both sides).
    #[inline]
    pub fn distorted_source(&self, dst: Point2<f64>) -> Point2<f64> {
        let n = self.intrinsics.normalize(dst);
        self.intrinsics.denormalize(self.distortion.distort(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> CameraModel {
        CameraModel::new(
            Intrinsics {
                fx: 800.0,
                fy: 780.0,
                cx: 320.0,
                cy: 240.0,
            },
            Distortion::from_array([-0.2, 0.05, 0.001, -0.0005, 0.0]),
        )
    }

    #[test]
    fn distortion_array_order_is_k1_k2_p1_p2_k3() {
        let d = Distortion::from_array([1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(d.k1, 1.0);
        assert_eq!(d.p1, 3.0);
        assert_eq!(d.k3, 5.0);
        assert_eq!(d.to_array(), [1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn zero_distortion_is_identity() {
        let p = Point2::new(0.3, -0.7);
        assert_eq!(Distortion::zero().distort(p), p);
    }

    #[test]
    fn optical_axis_projects_to_principal_point() {
        let m = model();
        let pose = PoseEstimate::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 500.0));
        let px = m.project(&pose, &[Point3::origin()]);
        assert_relative_eq!(px[0].x, 320.0, epsilon = 1e-12);
        assert_relative_eq!(px[0].y, 240.0, epsilon = 1e-12);
    }

    #[test]
    fn points_behind_camera_project_to_nan() {
        let m = model();
        let pose = PoseEstimate::new(Vector3::zeros(), Vector3::new(0.0, 0.0, -1.0));
        let px = m.project(&pose, &[Point3::origin()]);
        assert!(px[0].x.is_nan());
    }

    #[test]
    fn matrix_round_trips_through_intrinsics() {
        let k = model().intrinsics;
        assert_eq!(Intrinsics::from_matrix(&k.matrix()), k);
    }
}
