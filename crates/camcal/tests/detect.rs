use camcal::{
    mean_distance, run_pipeline, CalibrationConfig, CameraModel, ChessCornerFinder, CornerFinder,
    Distortion, Intrinsics, PatternSpec, PoseEstimate,
};
use image::{GrayImage, Luma};
use nalgebra::{Matrix3, Vector3};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;
const DARK: f64 = 30.0;
const LIGHT: f64 = 225.0;
const SUPERSAMPLE: u32 = 4;

fn camera() -> CameraModel {
    CameraModel::new(
        Intrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
        },
        Distortion::zero(),
    )
}

fn poses() -> Vec<PoseEstimate> {
    [
        ([0.20, -0.15, 0.05], [-100.0, -70.0, 520.0]),
        ([-0.25, 0.20, -0.05], [-95.0, -75.0, 560.0]),
        ([0.10, 0.30, 0.10], [-110.0, -60.0, 540.0]),
        ([-0.30, -0.20, 0.00], [-90.0, -65.0, 500.0]),
        ([0.25, 0.25, -0.08], [-105.0, -80.0, 580.0]),
    ]
    .iter()
    .map(|(r, t)| PoseEstimate::new(Vector3::from(*r), Vector3::from(*t)))
    .collect()
}

/// Is board point `(x, y)` on a dark square? Interior corner `(0, 0)` sits at
/// the board origin, so squares span `[-s, cols * s] x [-s, rows * s]`.
fn board_is_dark(pattern: &PatternSpec, x: f64, y: f64) -> Option<bool> {
    let s = pattern.square_size;
    let (i, j) = ((x / s).floor() + 1.0, (y / s).floor() + 1.0);
    let inside =
        (0.0..=pattern.cols as f64).contains(&i) && (0.0..=pattern.rows as f64).contains(&j);
    inside.then(|| (i as i64 + j as i64) % 2 == 0)
}

/// Anti-aliased pinhole view of the board on a light background.
fn render(model: &CameraModel, pose: &PoseEstimate, pattern: &PatternSpec) -> GrayImage {
    let r = pose.rotation();
    let r = r.matrix();
    let plane_to_camera = Matrix3::from_columns(&[
        r.column(0).into_owned(),
        r.column(1).into_owned(),
        pose.tvec,
    ]);
    let image_to_plane = (model.intrinsics.matrix() * plane_to_camera)
        .try_inverse()
        .expect("invertible homography");

    let step = 1.0 / SUPERSAMPLE as f64;
    GrayImage::from_fn(WIDTH, HEIGHT, |u, v| {
        let mut acc = 0.0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let px = u as f64 - 0.5 + (sx as f64 + 0.5) * step;
                let py = v as f64 - 0.5 + (sy as f64 + 0.5) * step;
                let b = image_to_plane * Vector3::new(px, py, 1.0);
                let dark = b.z.abs() > 1e-12
                    && board_is_dark(pattern, b.x / b.z, b.y / b.z) == Some(true);
                acc += if dark { DARK } else { LIGHT };
            }
        }
        Luma([(acc / (SUPERSAMPLE * SUPERSAMPLE) as f64).round() as u8])
    })
}

#[test]
fn chess_finder_returns_ordered_board_corners() {
    let pattern = PatternSpec::default();
    let model = camera();
    let object = pattern.object_points();
    let finder = ChessCornerFinder::default();

    for (k, pose) in poses().iter().enumerate().take(3) {
        let img = render(&model, pose, &pattern);
        let truth = model.project(pose, &object);

        let found = finder
            .find_corners(&img, &pattern)
            .unwrap_or_else(|| panic!("view {k}: board not found"));
        assert_eq!(found.len(), 48, "view {k}");

        // Comparing index by index checks the row-major order as well.
        for (idx, (p, q)) in found.iter().zip(&truth).enumerate() {
            let err = (p - q).norm();
            assert!(err < 0.6, "view {k} corner {idx}: off by {err:.3}px");
        }
        let mean = mean_distance(&found, &truth);
        assert!(mean < 0.3, "view {k}: mean error {mean:.3}px");
    }
}

#[test]
fn chess_finder_rejects_a_blank_image() {
    let img = GrayImage::from_pixel(WIDTH, HEIGHT, Luma([200]));
    assert!(ChessCornerFinder::default()
        .find_corners(&img, &PatternSpec::default())
        .is_none());
}

#[test]
fn pipeline_calibrates_from_rendered_boards() {
    let src = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let pattern = PatternSpec::default();
    let model = camera();
    for (k, pose) in poses().iter().enumerate() {
        render(&model, pose, &pattern)
            .save(src.path().join(format!("board_{k}.png")))
            .expect("save view");
    }

    let cfg = CalibrationConfig {
        source_dir: src.path().to_path_buf(),
        dest_dir: out.path().join("rectified"),
        pattern: "*.png".to_string(),
        params_path: out.path().join("intrinsics.json"),
        save: false,
        ..Default::default()
    };
    let result = run_pipeline(&cfg, &ChessCornerFinder::default()).expect("pipeline");

    assert_eq!(result.extraction.accepted.len(), 5);
    assert!(result.extraction.skipped.is_empty());
    let k = result.calibration.model.intrinsics;
    assert!((k.fx - 800.0).abs() < 8.0, "fx {}", k.fx);
    assert!((k.fy - 800.0).abs() < 8.0, "fy {}", k.fy);
    assert!((k.cx - 320.0).abs() < 6.0, "cx {}", k.cx);
    assert!((k.cy - 240.0).abs() < 6.0, "cy {}", k.cy);
    assert!(
        result.reprojection.average < 0.3,
        "average {}",
        result.reprojection.average
    );
}
