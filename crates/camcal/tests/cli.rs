use assert_cmd::Command;
use camcal::{CameraModel, CameraParams, Distortion, Intrinsics};
use image::{Rgb, RgbImage};
use predicates::prelude::*;
use std::fs;

fn camcal() -> Command {
    Command::cargo_bin("camcal").expect("camcal binary")
}

#[test]
fn help_lists_subcommands() {
    camcal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("calibrate"))
        .stdout(predicate::str::contains("rectify"));
}

#[test]
fn calibrate_without_images_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    camcal()
        .args(["calibrate", "--source"])
        .arg(dir.path())
        .arg("--dest")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not enough views"));
    assert!(!dir.path().join("out").join("intrinsics.json").exists());
}

#[test]
fn calibrate_rejects_malformed_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("cfg.json");
    fs::write(&cfg, "{ not json").expect("write");
    camcal()
        .args(["calibrate", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn rectify_with_identity_params_copies_images() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    fs::create_dir(&src).expect("mkdir");

    let img = RgbImage::from_fn(24, 16, |x, y| Rgb([(x * 10) as u8, (y * 15) as u8, 77]));
    img.save(src.join("shot.png")).expect("save");

    let params_path = dir.path().join("identity.json");
    CameraParams::from_model(&CameraModel::new(Intrinsics::identity(), Distortion::zero()))
        .write_json(&params_path)
        .expect("params");

    camcal()
        .args(["rectify", "--params"])
        .arg(&params_path)
        .arg("--source")
        .arg(&src)
        .arg("--dest")
        .arg(&out)
        .args(["--pattern", "*.png"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 image(s) written"));

    let back = image::open(out.join("shot.png")).expect("rectified").to_rgb8();
    assert_eq!(back, img);
}

#[test]
fn rectify_requires_params() {
    camcal().arg("rectify").assert().failure();
}

#[test]
fn rectify_rejects_zero_focal_length() {
    let dir = tempfile::tempdir().expect("tempdir");
    let src = dir.path().join("src");
    let out = dir.path().join("out");
    fs::create_dir(&src).expect("mkdir");
    RgbImage::new(8, 8).save(src.join("shot.png")).expect("save");

    let params_path = dir.path().join("broken.json");
    fs::write(
        &params_path,
        r#"{ "K": [[0, 0, 4], [0, 0, 4], [0, 0, 1]], "D": [0, 0, 0, 0, 0] }"#,
    )
    .expect("write params");

    camcal()
        .args(["rectify", "--params"])
        .arg(&params_path)
        .arg("--source")
        .arg(&src)
        .arg("--dest")
        .arg(&out)
        .args(["--pattern", "*.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid camera parameters"));
    assert!(!out.join("shot.png").exists());
}
