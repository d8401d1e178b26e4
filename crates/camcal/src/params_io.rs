use crate::CalibError;
use camcal_core::{CameraModel, Distortion, ImageSize, Intrinsics};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// On-disk camera parameters: the 3x3 camera matrix under `"K"` and the
/// distortion vector `[k1, k2, p1, p2, k3]` under `"D"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    #[serde(rename = "K")]
    pub k: [[f64; 3]; 3],
    #[serde(rename = "D")]
    pub d: [f64; 5],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<ImageSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_error: Option<f64>,
}

impl CameraParams {
    pub fn from_model(model: &CameraModel) -> Self {
        let k = model.intrinsics.matrix();
        Self {
            k: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            d: model.distortion.to_array(),
            image_size: None,
            average_error: None,
        }
    }

    pub fn with_image_size(mut self, size: ImageSize) -> Self {
        self.image_size = Some(size);
        self
    }

    pub fn with_average_error(mut self, error: f64) -> Self {
        self.average_error = Some(error);
        self
    }

    /// Camera model described by `K` and `D`. Skew in `K` is ignored.
    pub fn model(&self) -> CameraModel {
        let k = nalgebra::Matrix3::from_fn(|r, c| self.k[r][c]);
        CameraModel::new(Intrinsics::from_matrix(&k), Distortion::from_array(self.d))
    }

    /// Check that `K` and `D` describe a usable camera: every entry finite
    /// and both focal lengths positive.
    pub fn validate(&self) -> Result<(), CalibError> {
        if let Some((r, c)) = (0..3)
            .flat_map(|r| (0..3).map(move |c| (r, c)))
            .find(|&(r, c)| !self.k[r][c].is_finite())
        {
            return Err(CalibError::InvalidParams(format!(
                "K[{r}][{c}] is not finite"
            )));
        }
        if let Some(i) = self.d.iter().position(|v| !v.is_finite()) {
            return Err(CalibError::InvalidParams(format!("D[{i}] is not finite")));
        }
        for (name, f) in [("fx", self.k[0][0]), ("fy", self.k[1][1])] {
            if f <= 0.0 {
                return Err(CalibError::InvalidParams(format!(
                    "{name} must be positive, got {f}"
                )));
            }
        }
        Ok(())
    }

    /// Read and validate a parameter file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&raw)?;
        params.validate().map_err(|err| match err {
            CalibError::InvalidParams(reason) => {
                CalibError::InvalidParams(format!("{}: {reason}", path.display()))
            }
            other => other,
        })?;
        Ok(params)
    }

    /// Write as pretty JSON, creating the parent folder when needed.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CalibError::write(parent, e))?;
        }
        fs::write(path, json).map_err(|e| CalibError::write(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awkward_model() -> CameraModel {
        CameraModel::new(
            Intrinsics {
                fx: 812.345_678_901_234_5,
                fy: 809.000_000_000_000_1,
                cx: 319.499_999_999_999_94,
                cy: 1.0 / 3.0 * 720.0,
            },
            Distortion::from_array([-0.213_456_789_012_345, 0.1 + 0.2, 1e-17, -4.4e-5, f64::MIN_POSITIVE]),
        )
    }

    #[test]
    fn json_round_trip_is_exact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("intrinsics.json");
        let params = CameraParams::from_model(&awkward_model())
            .with_image_size(ImageSize::new(640, 480))
            .with_average_error(0.123_456_789);

        params.write_json(&path).expect("write");
        let back = CameraParams::load_json(&path).expect("load");

        assert_eq!(back, params);
        assert_eq!(back.model(), awkward_model());
    }

    #[test]
    fn uses_k_and_d_keys() {
        let json = serde_json::to_value(CameraParams::from_model(&awkward_model())).expect("json");
        let obj = json.as_object().expect("object");
        assert!(obj.contains_key("K"));
        assert!(obj.contains_key("D"));
        assert_eq!(obj["K"].as_array().map(|rows| rows.len()), Some(3));
        assert_eq!(obj["D"].as_array().map(|d| d.len()), Some(5));
        assert!(!obj.contains_key("image_size"));
    }

    #[test]
    fn reads_minimal_file() {
        let params: CameraParams = serde_json::from_str(
            r#"{ "K": [[500, 0, 320], [0, 500, 240], [0, 0, 1]], "D": [0.1, 0, 0, 0, 0] }"#,
        )
        .expect("params");
        let model = params.model();
        assert_eq!(model.intrinsics.fx, 500.0);
        assert_eq!(model.intrinsics.cy, 240.0);
        assert_eq!(model.distortion.k1, 0.1);
        assert_eq!(params.image_size, None);
    }

    fn write_raw(dir: &Path, json: &str) -> std::path::PathBuf {
        let path = dir.join("params.json");
        fs::write(&path, json).expect("write");
        path
    }

    #[test]
    fn load_rejects_non_positive_focal_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        for k in [
            r#"[[0, 0, 320], [0, 500, 240], [0, 0, 1]]"#,
            r#"[[500, 0, 320], [0, -1, 240], [0, 0, 1]]"#,
        ] {
            let path = write_raw(dir.path(), &format!(r#"{{ "K": {k}, "D": [0, 0, 0, 0, 0] }}"#));
            let err = CameraParams::load_json(&path).expect_err("bad focal length");
            assert!(matches!(err, CalibError::InvalidParams(_)), "{err:?}");
            assert!(err.to_string().contains("must be positive"), "{err}");
        }
    }

    #[test]
    fn validate_rejects_non_finite_entries() {
        let mut params = CameraParams::from_model(&awkward_model());
        params.k[0][2] = f64::NAN;
        let err = params.validate().expect_err("nan principal point");
        assert!(err.to_string().contains("K[0][2]"), "{err}");

        let mut params = CameraParams::from_model(&awkward_model());
        params.k[1][1] = f64::INFINITY;
        assert!(params.validate().is_err());

        let mut params = CameraParams::from_model(&awkward_model());
        params.d[4] = f64::NEG_INFINITY;
        let err = params.validate().expect_err("infinite k3");
        assert!(err.to_string().contains("D[4]"), "{err}");
    }

    #[test]
    fn saved_model_passes_validation() {
        assert!(CameraParams::from_model(&awkward_model()).validate().is_ok());
    }
}
