use serde::{Deserialize, Serialize};

/// Neighbor search parameters for assembling corners into a grid.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Neighbor distance window relative to the estimated base spacing.
    pub min_spacing_rel: f32,
    pub max_spacing_rel: f32,
    /// Upper bound on the nearest-neighbor search radius, in pixels.
    pub search_radius_pix: f32,
    /// Require neighboring ChESS orientations to be roughly orthogonal.
    pub use_orientation: bool,
    pub orientation_tolerance_deg: f32,
    /// Maximal angle between an edge and its grid axis.
    pub axis_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_rel: 0.5,
            max_spacing_rel: 2.0,
            search_radius_pix: 400.0,
            use_orientation: true,
            orientation_tolerance_deg: 22.5,
            axis_tolerance_deg: 25.0,
        }
    }
}

/// Parameters for the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// ChESS response threshold relative to the strongest response.
    pub threshold_rel: f32,

    /// ChESS non-maximum-suppression radius, in pixels.
    pub nms_radius: u32,

    /// Drop corners weaker than this fraction of the strongest corner.
    pub min_strength_rel: f32,

    pub graph: GridGraphParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            min_strength_rel: 0.0,
            graph: GridGraphParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: ChessboardParams =
            serde_json::from_str(r#"{ "nms_radius": 4, "graph": { "use_orientation": false } }"#)
                .expect("parse");
        assert_eq!(params.nms_radius, 4);
        assert!(!params.graph.use_orientation);
        assert_eq!(params.threshold_rel, 0.2);
        assert_eq!(params.graph.max_spacing_rel, 2.0);
    }
}
