use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One face found in one frame, as stored in the detections record.
///
/// `path` and `landmark_path` are relative to the output root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 1-based frame ordinal.
    pub frame: usize,
    pub center: [f64; 2],
    /// Side of the square crop in frame pixels.
    pub size: f64,
    pub path: PathBuf,
    pub landmark_path: PathBuf,
}

/// Square crop around a `[x1, y1, x2, y2]` box: its center and side
/// `scale * (w + h) / 2`.
pub fn crop_geometry(bbox: &[f64; 4], scale: f64) -> ([f64; 2], f64) {
    let width = bbox[2] - bbox[0];
    let height = bbox[3] - bbox[1];
    let center = [(bbox[0] + bbox[2]) / 2.0, (bbox[1] + bbox[3]) / 2.0];
    (center, scale * (width + height) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_crop_geometry() {
        let (center, size) = crop_geometry(&[100.0, 50.0, 200.0, 170.0], 1.25);
        assert_relative_eq!(center[0], 150.0);
        assert_relative_eq!(center[1], 110.0);
        assert_relative_eq!(size, 1.25 * 110.0);
    }

    #[test]
    fn test_crop_geometry_unit_scale_square_box() {
        let (_, size) = crop_geometry(&[0.0, 0.0, 64.0, 64.0], 1.0);
        assert_relative_eq!(size, 64.0);
    }
}
