//! 5-point face landmarks as returned by the detector.
//!
//! Order: left eye, right eye, nose, left mouth corner, right mouth corner.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// Points with x <= 0 are treated as invisible.
    points: [(f64, f64); 5],
}

impl FaceLandmarks {
    pub fn new(points: [(f64, f64); 5]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64); 5] {
        &self.points
    }

    pub fn has_visible(&self) -> bool {
        self.points.iter().any(|(x, _)| *x > 0.0)
    }

    /// Maps frame coordinates into a square crop of `side` pixels centred
    /// on `center`, after the crop is resized to `image_size`.
    ///
    /// Invisible points stay at the origin.
    pub fn to_crop_space(&self, center: [f64; 2], side: f64, image_size: u32) -> FaceLandmarks {
        let origin_x = center[0] - side / 2.0;
        let origin_y = center[1] - side / 2.0;
        let factor = if side > 0.0 {
            image_size as f64 / side
        } else {
            0.0
        };
        let mut points = self.points;
        for point in points.iter_mut() {
            if point.0 > 0.0 {
                *point = ((point.0 - origin_x) * factor, (point.1 - origin_y) * factor);
            } else {
                *point = (0.0, 0.0);
            }
        }
        FaceLandmarks { points }
    }
}
