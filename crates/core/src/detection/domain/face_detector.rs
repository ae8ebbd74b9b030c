use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

/// A face box in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    /// `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
    pub confidence: f64,
    pub landmarks: FaceLandmarks,
}

/// Per-image outcome of a batch; one entry per input frame, in order.
pub type BatchDetections = Vec<Result<Vec<DetectedFace>, Box<dyn std::error::Error>>>;

/// Domain interface for face detection.
///
/// An `Err` for the whole batch is fatal for the sequence; an `Err` entry
/// inside the batch only affects that frame.
pub trait FaceDetector: Send {
    /// Identifies the model in cache fingerprints.
    fn name(&self) -> &str;

    fn detect_batch(
        &mut self,
        frames: &[Frame],
        threshold: f64,
    ) -> Result<BatchDetections, Box<dyn std::error::Error>>;
}
