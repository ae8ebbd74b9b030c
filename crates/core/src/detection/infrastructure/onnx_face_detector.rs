//! YOLO-style face detector with 5-point landmarks on ONNX Runtime.
//!
//! Each frame is letterboxed into the model's square input, inferred, and
//! the raw rows `[cx, cy, w, h, conf, (kx, ky, kconf) * 5]` are mapped
//! back to frame coordinates and reduced with NMS.

use std::path::Path;

use crate::detection::domain::face_detector::{BatchDetections, DetectedFace, FaceDetector};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::infrastructure::execution_provider::{fixed_input_size, open_session};
use crate::detection::infrastructure::math::non_max_suppression;
use crate::shared::frame::Frame;

/// Fallback input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks x (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

pub struct OnnxFaceDetector {
    session: ort::session::Session,
    input_size: u32,
    name: String,
}

impl OnnxFaceDetector {
    /// The input resolution is read from the model's NCHW input shape and
    /// falls back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let input_size = fixed_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            input_size,
            name: model_name(model_path),
        })
    }

    fn detect_one(
        &mut self,
        frame: &Frame,
        threshold: f64,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let (input, geometry) = letterbox(frame, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("face detector produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        }
        // [1, features, detections] is the usual export; accept both layouts.
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("detector output is not contiguous")?;

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(face) = geometry.parse_row(&row, threshold) {
                candidates.push(face);
            }
        }

        let boxes: Vec<[f64; 4]> = candidates.iter().map(|f| f.bbox).collect();
        let scores: Vec<f64> = candidates.iter().map(|f| f.confidence).collect();
        let keep = non_max_suppression(&boxes, &scores, NMS_IOU_THRESH);

        // Left to right, so within-frame indices are stable across runs.
        let mut faces: Vec<DetectedFace> = keep.into_iter().map(|i| candidates[i].clone()).collect();
        faces.sort_by(|a, b| {
            a.bbox[0]
                .partial_cmp(&b.bbox[0])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces)
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect_batch(
        &mut self,
        frames: &[Frame],
        threshold: f64,
    ) -> Result<BatchDetections, Box<dyn std::error::Error>> {
        Ok(frames
            .iter()
            .map(|frame| self.detect_one(frame, threshold))
            .collect())
    }
}

pub(crate) fn model_name(model_path: &Path) -> String {
    model_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| model_path.display().to_string())
}

/// Mapping between letterbox and frame coordinates.
struct LetterboxGeometry {
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl LetterboxGeometry {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }

    fn parse_row(&self, row: &[f32], threshold: f64) -> Option<DetectedFace> {
        if row.len() < 5 {
            return None;
        }
        let confidence = row[4] as f64;
        if confidence < threshold {
            return None;
        }
        let (cx, cy, w, h) = (row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
        let (x1, y1) = self.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = self.to_frame(cx + w / 2.0, cy + h / 2.0);

        // Missing or low-confidence keypoints stay at (0, 0): invisible.
        let mut points = [(0.0f64, 0.0f64); 5];
        if row.len() >= 5 + NUM_KEYPOINT_VALUES {
            for (k, point) in points.iter_mut().enumerate() {
                let base = 5 + k * 3;
                if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                    *point = self.to_frame(row[base] as f64, row[base + 1] as f64);
                }
            }
        }

        Some(DetectedFace {
            bbox: [x1, y1, x2, y2],
            confidence,
            landmarks: FaceLandmarks::new(points),
        })
    }
}

/// Letterbox-resize a frame into a `target_size` square NCHW tensor
/// (values in 0..=1, padding 114/255 grey).
fn letterbox(
    frame: &Frame,
    target_size: u32,
) -> Result<(ndarray::Array4<f32>, LetterboxGeometry), Box<dyn std::error::Error>> {
    let src = frame
        .as_ndarray()
        .ok_or("frame buffer does not match its dimensions")?;
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    if fw == 0.0 || fh == 0.0 {
        return Err("empty frame".into());
    }
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Ok((
        tensor,
        LetterboxGeometry {
            scale,
            pad_x: pad_x as f64,
            pad_y: pad_y as f64,
        },
    ))
}
