use std::path::Path;

use crate::detection::domain::face_embedder::{standardize_pixel, FaceEmbedder};
use crate::detection::infrastructure::execution_provider::{fixed_input_size, open_session};
use crate::detection::infrastructure::onnx_face_detector::model_name;
use crate::shared::frame::Frame;

/// Input side of the common face-recognition exports.
const DEFAULT_INPUT_SIZE: u32 = 112;

/// Identity embedding network on ONNX Runtime.
///
/// Crops are resampled to the model's input, standardised per pixel and
/// batched into one NCHW tensor. Output vectors are returned unnormalised.
pub struct OnnxFaceEmbedder {
    session: ort::session::Session,
    input_size: u32,
    name: String,
}

impl OnnxFaceEmbedder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let input_size = fixed_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            input_size,
            name: model_name(model_path),
        })
    }
}

impl FaceEmbedder for OnnxFaceEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed_batch(&mut self, crops: &[Frame]) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error>> {
        if crops.is_empty() {
            return Ok(Vec::new());
        }
        let tensor = preprocess(crops, self.input_size as usize);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("embedding model produced no outputs".into());
        }
        let array = outputs[0].try_extract_array::<f32>()?;
        let data = array.as_slice().ok_or("embedding output is not contiguous")?;
        if data.len() % crops.len() != 0 {
            return Err(format!(
                "embedding output of {} values does not split into {} vectors",
                data.len(),
                crops.len()
            )
            .into());
        }
        let dim = data.len() / crops.len();
        Ok(data.chunks(dim).map(<[f32]>::to_vec).collect())
    }
}

/// Nearest-neighbour resample of every crop into one `[n, 3, size, size]` tensor.
fn preprocess(crops: &[Frame], size: usize) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((crops.len(), 3, size, size));

    for (n, crop) in crops.iter().enumerate() {
        let src_w = crop.width() as usize;
        let src_h = crop.height() as usize;
        if src_w == 0 || src_h == 0 {
            continue;
        }
        let data = crop.data();
        for y in 0..size {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / size as f64) as usize).min(src_h - 1);
            for x in 0..size {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / size as f64) as usize).min(src_w - 1);
                let offset = (src_y * src_w + src_x) * 3;
                if offset + 2 < data.len() {
                    for c in 0..3 {
                        tensor[[n, c, y, x]] = standardize_pixel(data[offset + c]);
                    }
                }
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid(size: u32, value: u8) -> Frame {
        Frame::new(vec![value; (size * size * 3) as usize], size, size, 1)
    }

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&[solid(50, 128), solid(224, 128)], 112);
        assert_eq!(tensor.shape(), &[2, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_standardizes_each_crop() {
        let tensor = preprocess(&[solid(10, 255), solid(10, 0)], 16);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], standardize_pixel(255));
        assert_relative_eq!(tensor[[1, 2, 15, 15]], standardize_pixel(0));
    }
}
