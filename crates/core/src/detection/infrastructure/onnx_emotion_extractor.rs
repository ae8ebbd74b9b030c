use std::path::Path;

use crate::detection::domain::emotion_extractor::{
    normalize_imagenet, EmotionExtractor, EmotionFeatures,
};
use crate::detection::infrastructure::execution_provider::{fixed_input_size, open_session};
use crate::detection::infrastructure::onnx_face_detector::model_name;
use crate::shared::frame::Frame;

const DEFAULT_INPUT_SIZE: u32 = 224;

/// Emotion-feature network with several named outputs (valence, arousal,
/// expression logits, ...). Every output is split per crop and flattened.
pub struct OnnxEmotionExtractor {
    session: ort::session::Session,
    input_size: u32,
    output_names: Vec<String>,
    name: String,
}

impl OnnxEmotionExtractor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = open_session(model_path)?;
        let input_size = fixed_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        let output_names = session
            .outputs()
            .iter()
            .map(|output| output.name().to_string())
            .collect();
        Ok(Self {
            session,
            input_size,
            output_names,
            name: model_name(model_path),
        })
    }
}

impl EmotionExtractor for OnnxEmotionExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract_batch(
        &mut self,
        crops: &[Frame],
    ) -> Result<Vec<EmotionFeatures>, Box<dyn std::error::Error>> {
        if crops.is_empty() {
            return Ok(Vec::new());
        }
        let tensor = preprocess(crops, self.input_size as usize);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let mut features = vec![EmotionFeatures::new(); crops.len()];
        for (index, name) in self.output_names.iter().enumerate() {
            let array = outputs[index].try_extract_array::<f32>()?;
            let data = array.as_slice().ok_or("emotion output is not contiguous")?;
            let chunks = split_per_crop(name, data, crops.len())?;
            for (crop_features, chunk) in features.iter_mut().zip(chunks) {
                crop_features.insert(name.clone(), chunk.to_vec());
            }
        }
        Ok(features)
    }
}

/// Splits a batched output into one equally sized slice per crop.
fn split_per_crop<'d>(
    name: &str,
    data: &'d [f32],
    crops: usize,
) -> Result<std::slice::Chunks<'d, f32>, Box<dyn std::error::Error>> {
    if data.is_empty() || data.len() % crops != 0 {
        return Err(format!(
            "emotion output {name} of {} values does not split into {crops} crops",
            data.len()
        )
        .into());
    }
    Ok(data.chunks(data.len() / crops))
}

/// Resample crops into `[n, 3, size, size]`, ImageNet-normalised per channel.
fn preprocess(crops: &[Frame], size: usize) -> ndarray::Array4<f32> {
    let mut tensor = ndarray::Array4::<f32>::zeros((crops.len(), 3, size, size));
    for (n, crop) in crops.iter().enumerate() {
        let Some(src) = crop.as_ndarray() else {
            continue;
        };
        let src_w = crop.width() as usize;
        let src_h = crop.height() as usize;
        if src_w == 0 || src_h == 0 {
            continue;
        }
        for y in 0..size {
            let src_y = (y * src_h / size).min(src_h - 1);
            for x in 0..size {
                let src_x = (x * src_w / size).min(src_w - 1);
                for c in 0..3 {
                    tensor[[n, c, y, x]] = normalize_imagenet(src[[src_y, src_x, c]], c);
                }
            }
        }
    }
    tensor
}
