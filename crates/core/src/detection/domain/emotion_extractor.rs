use std::collections::BTreeMap;

use crate::shared::frame::Frame;

/// Named network outputs for one face crop, flattened.
pub type EmotionFeatures = BTreeMap<String, Vec<f32>>;

/// Output holding the per-crop feature vector.
pub const FEATURE_OUTPUT: &str = "emo_feat";

/// Outputs that are too large or only useful for visualisation.
pub const DISCARDED_OUTPUTS: &[&str] = &[FEATURE_OUTPUT, "heatmap"];

/// Per-channel RGB mean and deviation the emotion networks were trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub trait EmotionExtractor: Send {
    fn name(&self) -> &str;

    fn extract_batch(
        &mut self,
        crops: &[Frame],
    ) -> Result<Vec<EmotionFeatures>, Box<dyn std::error::Error>>;
}

/// Scales a pixel to 0..=1 and normalises it with the ImageNet statistics
/// of its channel.
pub fn normalize_imagenet(value: u8, channel: usize) -> f32 {
    (value as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
}

/// The feature vector of one crop: the `emo_feat` output, or the only
/// output of a single-head network.
pub fn feature_row(features: &EmotionFeatures) -> Option<&[f32]> {
    if let Some(row) = features.get(FEATURE_OUTPUT) {
        return Some(row);
    }
    match features.values().collect::<Vec<_>>().as_slice() {
        [only] => Some(only.as_slice()),
        _ => None,
    }
}

pub fn strip_discarded(features: &mut EmotionFeatures) {
    for name in DISCARDED_OUTPUTS {
        features.remove(*name);
    }
}
