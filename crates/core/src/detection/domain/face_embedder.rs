use crate::shared::frame::Frame;

/// Maps face crops to identity embedding vectors.
pub trait FaceEmbedder: Send {
    fn name(&self) -> &str;

    /// Returns one vector per crop, in order. All vectors share one length.
    fn embed_batch(&mut self, crops: &[Frame]) -> Result<Vec<Vec<f32>>, Box<dyn std::error::Error>>;
}

/// Pixel standardisation expected by the embedding network.
pub fn standardize_pixel(value: u8) -> f32 {
    (value as f32 - 127.5) / 128.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_standardize_pixel_range() {
        assert_relative_eq!(standardize_pixel(0), -127.5 / 128.0);
        assert_relative_eq!(standardize_pixel(255), 127.5 / 128.0);
        assert!(standardize_pixel(128) > 0.0);
    }
}
