use std::path::Path;

use crate::shared::sequence_meta::Rational;

/// Properties of one video stream inside a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoStreamInfo {
    /// Stream index within the container.
    pub index: usize,
    pub avg_frame_rate: Rational,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
}

/// Reads stream information from a video container without decoding it.
pub trait VideoProber {
    /// Every video stream of the container, in container order.
    fn probe(&self, path: &Path) -> Result<Vec<VideoStreamInfo>, Box<dyn std::error::Error>>;
}
