use std::path::Path;

use crate::shared::frame::Frame;

/// Reads and writes single images (frames and face crops).
pub trait ImageStore: Send + Sync {
    /// Loads an image as RGB. `ordinal` is attached to the returned frame.
    fn load(&self, path: &Path, ordinal: usize) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Writes a frame, optionally resizing it to the given dimensions.
    fn save(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
