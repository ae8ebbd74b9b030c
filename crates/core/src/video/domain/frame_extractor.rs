use std::path::{Path, PathBuf};

/// Decodes a video into numbered frame images.
pub trait FrameExtractor: Send {
    /// Writes every decodable frame of `video` into `out_dir` as `%06d.png`
    /// (1-based) and returns the written paths in frame order.
    ///
    /// Frames that fail to convert or write are skipped with a warning; an
    /// unreadable video is an error.
    fn extract(
        &mut self,
        video: &Path,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>>;
}
