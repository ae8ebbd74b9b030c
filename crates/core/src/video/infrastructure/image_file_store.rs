use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_store::ImageStore;

/// [`ImageStore`] on the local filesystem using the `image` crate.
/// The format follows the file extension.
#[derive(Default)]
pub struct ImageFileStore;

impl ImageFileStore {
    pub fn new() -> Self {
        Self
    }
}

impl ImageStore for ImageFileStore {
    fn load(&self, path: &Path, ordinal: usize) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Frame::new(img.into_raw(), width, height, ordinal))
    }

    fn save(
        &self,
        path: &Path,
        frame: &Frame,
        size: Option<(u32, u32)>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;

        let img = match size {
            Some((w, h)) if (w, h) != (frame.width(), frame.height()) => {
                image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle)
            }
            _ => img,
        };

        img.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb.repeat((width * height) as usize);
        Frame::new(data, width, height, 1)
    }

    #[test]
    fn test_save_then_load_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("000001.png");
        let store = ImageFileStore::new();
        store.save(&path, &solid(40, 30, [50, 100, 200]), None).unwrap();

        let frame = store.load(&path, 7).unwrap();
        assert_eq!((frame.width(), frame.height()), (40, 30));
        assert_eq!(frame.ordinal(), 7);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_save_with_resize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop.png");
        let store = ImageFileStore::new();
        store
            .save(&path, &solid(300, 300, [128, 128, 128]), Some((224, 224)))
            .unwrap();
        let frame = store.load(&path, 1).unwrap();
        assert_eq!((frame.width(), frame.height()), (224, 224));
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let store = ImageFileStore::new();
        assert!(store.load(Path::new("/nonexistent/000001.png"), 1).is_err());
    }

    #[test]
    fn test_load_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(ImageFileStore::new().load(&path, 1).is_err());
    }
}
