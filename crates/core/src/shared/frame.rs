use ndarray::ArrayView3;

use crate::shared::constants::{DETECTION_NUMBER_WIDTH, FRAME_IMAGE_EXTENSION, FRAME_NUMBER_WIDTH};

/// A decoded frame or face crop: contiguous RGB bytes in row-major order.
///
/// `ordinal` is the 1-based position of the frame within its sequence.
/// Crops inherit the ordinal of the frame they were cut from.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    ordinal: usize,
}

pub const CHANNELS: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, ordinal: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            ordinal,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Returns `None` if the buffer does not match the frame dimensions.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, CHANNELS),
            &self.data,
        )
        .ok()
    }

    /// Cuts a `side x side` square centred on `center` (x, y).
    ///
    /// Pixels outside the frame are black, so faces near the border keep
    /// their position inside the crop.
    pub fn crop_square(&self, center: [f64; 2], side: u32) -> Frame {
        let side = side.max(1);
        let origin_x = (center[0] - side as f64 / 2.0).round() as i64;
        let origin_y = (center[1] - side as f64 / 2.0).round() as i64;
        let mut data = vec![0u8; side as usize * side as usize * CHANNELS];
        let row_bytes = self.width as usize * CHANNELS;

        for row in 0..side as i64 {
            let src_y = origin_y + row;
            if src_y < 0 || src_y >= self.height as i64 {
                continue;
            }
            let first_col = (-origin_x).clamp(0, side as i64);
            let last_col = (self.width as i64 - origin_x).clamp(0, side as i64);
            if first_col >= last_col {
                continue;
            }
            let src_start = src_y as usize * row_bytes + (origin_x + first_col) as usize * CHANNELS;
            let len = (last_col - first_col) as usize * CHANNELS;
            let dst_start = (row as usize * side as usize + first_col as usize) * CHANNELS;
            data[dst_start..dst_start + len].copy_from_slice(&self.data[src_start..src_start + len]);
        }

        Frame::new(data, side, side, self.ordinal)
    }
}

/// `%06d.png` for the given 1-based frame ordinal.
pub fn frame_file_name(ordinal: usize) -> String {
    format!(
        "{:0width$}.{FRAME_IMAGE_EXTENSION}",
        ordinal,
        width = FRAME_NUMBER_WIDTH
    )
}

/// Stem shared by a detection crop and its landmark/emotion files: `%06d_%03d`.
pub fn detection_stem(ordinal: usize, index_in_frame: usize) -> String {
    format!(
        "{}_{:0dwidth$}",
        frame_number_prefix(ordinal),
        index_in_frame,
        dwidth = DETECTION_NUMBER_WIDTH
    )
}

/// `%06d` without extension; detection files start with this plus `_`.
pub fn frame_number_prefix(ordinal: usize) -> String {
    format!("{:0width$}", ordinal, width = FRAME_NUMBER_WIDTH)
}

/// Parses the ordinal back out of a frame file name such as `000012.png`.
pub fn ordinal_from_file_name(name: &str) -> Option<usize> {
    let stem = name.split('.').next()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height) as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 7]);
            }
        }
        Frame::new(data, width, height, 1)
    }

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12];
        let frame = Frame::new(data.clone(), 2, 2, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.ordinal(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * 3")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 1);
    }

    #[test]
    fn test_as_ndarray_pixel_access() {
        let frame = gradient(4, 2);
        let arr = frame.as_ndarray().unwrap();
        assert_eq!(arr.shape(), &[2, 4, 3]);
        assert_eq!(arr[[1, 3, 0]], 3);
        assert_eq!(arr[[1, 3, 1]], 1);
    }

    #[test]
    fn test_crop_square_inside_frame() {
        let frame = gradient(10, 10);
        let crop = frame.crop_square([5.0, 5.0], 4);
        assert_eq!((crop.width(), crop.height()), (4, 4));
        let arr = crop.as_ndarray().unwrap();
        assert_eq!(arr[[0, 0, 0]], 3);
        assert_eq!(arr[[0, 0, 1]], 3);
        assert_eq!(arr[[3, 3, 0]], 6);
    }

    #[test]
    fn test_crop_square_pads_outside_with_black() {
        let frame = gradient(4, 4);
        let crop = frame.crop_square([0.0, 0.0], 4);
        let arr = crop.as_ndarray().unwrap();
        assert_eq!(arr[[0, 0, 2]], 0);
        assert_eq!(arr[[1, 1, 2]], 0);
        assert_eq!(arr[[2, 2, 2]], 7);
        assert_eq!(arr[[2, 2, 0]], 0);
        assert_eq!(arr[[3, 3, 0]], 1);
    }

    #[test]
    fn test_crop_square_entirely_outside_is_black() {
        let frame = gradient(4, 4);
        let crop = frame.crop_square([100.0, 100.0], 3);
        assert!(crop.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_file_names_are_zero_padded() {
        assert_eq!(frame_file_name(1), "000001.png");
        assert_eq!(detection_stem(12, 0), "000012_000");
        assert_eq!(detection_stem(7, 3), "000007_003");
    }

    #[test]
    fn test_ordinal_from_file_name() {
        assert_eq!(ordinal_from_file_name("000012.png"), Some(12));
        assert_eq!(ordinal_from_file_name("frame.png"), None);
        assert_eq!(ordinal_from_file_name(""), None);
    }
}
