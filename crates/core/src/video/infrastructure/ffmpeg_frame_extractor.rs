use std::path::{Path, PathBuf};

use crate::shared::frame::{frame_file_name, Frame};
use crate::video::domain::frame_extractor::FrameExtractor;
use crate::video::domain::image_store::ImageStore;
use crate::video::infrastructure::image_file_store::ImageFileStore;

/// Decodes the first video stream via ffmpeg-next and writes RGB frames
/// through an [`ImageStore`].
pub struct FfmpegFrameExtractor {
    images: Box<dyn ImageStore>,
}

impl FfmpegFrameExtractor {
    pub fn new(images: Box<dyn ImageStore>) -> Self {
        Self { images }
    }
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new(Box::new(ImageFileStore::new()))
    }
}

/// Per-video decode state shared between packet feeding and the final flush.
struct FrameSink<'a> {
    images: &'a dyn ImageStore,
    scaler: ffmpeg_next::software::scaling::Context,
    out_dir: &'a Path,
    width: u32,
    height: u32,
    ordinal: usize,
    written: Vec<PathBuf>,
}

impl FrameSink<'_> {
    fn drain(&mut self, decoder: &mut ffmpeg_next::decoder::Video) {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            self.ordinal += 1;
            let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
            if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
                log::warn!("Skipping frame {}: conversion failed: {e}", self.ordinal);
                continue;
            }
            let frame = Frame::new(
                extract_rgb_pixels(&rgb, self.width, self.height),
                self.width,
                self.height,
                self.ordinal,
            );
            let path = self.out_dir.join(frame_file_name(self.ordinal));
            match self.images.save(&path, &frame, None) {
                Ok(()) => self.written.push(path),
                Err(e) => log::warn!("Skipping frame {}: {e}", self.ordinal),
            }
        }
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract(
        &mut self,
        video: &Path,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let mut ictx = ffmpeg_next::format::input(video)?;

        let (stream_index, mut decoder) = {
            let stream = first_video_stream(&ictx).ok_or("No video stream found")?;
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
            (stream.index(), codec_ctx.decoder().video()?)
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        std::fs::create_dir_all(out_dir)?;
        let mut sink = FrameSink {
            images: self.images.as_ref(),
            scaler,
            out_dir,
            width,
            height,
            ordinal: 0,
            written: Vec::new(),
        };

        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                log::warn!("Dropping undecodable packet in {}: {e}", video.display());
                continue;
            }
            sink.drain(&mut decoder);
        }
        decoder.send_eof()?;
        sink.drain(&mut decoder);

        log::info!(
            "Extracted {} frames from {} into {}",
            sink.written.len(),
            video.display(),
            out_dir.display()
        );
        Ok(sink.written)
    }
}

/// The first video stream in container order. Stream metadata in the
/// catalog is recorded for this stream, so frames must come from it too.
pub fn first_video_stream(
    ictx: &ffmpeg_next::format::context::Input,
) -> Option<ffmpeg_next::format::stream::Stream<'_>> {
    ictx.streams()
        .find(|s| s.parameters().medium() == ffmpeg_next::media::Type::Video)
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
