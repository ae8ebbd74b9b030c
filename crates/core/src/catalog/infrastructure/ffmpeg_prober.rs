use std::path::Path;

use crate::catalog::domain::video_prober::{VideoProber, VideoStreamInfo};
use crate::shared::sequence_meta::Rational;

/// Probes containers with libavformat.
#[derive(Default)]
pub struct FfmpegProber;

impl FfmpegProber {
    pub fn new() -> Self {
        Self
    }
}

impl VideoProber for FfmpegProber {
    fn probe(&self, path: &Path) -> Result<Vec<VideoStreamInfo>, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;

        let mut streams = Vec::new();
        for stream in ictx.streams() {
            if stream.parameters().medium() != ffmpeg_next::media::Type::Video {
                continue;
            }
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
            let decoder = codec_ctx.decoder().video()?;

            let rate = stream.avg_frame_rate();
            let avg_frame_rate = Rational::new(
                rate.numerator().max(0) as u32,
                rate.denominator().max(0) as u32,
            );
            let frame_count = if stream.frames() > 0 {
                stream.frames() as usize
            } else {
                // Some containers leave nb_frames unset; estimate from duration.
                let seconds = stream.duration().max(0) as f64 * f64::from(stream.time_base());
                (seconds * avg_frame_rate.as_f64()).round() as usize
            };

            streams.push(VideoStreamInfo {
                index: stream.index(),
                avg_frame_rate,
                width: decoder.width(),
                height: decoder.height(),
                frame_count,
            });
        }
        Ok(streams)
    }
}
