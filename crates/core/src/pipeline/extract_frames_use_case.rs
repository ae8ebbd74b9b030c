use std::time::Instant;

use crate::cache::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::cache::record::{write_record, RecordKind};
use crate::cache::records::FrameManifest;
use crate::catalog::domain::video_catalog::CatalogEntry;
use crate::pipeline::pipeline_context::{elapsed_ms, reuse_cached, PipelineContext};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage::{Stage, StageOutcome, StageReport};
use crate::video::domain::frame_extractor::FrameExtractor;

/// Decodes a sequence into numbered frame images and records them in the
/// frame manifest.
pub struct ExtractFramesUseCase<'a> {
    ctx: PipelineContext<'a>,
    extractor: &'a mut dyn FrameExtractor,
}

impl<'a> ExtractFramesUseCase<'a> {
    pub fn new(ctx: PipelineContext<'a>, extractor: &'a mut dyn FrameExtractor) -> Self {
        Self { ctx, extractor }
    }

    /// Frames depend on the video file and what the catalog knows about it.
    pub fn fingerprint(&self, entry: &CatalogEntry) -> Result<Fingerprint, PipelineError> {
        let video = self.ctx.video_path(entry);
        let size = std::fs::metadata(&video)
            .map_err(|source| PipelineError::Io {
                path: video.clone(),
                source,
            })?
            .len();
        Ok(FingerprintBuilder::new("frames")
            .path(&entry.relative_path)
            .str(&entry.meta.fps.to_string())
            .u64(entry.meta.width as u64)
            .u64(entry.meta.height as u64)
            .u64(entry.meta.frame_count as u64)
            .u64(size)
            .finish())
    }

    pub fn execute(
        &mut self,
        entry: &CatalogEntry,
        logger: &mut dyn PipelineLogger,
    ) -> Result<StageReport, PipelineError> {
        let video = &entry.relative_path;
        let manifest_path = self.ctx.layout.frame_manifest_file(video)?;
        let expected = self.fingerprint(entry)?;

        if let Some((fingerprint, manifest)) =
            reuse_cached::<FrameManifest>(&manifest_path, RecordKind::FrameManifest, Some(&expected))
        {
            log::debug!("Frames of {} are current", video.display());
            return Ok(StageReport {
                stage: Stage::Extract,
                outcome: StageOutcome::Skipped,
                fingerprint: Some(fingerprint),
                items: manifest.frames.len(),
            });
        }

        let start = Instant::now();
        let frames_dir = self.ctx.layout.frames_dir(video)?;
        let written = self
            .extractor
            .extract(&self.ctx.video_path(entry), &frames_dir)
            .map_err(PipelineError::collaborator(Stage::Extract))?;

        if written.len() != entry.meta.frame_count {
            log::warn!(
                "{}: extracted {} frames, container reports {}",
                video.display(),
                written.len(),
                entry.meta.frame_count
            );
        }

        let manifest = FrameManifest {
            frames: written.iter().map(|p| self.ctx.layout.normalize(p)).collect(),
        };
        write_record(&manifest_path, RecordKind::FrameManifest, expected, &manifest)?;
        logger.timing(Stage::Extract, elapsed_ms(start));
        logger.info(&format!(
            "Extracted {} frames from {}",
            manifest.frames.len(),
            video.display()
        ));

        Ok(StageReport {
            stage: Stage::Extract,
            outcome: StageOutcome::Computed,
            fingerprint: Some(expected),
            items: manifest.frames.len(),
        })
    }
}
