use std::path::PathBuf;

use crate::catalog::domain::video_catalog::{CatalogEntry, VideoCatalog};
use crate::detection::domain::emotion_extractor::EmotionExtractor;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::pipeline::detect_faces_use_case::DetectFacesUseCase;
use crate::pipeline::extract_emotions_use_case::ExtractEmotionsUseCase;
use crate::pipeline::extract_frames_use_case::ExtractFramesUseCase;
use crate::pipeline::pipeline_context::PipelineContext;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::recognize_faces_use_case::RecognizeFacesUseCase;
use crate::pipeline::resolve_annotations_use_case::ResolveAnnotationsUseCase;
use crate::pipeline::stage::{SequenceReport, Stage, StageReport};
use crate::recognition::infrastructure::dbscan_clusterer::DbscanClusterer;
use crate::video::domain::frame_extractor::FrameExtractor;
use crate::video::domain::image_store::ImageStore;

/// Infrastructure the stages delegate to.
///
/// Model-backed collaborators are optional: a stage whose cache is present
/// can still be reused without its model, see [`PipelineError::MissingCollaborator`].
pub struct Collaborators {
    pub frame_extractor: Box<dyn FrameExtractor>,
    pub detector: Option<Box<dyn FaceDetector>>,
    pub embedder: Option<Box<dyn FaceEmbedder>>,
    pub emotion_extractor: Option<Box<dyn EmotionExtractor>>,
    pub images: Box<dyn ImageStore>,
}

/// What `run_all` does when a sequence fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and move on to the next sequence.
    Continue,
    /// Stop at the first failing sequence and return its error.
    Halt,
}

#[derive(Debug)]
pub struct SequenceFailure {
    pub index: usize,
    pub video: PathBuf,
    pub error: PipelineError,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SequenceReport>,
    pub failures: Vec<SequenceFailure>,
}

/// Runs the requested stages over catalog sequences, one sequence at a
/// time and in stage order. Stages whose caches are current are skipped.
pub struct SequencePipeline<'a> {
    ctx: PipelineContext<'a>,
    catalog: &'a VideoCatalog,
    collaborators: Collaborators,
    clusterer: DbscanClusterer,
    logger: Box<dyn PipelineLogger>,
}

impl<'a> SequencePipeline<'a> {
    pub fn new(
        ctx: PipelineContext<'a>,
        catalog: &'a VideoCatalog,
        collaborators: Collaborators,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        let clusterer =
            DbscanClusterer::new(ctx.settings.distance_threshold, ctx.settings.min_samples);
        Self {
            ctx,
            catalog,
            collaborators,
            clusterer,
            logger,
        }
    }

    pub fn logger(&self) -> &dyn PipelineLogger {
        self.logger.as_ref()
    }

    /// Runs `stages` for the sequence at `index`. Stages are executed in
    /// pipeline order whatever order they are given in.
    pub fn run(&mut self, index: usize, stages: &[Stage]) -> Result<SequenceReport, PipelineError> {
        let catalog = self.catalog;
        let entry = catalog.entry(index)?;
        let mut ordered = stages.to_vec();
        ordered.sort();
        ordered.dedup();

        log::info!(
            "Sequence {index}/{}: {}",
            catalog.len(),
            entry.relative_path.display()
        );
        let mut report = SequenceReport {
            index,
            video: entry.relative_path.clone(),
            stages: Vec::with_capacity(ordered.len()),
        };
        for stage in ordered {
            let stage_report = self.run_stage(stage, entry)?;
            log::debug!("{stage}: {:?} ({} items)", stage_report.outcome, stage_report.items);
            report.stages.push(stage_report);
        }
        self.logger.sequence_done(&report);
        Ok(report)
    }

    pub fn run_all(
        &mut self,
        stages: &[Stage],
        policy: FailurePolicy,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        for index in 0..self.catalog.len() {
            match self.run(index, stages) {
                Ok(report) => summary.reports.push(report),
                Err(error) if policy == FailurePolicy::Continue => {
                    let video = self.catalog.entries[index].relative_path.clone();
                    log::error!("Sequence {index} ({}) failed: {error}", video.display());
                    summary.failures.push(SequenceFailure { index, video, error });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(summary)
    }

    fn run_stage(&mut self, stage: Stage, entry: &CatalogEntry) -> Result<StageReport, PipelineError> {
        let ctx = self.ctx;
        let logger = self.logger.as_mut();
        let collaborators = &mut self.collaborators;
        let images = collaborators.images.as_ref();

        match stage {
            Stage::Extract => {
                ExtractFramesUseCase::new(ctx, collaborators.frame_extractor.as_mut())
                    .execute(entry, logger)
            }
            Stage::Detect => {
                let detector = collaborators
                    .detector
                    .as_deref_mut()
                    .map(|d| d as &mut dyn FaceDetector);
                DetectFacesUseCase::new(ctx, detector, images).execute(entry, logger)
            }
            Stage::Recognize => {
                let embedder = collaborators
                    .embedder
                    .as_deref_mut()
                    .map(|e| e as &mut dyn FaceEmbedder);
                RecognizeFacesUseCase::new(ctx, embedder, images, &self.clusterer)
                    .execute(entry, logger)
            }
            Stage::Emotions => {
                let extractor = collaborators
                    .emotion_extractor
                    .as_deref_mut()
                    .map(|e| e as &mut dyn EmotionExtractor);
                ExtractEmotionsUseCase::new(ctx, extractor, images).execute(entry, logger)
            }
            Stage::Resolve => ResolveAnnotationsUseCase::new(ctx, self.catalog).execute(entry, logger),
        }
    }
}
