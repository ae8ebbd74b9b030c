use std::path::PathBuf;
use std::time::Instant;

use crate::cache::fingerprint::FingerprintBuilder;
use crate::cache::record::{write_json, write_record, RecordKind};
use crate::cache::records::{DetectionRecord, EmotionManifest, FeatureMatrix};
use crate::catalog::domain::video_catalog::CatalogEntry;
use crate::detection::domain::emotion_extractor::{feature_row, strip_discarded, EmotionExtractor};
use crate::pipeline::pipeline_context::{
    elapsed_ms, load_images, load_prerequisite, reuse_cached, PipelineContext,
};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage::{Stage, StageOutcome, StageReport};
use crate::video::domain::image_store::ImageStore;

/// Optional stage: writes one JSON file of emotion features per detection
/// and a per-sequence matrix of their feature vectors.
pub struct ExtractEmotionsUseCase<'a> {
    ctx: PipelineContext<'a>,
    extractor: Option<&'a mut dyn EmotionExtractor>,
    images: &'a dyn ImageStore,
}

impl<'a> ExtractEmotionsUseCase<'a> {
    pub fn new(
        ctx: PipelineContext<'a>,
        extractor: Option<&'a mut dyn EmotionExtractor>,
        images: &'a dyn ImageStore,
    ) -> Self {
        Self {
            ctx,
            extractor,
            images,
        }
    }

    pub fn execute(
        &mut self,
        entry: &CatalogEntry,
        logger: &mut dyn PipelineLogger,
    ) -> Result<StageReport, PipelineError> {
        let video = entry.relative_path.as_path();
        let (detections_fp, detections): (_, DetectionRecord) = load_prerequisite(
            &self.ctx.layout.detections_file(video)?,
            RecordKind::Detections,
            Stage::Emotions,
            Stage::Detect,
            video,
        )?;

        let manifest_path = self.ctx.layout.emotion_manifest_file(video)?;
        let matrix_path = self.ctx.layout.feature_matrix_file(video)?;
        let expected = self.extractor.as_deref().map(|extractor| {
            FingerprintBuilder::new("emotions")
                .fingerprint(&detections_fp)
                .str(extractor.name())
                .finish()
        });
        let cached = reuse_cached::<EmotionManifest>(
            &manifest_path,
            RecordKind::EmotionManifest,
            expected.as_ref(),
        )
        .zip(reuse_cached::<FeatureMatrix>(
            &matrix_path,
            RecordKind::FeatureMatrix,
            expected.as_ref(),
        ));
        if let Some(((fingerprint, manifest), _)) = cached {
            return Ok(StageReport {
                stage: Stage::Emotions,
                outcome: StageOutcome::Skipped,
                fingerprint: Some(fingerprint),
                items: manifest.files.len(),
            });
        }
        let (Some(expected), Some(extractor)) = (expected, self.extractor.as_deref_mut()) else {
            log::info!("No emotion model configured, skipping emotions of {}", video.display());
            return Ok(StageReport::not_applicable(Stage::Emotions));
        };

        let start = Instant::now();
        let out_dir = self.ctx.layout.emotions_dir(video)?;
        let items: Vec<(usize, PathBuf, usize)> = detections
            .detections
            .iter()
            .enumerate()
            .map(|(i, d)| (i, self.ctx.absolute(&d.path), d.frame))
            .collect();
        let total = items.len();

        let mut manifest = EmotionManifest::default();
        let mut matrix = FeatureMatrix::default();
        let mut processed = 0;
        for chunk in items.chunks(self.ctx.settings.batch_size.max(1)) {
            let (positions, crops) = load_images(self.images, chunk);
            processed += chunk.len();
            if crops.is_empty() {
                continue;
            }
            let features = extractor
                .extract_batch(&crops)
                .map_err(PipelineError::collaborator(Stage::Emotions))?;
            if features.len() != crops.len() {
                return Err(PipelineError::Collaborator {
                    stage: Stage::Emotions,
                    source: format!(
                        "emotion extractor returned {} results for {} crops",
                        features.len(),
                        crops.len()
                    )
                    .into(),
                });
            }
            for (position, mut features) in positions.into_iter().zip(features) {
                let detection = &detections.detections[position];
                if let Some(row) = feature_row(&features) {
                    matrix
                        .push(detection.path.clone(), row.to_vec())
                        .map_err(|reason| PipelineError::Collaborator {
                            stage: Stage::Emotions,
                            source: reason.into(),
                        })?;
                }
                strip_discarded(&mut features);
                let stem = detection
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| position.to_string());
                let path = out_dir.join(format!("{stem}.json"));
                write_json(&path, &features)?;
                manifest.files.push(self.ctx.layout.normalize(&path));
            }
            logger.progress(Stage::Emotions, processed, total);
        }

        if matrix.rows.len() < manifest.files.len() {
            log::warn!(
                "No feature vector for {} of {} faces of {}",
                manifest.files.len() - matrix.rows.len(),
                manifest.files.len(),
                video.display()
            );
        }
        write_record(&matrix_path, RecordKind::FeatureMatrix, expected, &matrix)?;
        write_record(&manifest_path, RecordKind::EmotionManifest, expected, &manifest)?;
        logger.timing(Stage::Emotions, elapsed_ms(start));
        logger.info(&format!(
            "Wrote emotion features for {} of {total} faces of {} ({}-dim feature matrix)",
            manifest.files.len(),
            video.display(),
            matrix.dim()
        ));

        Ok(StageReport {
            stage: Stage::Emotions,
            outcome: StageOutcome::Computed,
            fingerprint: Some(expected),
            items: manifest.files.len(),
        })
    }
}
