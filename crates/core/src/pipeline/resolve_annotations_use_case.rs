use std::time::Instant;

use crate::annotation::domain::annotation_category::AnnotationCategory;
use crate::annotation::domain::annotation_resolver::{resolve_streams, DetectionCenters};
use crate::annotation::infrastructure::csv_annotation_reader::read_annotation_stream;
use crate::cache::fingerprint::FingerprintBuilder;
use crate::cache::record::{write_record, RecordKind};
use crate::cache::records::{DetectionRecord, RecognitionRecord, ValidatedAnnotationsRecord};
use crate::catalog::domain::video_catalog::{CatalogEntry, VideoCatalog};
use crate::pipeline::pipeline_context::{elapsed_ms, load_prerequisite, reuse_cached, PipelineContext};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage::{Stage, StageOutcome, StageReport};

/// Assigns the annotation files of a sequence to its identity clusters and
/// keeps the rows that line up with a detection of that identity.
pub struct ResolveAnnotationsUseCase<'a> {
    ctx: PipelineContext<'a>,
    catalog: &'a VideoCatalog,
}

impl<'a> ResolveAnnotationsUseCase<'a> {
    pub fn new(ctx: PipelineContext<'a>, catalog: &'a VideoCatalog) -> Self {
        Self { ctx, catalog }
    }

    pub fn execute(
        &self,
        entry: &CatalogEntry,
        logger: &mut dyn PipelineLogger,
    ) -> Result<StageReport, PipelineError> {
        let video = entry.relative_path.as_path();
        let Some(annotation_dir) = self.ctx.layout.annotation_dir(video)? else {
            log::info!("{} has no annotations to resolve", video.display());
            return Ok(StageReport::not_applicable(Stage::Resolve));
        };
        let files = self.catalog.annotation_files_for(video, &annotation_dir);
        if files.is_empty() {
            log::info!("No annotation streams for {}, skipping", video.display());
            return Ok(StageReport::not_applicable(Stage::Resolve));
        }
        let category = AnnotationCategory::from_category_dir(&self.ctx.layout.category(video)?)?;

        let settings = self.ctx.settings;
        let (recognition_fp, recognition): (_, RecognitionRecord) = load_prerequisite(
            &self
                .ctx
                .layout
                .recognition_file(video, settings.distance_threshold)?,
            RecordKind::Recognitions,
            Stage::Resolve,
            Stage::Recognize,
            video,
        )?;

        let mut fingerprint = FingerprintBuilder::new("validated_annotations")
            .fingerprint(&recognition_fp)
            .u64(settings.min_occurrences as u64);
        for (path, _) in &files {
            let absolute = self.ctx.catalog_root.join(path);
            let bytes = std::fs::read(&absolute).map_err(|source| PipelineError::Io {
                path: absolute.clone(),
                source,
            })?;
            fingerprint = fingerprint.path(path).bytes(&bytes);
        }
        let expected = fingerprint.finish();

        let record_path = self.ctx.layout.validated_annotations_file(video)?;
        if let Some((fingerprint, record)) = reuse_cached::<ValidatedAnnotationsRecord>(
            &record_path,
            RecordKind::ValidatedAnnotations,
            Some(&expected),
        ) {
            return Ok(StageReport {
                stage: Stage::Resolve,
                outcome: StageOutcome::Skipped,
                fingerprint: Some(fingerprint),
                items: record.assignments.len(),
            });
        }

        let start = Instant::now();
        let (_, detections): (_, DetectionRecord) = load_prerequisite(
            &self.ctx.layout.detections_file(video)?,
            RecordKind::Detections,
            Stage::Resolve,
            Stage::Detect,
            video,
        )?;
        let streams = files
            .into_iter()
            .map(|(path, suffix)| {
                read_annotation_stream(&self.ctx.catalog_root.join(path), suffix, category)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let centers = DetectionCenters::new(&detections.detections);
        let assignments = resolve_streams(&recognition.clusters, &centers, &streams)?;
        for (name, assignment) in &assignments {
            if recognition.classification.get(&assignment.label) != Some(&true) {
                log::warn!(
                    "Stream '{name}' was assigned identity {}, which has fewer than {} detections",
                    assignment.label,
                    settings.min_occurrences
                );
            }
            logger.metric("matched_rows", assignment.rows.len() as f64);
        }

        let record = ValidatedAnnotationsRecord {
            category,
            assignments,
        };
        write_record(&record_path, RecordKind::ValidatedAnnotations, expected, &record)?;
        logger.timing(Stage::Resolve, elapsed_ms(start));
        logger.info(&format!(
            "Resolved {} annotation stream(s) of {}",
            record.assignments.len(),
            video.display()
        ));

        Ok(StageReport {
            stage: Stage::Resolve,
            outcome: StageOutcome::Computed,
            fingerprint: Some(expected),
            items: record.assignments.len(),
        })
    }
}
