use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cache::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::cache::record::{write_record, RecordKind};
use crate::cache::records::{DetectionRecord, EmbeddingRecord, RecognitionRecord};
use crate::catalog::domain::video_catalog::CatalogEntry;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::pipeline::pipeline_context::{
    elapsed_ms, load_images, load_prerequisite, reuse_cached, PipelineContext,
};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage::{Stage, StageOutcome, StageReport};
use crate::recognition::domain::identity_cluster::{build_clusters, classify};
use crate::recognition::domain::identity_clusterer::IdentityClusterer;
use crate::video::domain::image_store::ImageStore;

/// Embeds every detected face and groups the embeddings into identities.
///
/// Embeddings are cached on their own, independently of the distance
/// threshold, so re-clustering with another threshold reuses them.
pub struct RecognizeFacesUseCase<'a> {
    ctx: PipelineContext<'a>,
    embedder: Option<&'a mut dyn FaceEmbedder>,
    images: &'a dyn ImageStore,
    clusterer: &'a dyn IdentityClusterer,
}

impl<'a> RecognizeFacesUseCase<'a> {
    pub fn new(
        ctx: PipelineContext<'a>,
        embedder: Option<&'a mut dyn FaceEmbedder>,
        images: &'a dyn ImageStore,
        clusterer: &'a dyn IdentityClusterer,
    ) -> Self {
        Self {
            ctx,
            embedder,
            images,
            clusterer,
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
            Stage::Recognize,
            Stage::Detect,
            video,
        )?;

        let start = Instant::now();
        let (embeddings_fp, embeddings, embedded) =
            self.embeddings(video, &detections_fp, &detections, logger)?;

        let settings = self.ctx.settings;
        let record_path = self
            .ctx
            .layout
            .recognition_file(video, settings.distance_threshold)?;
        let expected = FingerprintBuilder::new("recognitions")
            .fingerprint(&embeddings_fp)
            .f64(settings.distance_threshold)
            .u64(settings.min_samples as u64)
            .u64(settings.min_occurrences as u64)
            .finish();
        if let Some((fingerprint, _)) = reuse_cached::<RecognitionRecord>(
            &record_path,
            RecordKind::Recognitions,
            Some(&expected),
        ) {
            return Ok(StageReport {
                stage: Stage::Recognize,
                outcome: if embedded {
                    StageOutcome::Computed
                } else {
                    StageOutcome::Skipped
                },
                fingerprint: Some(fingerprint),
                items: embeddings.embeddings.len(),
            });
        }

        let labels = self.clusterer.cluster(&embeddings.embeddings)?;
        let clusters = build_clusters(&labels, &embeddings.embeddings, &embeddings.detection_paths)?;
        let classification = classify(&clusters, settings.min_occurrences);
        let valid = classification.values().filter(|v| **v).count();
        let record = RecognitionRecord {
            distance_threshold: settings.distance_threshold,
            labels,
            clusters,
            classification,
        };
        write_record(&record_path, RecordKind::Recognitions, expected, &record)?;

        logger.timing(Stage::Recognize, elapsed_ms(start));
        logger.metric("identities_per_sequence", valid as f64);
        logger.info(&format!(
            "{}: {} clusters, {valid} valid identities (threshold {})",
            video.display(),
            record.clusters.len(),
            settings.distance_threshold
        ));

        Ok(StageReport {
            stage: Stage::Recognize,
            outcome: StageOutcome::Computed,
            fingerprint: Some(expected),
            items: record.labels.len(),
        })
    }

    /// Returns the embeddings record, its fingerprint, and whether it had
    /// to be computed.
    fn embeddings(
        &mut self,
        video: &Path,
        detections_fp: &Fingerprint,
        detections: &DetectionRecord,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(Fingerprint, EmbeddingRecord, bool), PipelineError> {
        let path = self.ctx.layout.embeddings_file(video)?;
        let expected = self.embedder.as_deref().map(|embedder| {
            FingerprintBuilder::new("embeddings")
                .fingerprint(detections_fp)
                .str(embedder.name())
                .finish()
        });
        if let Some((fingerprint, record)) =
            reuse_cached::<EmbeddingRecord>(&path, RecordKind::Embeddings, expected.as_ref())
        {
            record.check_lockstep(&path)?;
            return Ok((fingerprint, record, false));
        }
        let (Some(expected), Some(embedder)) = (expected, self.embedder.as_deref_mut()) else {
            return Err(PipelineError::MissingCollaborator {
                stage: Stage::Recognize,
                collaborator: "face embedder",
            });
        };

        let items: Vec<(usize, PathBuf, usize)> = detections
            .detections
            .iter()
            .enumerate()
            .map(|(i, d)| (i, self.ctx.absolute(&d.path), d.frame))
            .collect();
        let total = items.len();
        let mut record = EmbeddingRecord::default();
        let mut processed = 0;
        for chunk in items.chunks(self.ctx.settings.batch_size.max(1)) {
            let (positions, crops) = load_images(self.images, chunk);
            processed += chunk.len();
            if crops.is_empty() {
                continue;
            }
            let vectors = embedder
                .embed_batch(&crops)
                .map_err(PipelineError::collaborator(Stage::Recognize))?;
            if vectors.len() != crops.len() {
                return Err(PipelineError::Collaborator {
                    stage: Stage::Recognize,
                    source: format!(
                        "embedder returned {} vectors for {} crops",
                        vectors.len(),
                        crops.len()
                    )
                    .into(),
                });
            }
            for (position, vector) in positions.into_iter().zip(vectors) {
                record.embeddings.push(vector);
                record
                    .detection_paths
                    .push(detections.detections[position].path.clone());
            }
            logger.progress(Stage::Recognize, processed, total);
        }
        if record.embeddings.len() < total {
            log::warn!(
                "{}: {} of {total} crops could not be embedded",
                video.display(),
                total - record.embeddings.len()
            );
        }

        record.check_lockstep(&path)?;
        write_record(&path, RecordKind::Embeddings, expected, &record)?;
        Ok((expected, record, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::record::read_record;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::pipeline::detect_faces_use_case::DetectFacesUseCase;
    use crate::pipeline::extract_frames_use_case::ExtractFramesUseCase;
    use crate::pipeline::pipeline_context::test_support::{
        Fixture, StubDetector, StubEmbedder, StubExtractor,
    };
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::recognition::domain::cluster_label::ClusterLabel;
    use crate::recognition::infrastructure::dbscan_clusterer::DbscanClusterer;
    use crate::video::infrastructure::image_file_store::ImageFileStore;

    fn detected(frames: usize) -> Fixture {
        let fixture = Fixture::new(frames);
        let mut extractor = StubExtractor::new(frames);
        ExtractFramesUseCase::new(fixture.ctx(), &mut extractor)
            .execute(&fixture.entry, &mut NullPipelineLogger)
            .unwrap();
        let images = ImageFileStore::new();
        let mut detector = StubDetector::new();
        DetectFacesUseCase::new(fixture.ctx(), Some(&mut detector as &mut dyn FaceDetector), &images)
            .execute(&fixture.entry, &mut NullPipelineLogger)
            .unwrap();
        fixture
    }

    fn recognize(
        fixture: &Fixture,
        embedder: Option<&mut StubEmbedder>,
    ) -> Result<StageReport, PipelineError> {
        let images = ImageFileStore::new();
        let settings = &fixture.settings;
        let clusterer = DbscanClusterer::new(settings.distance_threshold, settings.min_samples);
        let embedder = embedder.map(|e| e as &mut dyn FaceEmbedder);
        RecognizeFacesUseCase::new(fixture.ctx(), embedder, &images, &clusterer)
            .execute(&fixture.entry, &mut NullPipelineLogger)
    }

    fn recognition(fixture: &Fixture) -> RecognitionRecord {
        let path = fixture
            .layout
            .recognition_file(&fixture.entry.relative_path, fixture.settings.distance_threshold)
            .unwrap();
        read_record(&path, RecordKind::Recognitions).unwrap().1
    }

    fn embeddings(fixture: &Fixture) -> EmbeddingRecord {
        let path = fixture.layout.embeddings_file(&fixture.entry.relative_path).unwrap();
        read_record(&path, RecordKind::Embeddings).unwrap().1
    }

    // --- Clustering ---

    #[test]
    fn test_two_people_become_two_identities() {
        let mut fixture = detected(6);
        fixture.settings.min_occurrences = 6;
        let mut embedder = StubEmbedder::new();
        let report = recognize(&fixture, Some(&mut embedder)).unwrap();
        assert_eq!(report.outcome, StageOutcome::Computed);
        assert_eq!(report.items, 12);

        let record = recognition(&fixture);
        assert_eq!(record.clusters.len(), 2);
        let left = &record.clusters[&ClusterLabel::Identity(0)];
        assert_eq!(left.population(), 6);
        assert!(left
            .filenames
            .iter()
            .all(|f| f.to_string_lossy().ends_with("_000.png")));
        assert_eq!(
            record.valid_identities().collect::<Vec<_>>(),
            vec![ClusterLabel::Identity(0), ClusterLabel::Identity(1)]
        );
    }

    #[test]
    fn test_small_clusters_are_not_valid_identities() {
        let fixture = detected(6);
        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();
        // default min_occurrences is 20
        assert_eq!(recognition(&fixture).valid_identities().count(), 0);
    }

    #[test]
    fn test_too_few_samples_is_all_noise() {
        let fixture = detected(3);
        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();
        let record = recognition(&fixture);
        assert!(record.labels.iter().all(|l| l.is_noise()));
        assert_eq!(record.clusters.len(), 1);
    }

    // --- Lockstep ---

    #[test]
    fn test_unreadable_crop_is_dropped_from_every_array() {
        let fixture = detected(6);
        let broken = fixture.detections_dir().join("000002_001.png");
        std::fs::write(&broken, b"garbage").unwrap();

        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();

        let embeddings = embeddings(&fixture);
        assert_eq!(embeddings.embeddings.len(), 11);
        assert_eq!(embeddings.detection_paths.len(), 11);
        assert!(!embeddings
            .detection_paths
            .contains(&PathBuf::from("VA_Set/detections/Train_Set/7/000002_001.png")));
        assert_eq!(recognition(&fixture).labels.len(), 11);
    }

    // --- Caching ---

    #[test]
    fn test_rerun_skips_both_records() {
        let fixture = detected(6);
        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();
        let second = recognize(&fixture, Some(&mut embedder)).unwrap();
        assert_eq!(second.outcome, StageOutcome::Skipped);
        assert_eq!(embedder.embedded, 12);
    }

    #[test]
    fn test_new_threshold_reuses_embeddings() {
        let mut fixture = detected(6);
        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();

        fixture.settings.distance_threshold = 2.0;
        let report = recognize(&fixture, Some(&mut embedder)).unwrap();
        assert_eq!(report.outcome, StageOutcome::Computed);
        assert_eq!(embedder.embedded, 12);
        // both faces are now within reach of each other
        assert_eq!(recognition(&fixture).clusters.len(), 1);
        assert!(fixture
            .detections_dir()
            .join("recognition_dist_2.000.bin")
            .is_file());
    }

    #[test]
    fn test_cached_embeddings_used_without_embedder() {
        let fixture = detected(6);
        let mut embedder = StubEmbedder::new();
        recognize(&fixture, Some(&mut embedder)).unwrap();
        let report = recognize(&fixture, None).unwrap();
        assert_eq!(report.outcome, StageOutcome::Skipped);
    }

    #[test]
    fn test_missing_embedder_without_cache() {
        let fixture = detected(2);
        assert!(matches!(
            recognize(&fixture, None),
            Err(PipelineError::MissingCollaborator {
                stage: Stage::Recognize,
                ..
            })
        ));
    }
}
