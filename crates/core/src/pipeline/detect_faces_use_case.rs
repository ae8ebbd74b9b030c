use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::cache::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::cache::record::{write_json, write_record, RecordKind};
use crate::cache::records::{DetectionRecord, FrameManifest};
use crate::catalog::domain::video_catalog::CatalogEntry;
use crate::detection::domain::detection::{crop_geometry, Detection};
use crate::detection::domain::face_detector::{DetectedFace, FaceDetector};
use crate::pipeline::pipeline_context::{
    elapsed_ms, load_images, load_prerequisite, reuse_cached, PipelineContext,
};
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::stage::{Stage, StageOutcome, StageReport};
use crate::shared::frame::{detection_stem, ordinal_from_file_name, Frame};
use crate::video::domain::image_store::ImageStore;

/// Runs the face detector over the extracted frames, writing one square
/// crop and one landmark file per detected face.
pub struct DetectFacesUseCase<'a> {
    ctx: PipelineContext<'a>,
    detector: Option<&'a mut dyn FaceDetector>,
    images: &'a dyn ImageStore,
}

/// Where the artifacts of one sequence's detections go.
struct DetectionDirs {
    crops: PathBuf,
    landmarks: PathBuf,
}

impl<'a> DetectFacesUseCase<'a> {
    pub fn new(
        ctx: PipelineContext<'a>,
        detector: Option<&'a mut dyn FaceDetector>,
        images: &'a dyn ImageStore,
    ) -> Self {
        Self {
            ctx,
            detector,
            images,
        }
    }

    pub fn fingerprint(&self, frames: &Fingerprint, detector: &str) -> Fingerprint {
        let settings = self.ctx.settings;
        FingerprintBuilder::new("detections")
            .fingerprint(frames)
            .str(detector)
            .f64(settings.face_detector_threshold)
            .f64(settings.scale)
            .u64(settings.image_size as u64)
            .finish()
    }

    pub fn execute(
        &mut self,
        entry: &CatalogEntry,
        logger: &mut dyn PipelineLogger,
    ) -> Result<StageReport, PipelineError> {
        let video = entry.relative_path.as_path();
        let (frames_fp, manifest): (_, FrameManifest) = load_prerequisite(
            &self.ctx.layout.frame_manifest_file(video)?,
            RecordKind::FrameManifest,
            Stage::Detect,
            Stage::Extract,
            video,
        )?;

        let record_path = self.ctx.layout.detections_file(video)?;
        let expected = self
            .detector
            .as_deref()
            .map(|d| self.fingerprint(&frames_fp, d.name()));
        if let Some((fingerprint, record)) =
            reuse_cached::<DetectionRecord>(&record_path, RecordKind::Detections, expected.as_ref())
        {
            return Ok(StageReport {
                stage: Stage::Detect,
                outcome: StageOutcome::Skipped,
                fingerprint: Some(fingerprint),
                items: record.detections.len(),
            });
        }
        let Some(expected) = expected else {
            return Err(PipelineError::MissingCollaborator {
                stage: Stage::Detect,
                collaborator: "face detector",
            });
        };

        let start = Instant::now();
        let dirs = DetectionDirs {
            crops: self.ctx.layout.detections_dir(video)?,
            landmarks: self.ctx.layout.landmarks_dir(video)?,
        };
        let items: Vec<(usize, PathBuf, usize)> = manifest
            .frames
            .iter()
            .enumerate()
            .map(|(i, path)| (i, self.ctx.absolute(path), frame_ordinal(path, i)))
            .collect();

        let mut record = DetectionRecord::default();
        let total = items.len();
        let mut processed = 0;
        for chunk in items.chunks(self.ctx.settings.batch_size.max(1)) {
            let (_, frames) = load_images(self.images, chunk);
            self.detect_chunk(&frames, &dirs, &mut record)?;
            processed += chunk.len();
            logger.progress(Stage::Detect, processed, total);
        }

        write_record(&record_path, RecordKind::Detections, expected, &record)?;
        logger.timing(Stage::Detect, elapsed_ms(start));
        if total > 0 {
            logger.metric(
                "faces_per_frame",
                record.detections.len() as f64 / total as f64,
            );
        }
        logger.info(&format!(
            "Detected {} faces in {} frames of {}",
            record.detections.len(),
            total,
            video.display()
        ));

        Ok(StageReport {
            stage: Stage::Detect,
            outcome: StageOutcome::Computed,
            fingerprint: Some(expected),
            items: record.detections.len(),
        })
    }

    fn detect_chunk(
        &mut self,
        frames: &[Frame],
        dirs: &DetectionDirs,
        record: &mut DetectionRecord,
    ) -> Result<(), PipelineError> {
        if frames.is_empty() {
            return Ok(());
        }
        let Some(detector) = self.detector.as_deref_mut() else {
            return Err(PipelineError::MissingCollaborator {
                stage: Stage::Detect,
                collaborator: "face detector",
            });
        };
        let results = detector
            .detect_batch(frames, self.ctx.settings.face_detector_threshold)
            .map_err(PipelineError::collaborator(Stage::Detect))?;
        if results.len() != frames.len() {
            return Err(PipelineError::Collaborator {
                stage: Stage::Detect,
                source: format!(
                    "detector returned {} results for {} frames",
                    results.len(),
                    frames.len()
                )
                .into(),
            });
        }

        for (frame, result) in frames.iter().zip(results) {
            match result {
                Ok(faces) => {
                    for (index, face) in faces.iter().enumerate() {
                        let detection = self.save_face(frame, index, face, dirs)?;
                        record.detections.push(detection);
                    }
                    record.last_frame_id = record.last_frame_id.max(frame.ordinal());
                }
                Err(e) => log::warn!("Skipping frame {}: {e}", frame.ordinal()),
            }
        }
        Ok(())
    }

    fn save_face(
        &self,
        frame: &Frame,
        index: usize,
        face: &DetectedFace,
        dirs: &DetectionDirs,
    ) -> Result<Detection, PipelineError> {
        let settings = self.ctx.settings;
        let (center, size) = crop_geometry(&face.bbox, settings.scale);
        let stem = detection_stem(frame.ordinal(), index);

        let crop_path = dirs.crops.join(format!("{stem}.png"));
        let crop = frame.crop_square(center, size.round().max(1.0) as u32);
        self.images
            .save(
                &crop_path,
                &crop,
                Some((settings.image_size, settings.image_size)),
            )
            .map_err(PipelineError::collaborator(Stage::Detect))?;

        let landmark_path = dirs.landmarks.join(format!("{stem}.json"));
        write_json(
            &landmark_path,
            &face.landmarks.to_crop_space(center, size, settings.image_size),
        )?;

        Ok(Detection {
            frame: frame.ordinal(),
            center,
            size,
            path: self.ctx.layout.normalize(&crop_path),
            landmark_path: self.ctx.layout.normalize(&landmark_path),
        })
    }
}

/// Ordinal from a `%06d.png` name, else the 1-based manifest position.
fn frame_ordinal(path: &Path, position: usize) -> usize {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(ordinal_from_file_name)
        .unwrap_or(position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::record::{read_json, read_record};
    use crate::detection::domain::face_landmarks::FaceLandmarks;
    use crate::pipeline::extract_frames_use_case::ExtractFramesUseCase;
    use crate::pipeline::pipeline_context::test_support::{Fixture, StubDetector, StubExtractor};
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::video::infrastructure::image_file_store::ImageFileStore;
    use approx::assert_relative_eq;

    fn extracted(frames: usize) -> Fixture {
        let fixture = Fixture::new(frames);
        let mut extractor = StubExtractor::new(frames);
        ExtractFramesUseCase::new(fixture.ctx(), &mut extractor)
            .execute(&fixture.entry, &mut NullPipelineLogger)
            .unwrap();
        fixture
    }

    fn detect(
        fixture: &Fixture,
        detector: Option<&mut StubDetector>,
    ) -> Result<StageReport, PipelineError> {
        let images = ImageFileStore::new();
        let detector = detector.map(|d| d as &mut dyn FaceDetector);
        DetectFacesUseCase::new(fixture.ctx(), detector, &images)
            .execute(&fixture.entry, &mut NullPipelineLogger)
    }

    fn record(fixture: &Fixture) -> DetectionRecord {
        let path = fixture.layout.detections_file(&fixture.entry.relative_path).unwrap();
        read_record(&path, RecordKind::Detections).unwrap().1
    }

    // --- Detection record ---

    #[test]
    fn test_detections_are_in_frame_then_index_order() {
        let fixture = extracted(5);
        let mut detector = StubDetector::new();
        let report = detect(&fixture, Some(&mut detector)).unwrap();

        assert_eq!(report.outcome, StageOutcome::Computed);
        assert_eq!(report.items, 10);
        // batch_size 4 over 5 frames
        assert_eq!(detector.calls, 2);

        let record = record(&fixture);
        assert_eq!(record.last_frame_id, 5);
        let names: Vec<String> = record
            .detections
            .iter()
            .take(3)
            .map(|d| d.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["000001_000.png", "000001_001.png", "000002_000.png"]);
        assert_eq!(
            record.detections[0].path,
            PathBuf::from("VA_Set/detections/Train_Set/7/000001_000.png")
        );
        assert_eq!(
            record.detections[0].landmark_path,
            PathBuf::from("VA_Set/landmarks/Train_Set/7/000001_000.json")
        );
    }

    #[test]
    fn test_crop_geometry_and_files() {
        let fixture = extracted(1);
        let mut detector = StubDetector::new();
        detect(&fixture, Some(&mut detector)).unwrap();

        let record = record(&fixture);
        let left = &record.detections[0];
        assert_relative_eq!(left.center[0], 12.0);
        assert_relative_eq!(left.center[1], 20.0);
        assert_relative_eq!(left.size, 20.0);

        let crop = ImageFileStore::new()
            .load(&fixture.ctx().absolute(&left.path), 1)
            .unwrap();
        assert_eq!((crop.width(), crop.height()), (224, 224));

        let landmarks: FaceLandmarks = read_json(&fixture.ctx().absolute(&left.landmark_path)).unwrap();
        // nose at the box center lands in the middle of the resized crop
        assert_relative_eq!(landmarks.points()[2].0, 112.0, epsilon = 1e-9);
        assert_relative_eq!(landmarks.points()[2].1, 112.0, epsilon = 1e-9);
    }

    #[test]
    fn test_failed_frame_is_skipped() {
        let fixture = extracted(3);
        let mut detector = StubDetector::new();
        detector.failing_ordinals = vec![2];
        detect(&fixture, Some(&mut detector)).unwrap();

        let frames: Vec<usize> = record(&fixture).detections.iter().map(|d| d.frame).collect();
        assert_eq!(frames, vec![1, 1, 3, 3]);
    }

    #[test]
    fn test_unreadable_frame_is_skipped() {
        let fixture = extracted(3);
        let frame = fixture.layout.frames_dir(&fixture.entry.relative_path).unwrap().join("000003.png");
        std::fs::write(frame, b"not a png").unwrap();

        let mut detector = StubDetector::new();
        detect(&fixture, Some(&mut detector)).unwrap();
        let record = record(&fixture);
        assert_eq!(record.detections.len(), 4);
        assert_eq!(record.last_frame_id, 2);
    }

    // --- Caching ---

    #[test]
    fn test_current_record_is_skipped() {
        let fixture = extracted(2);
        let mut detector = StubDetector::new();
        detect(&fixture, Some(&mut detector)).unwrap();
        let second = detect(&fixture, Some(&mut detector)).unwrap();
        assert_eq!(second.outcome, StageOutcome::Skipped);
        assert_eq!(second.items, 4);
        assert_eq!(detector.calls, 1);
    }

    #[test]
    fn test_changed_threshold_recomputes() {
        let mut fixture = extracted(2);
        let mut detector = StubDetector::new();
        detect(&fixture, Some(&mut detector)).unwrap();
        fixture.settings.face_detector_threshold = 0.5;
        let second = detect(&fixture, Some(&mut detector)).unwrap();
        assert_eq!(second.outcome, StageOutcome::Computed);
        assert_eq!(detector.calls, 2);
    }

    #[test]
    fn test_cached_record_used_without_detector() {
        let fixture = extracted(2);
        let mut detector = StubDetector::new();
        detect(&fixture, Some(&mut detector)).unwrap();
        let report = detect(&fixture, None).unwrap();
        assert_eq!(report.outcome, StageOutcome::Skipped);
    }

    // --- Errors ---

    #[test]
    fn test_missing_detector_without_cache() {
        let fixture = extracted(2);
        assert!(matches!(
            detect(&fixture, None),
            Err(PipelineError::MissingCollaborator {
                stage: Stage::Detect,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_frames_is_prerequisite_error() {
        let fixture = Fixture::new(2);
        let mut detector = StubDetector::new();
        assert!(matches!(
            detect(&fixture, Some(&mut detector)),
            Err(PipelineError::MissingPrerequisite {
                stage: Stage::Detect,
                prerequisite: Stage::Extract,
                ..
            })
        ));
    }

    #[test]
    fn test_frame_ordinal_falls_back_to_position() {
        assert_eq!(frame_ordinal(Path::new("a/000042.png"), 0), 42);
        assert_eq!(frame_ordinal(Path::new("a/frame.png"), 4), 5);
    }
}
