//! Payloads of the per-sequence cache records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::annotation::domain::annotation_category::AnnotationCategory;
use crate::annotation::domain::stream_matcher::ValidatedAssignment;
use crate::cache::record::CacheError;
use crate::detection::domain::detection::Detection;
use crate::recognition::domain::cluster_label::ClusterLabel;
use crate::recognition::domain::identity_cluster::IdentityCluster;

/// Extracted frame images of a sequence, relative to the output root.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub frames: Vec<PathBuf>,
}

/// All faces of a sequence in frame order, then within-frame order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub detections: Vec<Detection>,
    /// Ordinal of the last frame that was processed.
    pub last_frame_id: usize,
}

impl DetectionRecord {
    pub fn detection_paths(&self) -> impl Iterator<Item = &Path> {
        self.detections.iter().map(|d| d.path.as_path())
    }

    /// Detections grouped per frame ordinal.
    pub fn by_frame(&self) -> BTreeMap<usize, Vec<&Detection>> {
        let mut frames: BTreeMap<usize, Vec<&Detection>> = BTreeMap::new();
        for detection in &self.detections {
            frames.entry(detection.frame).or_default().push(detection);
        }
        frames
    }
}

/// Embedding vectors co-indexed with the detections they were computed from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub embeddings: Vec<Vec<f32>>,
    pub detection_paths: Vec<PathBuf>,
}

impl EmbeddingRecord {
    pub fn check_lockstep(&self, path: &Path) -> Result<(), CacheError> {
        if self.embeddings.len() != self.detection_paths.len() {
            return Err(CacheError::Inconsistent {
                path: path.to_path_buf(),
                reason: format!(
                    "{} embeddings for {} detections",
                    self.embeddings.len(),
                    self.detection_paths.len()
                ),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRecord {
    pub distance_threshold: f64,
    /// One label per embedding.
    pub labels: Vec<ClusterLabel>,
    pub clusters: BTreeMap<ClusterLabel, IdentityCluster>,
    pub classification: BTreeMap<ClusterLabel, bool>,
}

impl RecognitionRecord {
    pub fn valid_identities(&self) -> impl Iterator<Item = ClusterLabel> + '_ {
        self.classification
            .iter()
            .filter(|(_, valid)| **valid)
            .map(|(label, _)| *label)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAnnotationsRecord {
    pub category: AnnotationCategory,
    pub assignments: BTreeMap<String, ValidatedAssignment>,
}

/// Emotion feature files written for a sequence, relative to the output root.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionManifest {
    pub files: Vec<PathBuf>,
}

/// One feature vector per detection of a sequence, in detection order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub detection_paths: Vec<PathBuf>,
    pub rows: Vec<Vec<f32>>,
}

impl FeatureMatrix {
    /// Row length; zero while empty.
    pub fn dim(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Appends a row, rejecting one whose length differs from earlier rows.
    pub fn push(&mut self, detection: PathBuf, row: Vec<f32>) -> Result<(), String> {
        if !self.rows.is_empty() && row.len() != self.dim() {
            return Err(format!(
                "feature vector of {} values for {}, expected {}",
                row.len(),
                detection.display(),
                self.dim()
            ));
        }
        self.detection_paths.push(detection);
        self.rows.push(row);
        Ok(())
    }

    /// The rows as a `[detections, dim]` matrix.
    pub fn to_array(&self) -> ndarray::Array2<f32> {
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        ndarray::Array2::from_shape_vec((self.rows.len(), self.dim()), flat)
            .unwrap_or_else(|_| ndarray::Array2::zeros((0, 0)))
    }
}
