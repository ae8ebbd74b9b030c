use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::artifact_kind::{ArtifactKind, ReconstructionMethod};
use crate::shared::constants::{DEFAULT_DISTANCE_THRESHOLD, LEGACY_RELATIVE_DEPTH};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// How the catalog root and output tree are organised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMode {
    /// `category/videos/set/<stem>.mp4` under a catalog root; outputs are
    /// grouped by category, kind and set.
    #[default]
    MultiVideo,
    /// One video; outputs live under a directory named after its stem.
    SingleVideo,
}

/// Derives artifact paths for sequences from their catalog-relative video
/// path. Pure: nothing here touches the filesystem.
#[derive(Clone, Debug)]
pub struct SequenceLayout {
    output_root: PathBuf,
    mode: CatalogMode,
}

pub const CATALOG_FILE: &str = "metadata.bin";
pub const FRAME_MANIFEST_FILE: &str = "frames.bin";
pub const DETECTIONS_FILE: &str = "bboxes.bin";
pub const EMBEDDINGS_FILE: &str = "embeddings.bin";
pub const VALIDATED_ANNOTATIONS_FILE: &str = "valid_annotations.bin";
pub const EMOTION_MANIFEST_FILE: &str = "emotions.bin";
pub const FEATURE_MATRIX_FILE: &str = "features.bin";

impl SequenceLayout {
    pub fn new(output_root: impl Into<PathBuf>, mode: CatalogMode) -> Self {
        Self {
            output_root: output_root.into(),
            mode,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn mode(&self) -> CatalogMode {
        self.mode
    }

    pub fn catalog_file(&self) -> PathBuf {
        self.output_root.join(CATALOG_FILE)
    }

    /// Directory holding artifacts of `kind` for the sequence at `video`.
    ///
    /// `method` is only meaningful for reconstructions, where it must name
    /// a known method; `deca` is the default and adds no component.
    pub fn sequence_dir(
        &self,
        video: &Path,
        kind: ArtifactKind,
        method: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<PathBuf, LayoutError> {
        let method = match (kind, method.filter(|m| !m.is_empty())) {
            (ArtifactKind::Reconstructions, Some(m)) => {
                m.parse::<ReconstructionMethod>()?.dir_component()
            }
            (_, m) => m,
        };
        let suffix = suffix.filter(|s| !s.is_empty());
        let stem = file_stem(video)?;

        match self.mode {
            CatalogMode::MultiVideo => {
                if kind == ArtifactKind::Results {
                    return Err(LayoutError::InvalidArgument(
                        "results are only laid out for single-video catalogs".to_string(),
                    ));
                }
                let parts = normal_components(video)?;
                let (category, set) = category_and_set(&parts, video)?;
                let mut kind_dir = kind.dir_name().to_string();
                if let Some(m) = method {
                    kind_dir.push('_');
                    kind_dir.push_str(m);
                }
                if let Some(s) = suffix {
                    kind_dir.push_str(s);
                }
                Ok(self
                    .output_root
                    .join(category)
                    .join(kind_dir)
                    .join(set)
                    .join(stem))
            }
            CatalogMode::SingleVideo => {
                let mut dir = self.output_root.join(stem).join(kind.dir_name());
                if let Some(m) = method {
                    dir.push(m);
                }
                if let Some(s) = suffix {
                    dir.push(s);
                }
                Ok(dir)
            }
        }
    }

    /// Same as [`sequence_dir`](Self::sequence_dir) with the kind given by name.
    pub fn resolve(
        &self,
        video: &Path,
        kind: &str,
        method: Option<&str>,
        suffix: Option<&str>,
    ) -> Result<PathBuf, LayoutError> {
        self.sequence_dir(video, kind.parse()?, method, suffix)
    }

    pub fn frames_dir(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        self.sequence_dir(video, ArtifactKind::Frames, None, None)
    }

    pub fn detections_dir(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        self.sequence_dir(video, ArtifactKind::Detections, None, None)
    }

    pub fn landmarks_dir(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        self.sequence_dir(video, ArtifactKind::Landmarks, None, None)
    }

    pub fn emotions_dir(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        self.sequence_dir(video, ArtifactKind::Emotions, None, None)
    }

    pub fn frame_manifest_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.frames_dir(video)?.join(FRAME_MANIFEST_FILE))
    }

    pub fn detections_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.detections_dir(video)?.join(DETECTIONS_FILE))
    }

    pub fn embeddings_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.detections_dir(video)?.join(EMBEDDINGS_FILE))
    }

    pub fn recognition_file(
        &self,
        video: &Path,
        distance_threshold: f64,
    ) -> Result<PathBuf, LayoutError> {
        Ok(self
            .detections_dir(video)?
            .join(recognition_file_name(distance_threshold)))
    }

    pub fn validated_annotations_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.detections_dir(video)?.join(VALIDATED_ANNOTATIONS_FILE))
    }

    pub fn emotion_manifest_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.emotions_dir(video)?.join(EMOTION_MANIFEST_FILE))
    }

    /// Per-sequence matrix of emotion feature vectors.
    pub fn feature_matrix_file(&self, video: &Path) -> Result<PathBuf, LayoutError> {
        Ok(self.emotions_dir(video)?.join(FEATURE_MATRIX_FILE))
    }

    /// Category directory name of a multi-video sequence (e.g. `VA_Set`).
    pub fn category(&self, video: &Path) -> Result<String, LayoutError> {
        let parts = normal_components(video)?;
        Ok(category_and_set(&parts, video)?.0.to_string())
    }

    /// Directory, relative to the catalog root, holding the annotation
    /// files of this sequence. Single-video catalogs carry no annotations.
    pub fn annotation_dir(&self, video: &Path) -> Result<Option<PathBuf>, LayoutError> {
        match self.mode {
            CatalogMode::SingleVideo => Ok(None),
            CatalogMode::MultiVideo => {
                let parts = normal_components(video)?;
                let (category, set) = category_and_set(&parts, video)?;
                Ok(Some(
                    PathBuf::from(category).join("annotations").join(set),
                ))
            }
        }
    }

    /// Makes a stored artifact path relative to the output root.
    ///
    /// Relative paths are returned unchanged. Absolute paths outside the
    /// root keep their last five components (`category/kind/set/stem/file`).
    pub fn normalize(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            return path.to_path_buf();
        }
        if let Ok(relative) = path.strip_prefix(&self.output_root) {
            return relative.to_path_buf();
        }
        let parts: Vec<_> = path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        let start = parts.len().saturating_sub(LEGACY_RELATIVE_DEPTH);
        parts[start..].iter().collect()
    }
}

/// `recognition.bin` for the default threshold, else `recognition_dist_<t:.3>.bin`.
pub fn recognition_file_name(distance_threshold: f64) -> String {
    if distance_threshold == DEFAULT_DISTANCE_THRESHOLD {
        "recognition.bin".to_string()
    } else {
        format!("recognition_dist_{distance_threshold:.3}.bin")
    }
}

fn file_stem(video: &Path) -> Result<&str, LayoutError> {
    video
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            LayoutError::InvalidArgument(format!("'{}' has no file stem", video.display()))
        })
}

fn normal_components(path: &Path) -> Result<Vec<&str>, LayoutError> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .map(|s| {
            s.to_str().ok_or_else(|| {
                LayoutError::InvalidArgument(format!("'{}' is not valid UTF-8", path.display()))
            })
        })
        .collect()
}

fn category_and_set<'a>(
    parts: &[&'a str],
    video: &Path,
) -> Result<(&'a str, &'a str), LayoutError> {
    if parts.len() < 4 {
        return Err(LayoutError::InvalidArgument(format!(
            "'{}' must look like category/kind/set/video",
            video.display()
        )));
    }
    Ok((parts[parts.len() - 4], parts[parts.len() - 2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn multi() -> SequenceLayout {
        SequenceLayout::new("/out", CatalogMode::MultiVideo)
    }

    fn single() -> SequenceLayout {
        SequenceLayout::new("/out", CatalogMode::SingleVideo)
    }

    fn video() -> PathBuf {
        PathBuf::from("VA_Set/videos/Train_Set/118.mp4")
    }

    #[rstest]
    #[case("videos", None, None, "/out/VA_Set/videos/Train_Set/118")]
    #[case("detections", None, None, "/out/VA_Set/detections/Train_Set/118")]
    #[case("segmentations", Some("bisenet"), None, "/out/VA_Set/segmentations_bisenet/Train_Set/118")]
    #[case("reconstructions", Some("emoca"), Some("_coarse"), "/out/VA_Set/reconstructions_emoca_coarse/Train_Set/118")]
    #[case("reconstructions", Some("deca"), None, "/out/VA_Set/reconstructions/Train_Set/118")]
    #[case("emotions", None, Some("_v2"), "/out/VA_Set/emotions_v2/Train_Set/118")]
    fn test_multi_video_layout(
        #[case] kind: &str,
        #[case] method: Option<&str>,
        #[case] suffix: Option<&str>,
        #[case] expected: &str,
    ) {
        let path = multi().resolve(&video(), kind, method, suffix).unwrap();
        assert_eq!(path, PathBuf::from(expected));
    }

    #[rstest]
    #[case("videos", None, None, "/out/clip/videos")]
    #[case("reconstructions", Some("deep3dface"), Some("detail"), "/out/clip/reconstructions/deep3dface/detail")]
    #[case("results", None, None, "/out/clip/results")]
    fn test_single_video_layout(
        #[case] kind: &str,
        #[case] method: Option<&str>,
        #[case] suffix: Option<&str>,
        #[case] expected: &str,
    ) {
        let path = single()
            .resolve(Path::new("clip.mp4"), kind, method, suffix)
            .unwrap();
        assert_eq!(path, PathBuf::from(expected));
    }

    #[test]
    fn test_same_inputs_same_path() {
        let a = multi().detections_dir(&video()).unwrap();
        let b = multi().detections_dir(&video()).unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    #[case("thumbnails", None)]
    #[case("reconstructions", Some("spectre"))]
    #[case("results", None)]
    fn test_invalid_arguments(#[case] kind: &str, #[case] method: Option<&str>) {
        assert!(matches!(
            multi().resolve(&video(), kind, method, None),
            Err(LayoutError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_shallow_video_path_is_rejected() {
        assert!(multi().frames_dir(Path::new("set/118.mp4")).is_err());
    }

    #[test]
    fn test_cache_files() {
        let layout = multi();
        let v = video();
        let dir = PathBuf::from("/out/VA_Set/detections/Train_Set/118");
        assert_eq!(layout.detections_file(&v).unwrap(), dir.join("bboxes.bin"));
        assert_eq!(layout.embeddings_file(&v).unwrap(), dir.join("embeddings.bin"));
        assert_eq!(
            layout.recognition_file(&v, 0.6).unwrap(),
            dir.join("recognition.bin")
        );
        assert_eq!(
            layout.recognition_file(&v, 0.45).unwrap(),
            dir.join("recognition_dist_0.450.bin")
        );
        assert_eq!(
            layout.frame_manifest_file(&v).unwrap(),
            PathBuf::from("/out/VA_Set/videos/Train_Set/118/frames.bin")
        );
        assert_eq!(
            layout.feature_matrix_file(&v).unwrap(),
            PathBuf::from("/out/VA_Set/emotions/Train_Set/118/features.bin")
        );
        assert_eq!(layout.catalog_file(), PathBuf::from("/out/metadata.bin"));
    }

    #[test]
    fn test_annotation_dir_and_category() {
        let layout = multi();
        assert_eq!(layout.category(&video()).unwrap(), "VA_Set");
        assert_eq!(
            layout.annotation_dir(&video()).unwrap(),
            Some(PathBuf::from("VA_Set/annotations/Train_Set"))
        );
        assert_eq!(single().annotation_dir(Path::new("clip.mp4")).unwrap(), None);
    }

    #[rstest]
    #[case("VA_Set/detections/Train_Set/118/000001_000.png", "VA_Set/detections/Train_Set/118/000001_000.png")]
    #[case("/out/VA_Set/detections/Train_Set/118/000001_000.png", "VA_Set/detections/Train_Set/118/000001_000.png")]
    #[case("/old/machine/out/VA_Set/detections/Train_Set/118/000001_000.png", "VA_Set/detections/Train_Set/118/000001_000.png")]
    #[case("/a/b.png", "a/b.png")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(multi().normalize(Path::new(input)), PathBuf::from(expected));
    }
}
