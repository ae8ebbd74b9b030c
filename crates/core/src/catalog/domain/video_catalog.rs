use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::domain::annotation_stream::{stream_suffix, StreamSuffix};
use crate::cache::record::CacheError;
use crate::shared::constants::CATALOG_VERSION;
use crate::shared::sequence_meta::SequenceMeta;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("{0} is not a video file")]
    NotAFile(PathBuf),
    #[error("failed to list {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("failed to probe {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error>,
    },
    #[error("{0} has no video stream")]
    Format(PathBuf),
    #[error("catalog version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("sequence index {index} is out of range for {len} sequences")]
    UnknownSequence { index: usize, len: usize },
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// One video of the catalog; `relative_path` is relative to the catalog root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub relative_path: PathBuf,
    pub meta: SequenceMeta,
}

/// Ordered list of sequences plus the annotation files found next to them.
/// The position of an entry is its sequence index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoCatalog {
    pub version: u32,
    pub entries: Vec<CatalogEntry>,
    /// Annotation files relative to the catalog root, sorted.
    pub annotations: Vec<PathBuf>,
}

impl VideoCatalog {
    pub fn new(entries: Vec<CatalogEntry>, annotations: Vec<PathBuf>) -> Self {
        Self {
            version: CATALOG_VERSION,
            entries,
            annotations,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Result<&CatalogEntry, CatalogError> {
        self.entries.get(index).ok_or(CatalogError::UnknownSequence {
            index,
            len: self.entries.len(),
        })
    }

    /// Annotation files in `annotation_dir` whose stem starts with the
    /// video's stem, sorted, each with its positional suffix.
    pub fn annotation_files_for(
        &self,
        video: &Path,
        annotation_dir: &Path,
    ) -> Vec<(PathBuf, StreamSuffix)> {
        let Some(video_stem) = video.file_stem().and_then(|s| s.to_str()) else {
            return Vec::new();
        };
        self.annotations
            .iter()
            .filter(|path| path.parent() == Some(annotation_dir))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                stream_suffix(video_stem, stem).map(|suffix| (path.clone(), suffix))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::sequence_meta::Rational;

    fn entry(path: &str) -> CatalogEntry {
        CatalogEntry {
            relative_path: PathBuf::from(path),
            meta: SequenceMeta {
                fps: Rational::new(30, 1),
                width: 640,
                height: 360,
                frame_count: 100,
            },
        }
    }

    #[test]
    fn test_entry_lookup() {
        let catalog = VideoCatalog::new(vec![entry("A/videos/S/1.mp4")], vec![]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.version, CATALOG_VERSION);
        assert!(catalog.entry(0).is_ok());
        assert!(matches!(
            catalog.entry(3),
            Err(CatalogError::UnknownSequence { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_annotation_files_for_sequence() {
        let catalog = VideoCatalog::new(
            vec![entry("VA_Set/videos/Train_Set/118.mp4")],
            vec![
                PathBuf::from("VA_Set/annotations/Train_Set/118.txt"),
                PathBuf::from("VA_Set/annotations/Train_Set/118_right.txt"),
                PathBuf::from("VA_Set/annotations/Train_Set/119.txt"),
                PathBuf::from("VA_Set/annotations/Validation_Set/118.txt"),
            ],
        );
        let files = catalog.annotation_files_for(
            Path::new("VA_Set/videos/Train_Set/118.mp4"),
            Path::new("VA_Set/annotations/Train_Set"),
        );
        assert_eq!(
            files,
            vec![
                (
                    PathBuf::from("VA_Set/annotations/Train_Set/118.txt"),
                    StreamSuffix::Unsuffixed
                ),
                (
                    PathBuf::from("VA_Set/annotations/Train_Set/118_right.txt"),
                    StreamSuffix::Right
                ),
            ]
        );
    }
}
