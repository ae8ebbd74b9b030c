use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cache::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::cache::record::{read_record, write_record, RecordKind};
use crate::catalog::domain::video_catalog::{CatalogEntry, CatalogError, VideoCatalog};
use crate::catalog::domain::video_prober::VideoProber;
use crate::layout::sequence_layout::{CatalogMode, SequenceLayout};
use crate::shared::constants::CATALOG_VERSION;
use crate::shared::sequence_meta::SequenceMeta;

/// Discovers, probes and persists the videos of a catalog root.
///
/// In multi-video mode `root` is a directory searched recursively. In
/// single-video mode `root` is the video itself and the catalog root is
/// its parent directory.
pub struct SequenceStore<'a> {
    root: PathBuf,
    layout: &'a SequenceLayout,
    video_extension: String,
    annotation_extension: String,
}

impl<'a> SequenceStore<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        layout: &'a SequenceLayout,
        video_extension: &str,
        annotation_extension: &str,
    ) -> Self {
        Self {
            root: root.into(),
            layout,
            video_extension: video_extension.to_string(),
            annotation_extension: annotation_extension.to_string(),
        }
    }

    /// Directory the catalog's relative paths are resolved against.
    pub fn catalog_root(&self) -> PathBuf {
        match self.layout.mode() {
            CatalogMode::MultiVideo => self.root.clone(),
            CatalogMode::SingleVideo => self
                .root
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        }
    }

    /// Loads the persisted catalog, or gathers and probes the videos and
    /// persists the result when no catalog record exists yet.
    pub fn prepare(&self, prober: &dyn VideoProber) -> Result<VideoCatalog, CatalogError> {
        let path = self.layout.catalog_file();
        let expected = self.fingerprint();

        if path.is_file() {
            let (found, catalog): (Fingerprint, VideoCatalog) =
                read_record(&path, RecordKind::Catalog)?;
            if catalog.version != CATALOG_VERSION {
                return Err(CatalogError::Version {
                    found: catalog.version,
                    expected: CATALOG_VERSION,
                });
            }
            if found != expected {
                log::warn!(
                    "{} was gathered with different settings; delete it to regather",
                    path.display()
                );
            }
            log::info!(
                "Loaded catalog of {} sequences from {}",
                catalog.len(),
                path.display()
            );
            return Ok(catalog);
        }

        let (videos, annotations) = self.gather()?;
        let mut entries = Vec::with_capacity(videos.len());
        let catalog_root = self.catalog_root();
        for relative_path in videos {
            let meta = probe_meta(prober, &catalog_root.join(&relative_path))?;
            log::debug!(
                "{}: {}x{} at {} fps, {} frames",
                relative_path.display(),
                meta.width,
                meta.height,
                meta.fps,
                meta.frame_count
            );
            entries.push(CatalogEntry {
                relative_path,
                meta,
            });
        }

        let catalog = VideoCatalog::new(entries, annotations);
        write_record(&path, RecordKind::Catalog, expected, &catalog)?;
        log::info!(
            "Gathered {} sequences and {} annotation files into {}",
            catalog.len(),
            catalog.annotations.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Sorted catalog-relative paths of videos and annotation files.
    fn gather(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>), CatalogError> {
        if self.layout.mode() == CatalogMode::SingleVideo {
            if !self.root.is_file() {
                return Err(CatalogError::NotAFile(self.root.clone()));
            }
            let name = self
                .root
                .file_name()
                .map(PathBuf::from)
                .ok_or_else(|| CatalogError::NotAFile(self.root.clone()))?;
            return Ok((vec![name], Vec::new()));
        }

        if !self.root.is_dir() {
            return Err(CatalogError::NotADirectory(self.root.clone()));
        }

        let mut videos = Vec::new();
        let mut annotations = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|source| CatalogError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let extension = relative.extension().and_then(|e| e.to_str());
            if extension == Some(self.video_extension.as_str()) {
                videos.push(relative.to_path_buf());
            } else if extension == Some(self.annotation_extension.as_str()) {
                annotations.push(relative.to_path_buf());
            }
        }
        videos.sort();
        annotations.sort();
        Ok((videos, annotations))
    }

    fn fingerprint(&self) -> Fingerprint {
        let mode = match self.layout.mode() {
            CatalogMode::MultiVideo => "multi",
            CatalogMode::SingleVideo => "single",
        };
        FingerprintBuilder::new("catalog")
            .str(mode)
            .path(&self.root)
            .str(&self.video_extension)
            .str(&self.annotation_extension)
            .finish()
    }
}

fn probe_meta(prober: &dyn VideoProber, path: &Path) -> Result<SequenceMeta, CatalogError> {
    let streams = prober.probe(path).map_err(|source| CatalogError::Probe {
        path: path.to_path_buf(),
        source,
    })?;
    let Some(first) = streams.first() else {
        return Err(CatalogError::Format(path.to_path_buf()));
    };
    if streams.len() > 1 {
        log::warn!(
            "{} has {} video streams; using stream {}",
            path.display(),
            streams.len(),
            first.index
        );
    }
    Ok(SequenceMeta {
        fps: first.avg_frame_rate,
        width: first.width,
        height: first.height,
        frame_count: first.frame_count,
    })
}
