use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::cache::fingerprint::Fingerprint;
use crate::cache::record::{cache_status, read_record, CacheStatus, RecordKind};
use crate::catalog::domain::video_catalog::CatalogEntry;
use crate::layout::sequence_layout::SequenceLayout;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::stage::Stage;
use crate::shared::frame::Frame;
use crate::shared::settings::Settings;
use crate::video::domain::image_store::ImageStore;

/// Everything a stage needs to find its inputs and outputs.
#[derive(Clone, Copy)]
pub struct PipelineContext<'a> {
    pub layout: &'a SequenceLayout,
    pub settings: &'a Settings,
    /// Directory the catalog's relative video paths are resolved against.
    pub catalog_root: &'a Path,
}

impl PipelineContext<'_> {
    pub fn video_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.catalog_root.join(&entry.relative_path)
    }

    /// Resolves a path stored in a record (relative to the output root).
    pub fn absolute(&self, stored: &Path) -> PathBuf {
        self.layout.output_root().join(stored)
    }
}

/// Reads the record a stage builds on. A missing file means the earlier
/// stage never ran for this sequence.
pub(crate) fn load_prerequisite<T: DeserializeOwned>(
    path: &Path,
    kind: RecordKind,
    stage: Stage,
    prerequisite: Stage,
    video: &Path,
) -> Result<(Fingerprint, T), PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingPrerequisite {
            stage,
            prerequisite,
            video: video.to_path_buf(),
        });
    }
    Ok(read_record(path, kind)?)
}

/// Returns the cached record at `path` if it can be reused.
///
/// With an `expected` fingerprint the record must be current. Without one
/// (the collaborator that would define it is not configured) any readable
/// record is accepted as is.
pub(crate) fn reuse_cached<T: DeserializeOwned>(
    path: &Path,
    kind: RecordKind,
    expected: Option<&Fingerprint>,
) -> Option<(Fingerprint, T)> {
    match expected {
        Some(expected) => match cache_status(path, kind, expected) {
            CacheStatus::Current => {}
            CacheStatus::Missing => return None,
            CacheStatus::Stale => {
                log::info!("{} is stale, recomputing", path.display());
                return None;
            }
        },
        None if !path.is_file() => return None,
        None => log::warn!(
            "Reusing {} without validation: no collaborator to fingerprint it",
            path.display()
        ),
    }
    match read_record(path, kind) {
        Ok(record) => Some(record),
        Err(e) => {
            log::warn!("Discarding unreadable cache: {e}");
            None
        }
    }
}

/// Loads `(position, path, ordinal)` images, skipping unreadable ones.
///
/// Returns the positions that loaded alongside their frames, so callers
/// can keep co-indexed arrays in step.
pub(crate) fn load_images(
    images: &dyn ImageStore,
    items: &[(usize, PathBuf, usize)],
) -> (Vec<usize>, Vec<Frame>) {
    let mut positions = Vec::with_capacity(items.len());
    let mut frames = Vec::with_capacity(items.len());
    for (position, path, ordinal) in items {
        match images.load(path, *ordinal) {
            Ok(frame) => {
                positions.push(*position);
                frames.push(frame);
            }
            Err(e) => log::warn!("Skipping unreadable image {}: {e}", path.display()),
        }
    }
    (positions, frames)
}

/// Milliseconds since `start`, for [`PipelineLogger::timing`](crate::pipeline::pipeline_logger::PipelineLogger::timing).
pub(crate) fn elapsed_ms(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
