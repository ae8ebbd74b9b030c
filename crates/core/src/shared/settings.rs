use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::sequence_layout::CatalogMode;
use crate::shared::constants::{
    ANNOTATION_EXTENSION, DEFAULT_BATCH_SIZE, DEFAULT_CROP_SCALE, DEFAULT_DISTANCE_THRESHOLD,
    DEFAULT_FACE_DETECTOR_THRESHOLD, DEFAULT_IMAGE_SIZE, DEFAULT_MIN_OCCURRENCES,
    DEFAULT_MIN_SAMPLES, VIDEO_EXTENSION,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where a model file comes from. A local `path` wins over the download `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSource {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub detector: ModelSource,
    pub embedder: ModelSource,
    pub emotion: ModelSource,
}

/// Run configuration. Every field has a default so partial JSON files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog_mode: CatalogMode,
    pub video_extension: String,
    pub annotation_extension: String,
    pub face_detector_threshold: f64,
    pub image_size: u32,
    pub scale: f64,
    pub batch_size: usize,
    pub distance_threshold: f64,
    pub min_samples: usize,
    pub min_occurrences: usize,
    pub models: ModelSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_mode: CatalogMode::MultiVideo,
            video_extension: VIDEO_EXTENSION.to_string(),
            annotation_extension: ANNOTATION_EXTENSION.to_string(),
            face_detector_threshold: DEFAULT_FACE_DETECTOR_THRESHOLD,
            image_size: DEFAULT_IMAGE_SIZE,
            scale: DEFAULT_CROP_SCALE,
            batch_size: DEFAULT_BATCH_SIZE,
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            min_occurrences: DEFAULT_MIN_OCCURRENCES,
            models: ModelSettings::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceSync").join("settings.json"))
    }

    /// Loads an explicit settings file. Errors are reported, not defaulted.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings =
            serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the per-user settings file, falling back to defaults when it
    /// is missing or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str::<Settings>(&json).ok())
            .filter(|s| s.validate().is_ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Read {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |name, reason: &str| {
            Err(SettingsError::Invalid {
                name,
                reason: reason.to_string(),
            })
        };
        if !(0.0..=1.0).contains(&self.face_detector_threshold) {
            return invalid("face_detector_threshold", "must be within 0.0..=1.0");
        }
        if self.image_size == 0 {
            return invalid("image_size", "must be positive");
        }
        if !(self.scale > 0.0) {
            return invalid("scale", "must be positive");
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be positive");
        }
        if !(self.distance_threshold > 0.0) {
            return invalid("distance_threshold", "must be positive");
        }
        if self.min_samples == 0 {
            return invalid("min_samples", "must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let s = Settings::default();
        assert_eq!(s.catalog_mode, CatalogMode::MultiVideo);
        assert_eq!(s.video_extension, "mp4");
        assert_eq!(s.annotation_extension, "txt");
        assert_eq!(s.face_detector_threshold, 0.9);
        assert_eq!(s.image_size, 224);
        assert_eq!(s.scale, 1.25);
        assert_eq!(s.distance_threshold, 0.6);
        assert_eq!(s.min_samples, 5);
        assert_eq!(s.min_occurrences, 20);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"distance_threshold": 0.45, "catalog_mode": "single_video"}"#,
        )
        .unwrap();

        let s = Settings::load_from(&path).unwrap();
        assert_eq!(s.distance_threshold, 0.45);
        assert_eq!(s.catalog_mode, CatalogMode::SingleVideo);
        assert_eq!(s.min_occurrences, 20);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut s = Settings::default();
        s.models.detector.path = Some(PathBuf::from("/models/det.onnx"));
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), s);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load_from(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let s = Settings {
            batch_size: 0,
            ..Settings::default()
        };
        assert!(matches!(
            s.validate(),
            Err(SettingsError::Invalid { name: "batch_size", .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Settings::load_from(&dir.path().join("absent.json")),
            Err(SettingsError::Read { .. })
        ));
    }
}
