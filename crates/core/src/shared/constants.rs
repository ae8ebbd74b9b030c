/// Version stamped into the persisted catalog record.
pub const CATALOG_VERSION: u32 = 2;

pub const VIDEO_EXTENSION: &str = "mp4";
pub const ANNOTATION_EXTENSION: &str = "txt";

/// Width of the zero-padded 1-based frame ordinal in file names (`%06d`).
pub const FRAME_NUMBER_WIDTH: usize = 6;

/// Width of the within-frame detection index in crop file names (`%03d`).
pub const DETECTION_NUMBER_WIDTH: usize = 3;

pub const FRAME_IMAGE_EXTENSION: &str = "png";

pub const DEFAULT_FACE_DETECTOR_THRESHOLD: f64 = 0.9;
pub const DEFAULT_IMAGE_SIZE: u32 = 224;
pub const DEFAULT_CROP_SCALE: f64 = 1.25;
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// DBSCAN neighborhood radius used when no threshold is configured.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MIN_SAMPLES: usize = 5;

/// Minimum cluster population for a label to count as a valid identity.
pub const DEFAULT_MIN_OCCURRENCES: usize = 20;

/// Number of trailing components kept when a legacy absolute path cannot
/// be made relative to the output root (`category/kind/set/stem/file`).
pub const LEGACY_RELATIVE_DEPTH: usize = 5;

pub const DETECTOR_MODEL_NAME: &str = "face_detector.onnx";
pub const EMBEDDING_MODEL_NAME: &str = "face_embedding.onnx";
pub const EMOTION_MODEL_NAME: &str = "emotion_features.onnx";
