use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::fingerprint::Fingerprint;

const MAGIC: [u8; 4] = *b"FSYC";

/// Envelope layout version; bump when any record payload changes shape.
pub const RECORD_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: bincode::error::EncodeError,
    },
    #[error("{path} is truncated or corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::error::DecodeError,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a cache record")]
    BadMagic { path: PathBuf },
    #[error("{path} holds a {found} record, expected {expected}")]
    KindMismatch {
        path: PathBuf,
        expected: RecordKind,
        found: RecordKind,
    },
    #[error("{path} has version {found}, expected {expected}")]
    VersionMismatch {
        path: PathBuf,
        expected: u32,
        found: u32,
    },
    #[error("{path} is inconsistent: {reason}")]
    Inconsistent { path: PathBuf, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Catalog,
    FrameManifest,
    Detections,
    Embeddings,
    Recognitions,
    ValidatedAnnotations,
    EmotionManifest,
    FeatureMatrix,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Catalog => "catalog",
            RecordKind::FrameManifest => "frame manifest",
            RecordKind::Detections => "detections",
            RecordKind::Embeddings => "embeddings",
            RecordKind::Recognitions => "recognitions",
            RecordKind::ValidatedAnnotations => "validated annotations",
            RecordKind::EmotionManifest => "emotion manifest",
            RecordKind::FeatureMatrix => "feature matrix",
        };
        f.write_str(name)
    }
}

/// Result of checking a cache file against the fingerprint a stage expects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Missing,
    Stale,
    Current,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T: Serialize> {
    magic: [u8; 4],
    kind: RecordKind,
    version: u32,
    fingerprint: Fingerprint,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    magic: [u8; 4],
    kind: RecordKind,
    version: u32,
    fingerprint: Fingerprint,
    payload: T,
}

/// Leading fields of [`Envelope`]; decodes without touching the payload.
#[derive(Deserialize)]
struct EnvelopeHeader {
    magic: [u8; 4],
    kind: RecordKind,
    version: u32,
    fingerprint: Fingerprint,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn check_header(
    path: &Path,
    expected: RecordKind,
    magic: [u8; 4],
    kind: RecordKind,
    version: u32,
) -> Result<(), CacheError> {
    if magic != MAGIC {
        return Err(CacheError::BadMagic {
            path: path.to_path_buf(),
        });
    }
    if kind != expected {
        return Err(CacheError::KindMismatch {
            path: path.to_path_buf(),
            expected,
            found: kind,
        });
    }
    if version != RECORD_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            expected: RECORD_VERSION,
            found: version,
        });
    }
    Ok(())
}

/// Writes `bytes` next to `path` and renames into place, so readers never
/// observe a partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let mut part = path.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);
    fs::write(&part, bytes).map_err(io_error(&part))?;
    fs::rename(&part, path).map_err(io_error(path))
}

pub fn write_record<T: Serialize>(
    path: &Path,
    kind: RecordKind,
    fingerprint: Fingerprint,
    payload: &T,
) -> Result<(), CacheError> {
    let envelope = EnvelopeRef {
        magic: MAGIC,
        kind,
        version: RECORD_VERSION,
        fingerprint,
        payload,
    };
    let bytes = bincode::serde::encode_to_vec(&envelope, bincode::config::standard()).map_err(
        |source| CacheError::Encode {
            path: path.to_path_buf(),
            source,
        },
    )?;
    write_atomic(path, &bytes)?;
    log::debug!("Wrote {kind} record {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Reads and validates a whole record, returning its fingerprint and payload.
pub fn read_record<T: DeserializeOwned>(
    path: &Path,
    kind: RecordKind,
) -> Result<(Fingerprint, T), CacheError> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    let (envelope, _): (Envelope<T>, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).map_err(
            |source| CacheError::Decode {
                path: path.to_path_buf(),
                source,
            },
        )?;
    check_header(path, kind, envelope.magic, envelope.kind, envelope.version)?;
    Ok((envelope.fingerprint, envelope.payload))
}

/// Reads only the envelope header of a record.
pub fn read_fingerprint(path: &Path, kind: RecordKind) -> Result<Fingerprint, CacheError> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut reader = BufReader::new(file);
    let header: EnvelopeHeader =
        bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard()).map_err(
            |source| CacheError::Decode {
                path: path.to_path_buf(),
                source,
            },
        )?;
    check_header(path, kind, header.magic, header.kind, header.version)?;
    Ok(header.fingerprint)
}

/// A cache is current iff it exists, its header decodes, and it was built
/// from exactly the inputs summarised by `expected`.
pub fn cache_status(path: &Path, kind: RecordKind, expected: &Fingerprint) -> CacheStatus {
    if !path.is_file() {
        return CacheStatus::Missing;
    }
    match read_fingerprint(path, kind) {
        Ok(found) if found == *expected => CacheStatus::Current,
        Ok(found) => {
            log::debug!(
                "{} is stale (fingerprint {found}, expected {expected})",
                path.display()
            );
            CacheStatus::Stale
        }
        Err(e) => {
            log::warn!("Discarding unreadable cache: {e}");
            CacheStatus::Stale
        }
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CacheError> {
    let bytes = fs::read(path).map_err(io_error(path))?;
    serde_json::from_slice(&bytes).map_err(|source| CacheError::Json {
        path: path.to_path_buf(),
        source,
    })
}
