//! Snapshot persistence for the document store and the metadata index.
//!
//! A snapshot is a single file holding a point-in-time serialization of one
//! structure. Writes go to a temporary sibling first and are renamed over
//! the previous snapshot, so a crash mid-write leaves the old file intact.
//!
//! # File Format
//!
//! Binary snapshots:
//!
//! ```text
//! [MAGIC 8B "FORGEDS\0"][VERSION u32][KIND u32][FLAGS u32][CHECKSUM u32]
//! [PAYLOAD bincode]
//! ```
//!
//! JSON snapshots carry the version and kind inline:
//!
//! ```text
//! { "version": 1, "kind": "Documents", "payload": ... }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use forge_docstore::persistence::{read_snapshot, write_snapshot, SnapshotFormat, SnapshotKind};
//!
//! write_snapshot(&path, SnapshotKind::Documents, SnapshotFormat::Binary, &records)?;
//! let loaded: Option<Vec<Document>> =
//!     read_snapshot(&path, SnapshotKind::Documents, SnapshotFormat::Binary)?;
//! ```

mod format;

pub use format::{FileHeader, SnapshotFormat, SnapshotKind, FORMAT_VERSION, MAGIC};

use crate::constants::snapshot::TEMP_SUFFIX;
use crate::error::{DocStoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct JsonEnvelopeRef<'a, T> {
    version: u32,
    kind: SnapshotKind,
    payload: &'a T,
}

#[derive(Deserialize)]
struct JsonEnvelope<T> {
    version: u32,
    kind: SnapshotKind,
    payload: T,
}

/// Where a structure lives on disk: `<dir>/<stem>.<ext>`.
pub fn snapshot_path(dir: &Path, stem: &str, format: SnapshotFormat) -> PathBuf {
    dir.join(format!("{}.{}", stem, format.extension()))
}

/// Serialize `value` and atomically replace the snapshot at `path`.
///
/// Parent directories are created as needed.
///
/// # Errors
/// Returns an error if serialization fails or the file cannot be written.
pub fn write_snapshot<T: Serialize>(
    path: &Path,
    kind: SnapshotKind,
    format: SnapshotFormat,
    value: &T,
) -> Result<()> {
    let bytes = encode(kind, format, value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path);
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    sync_parent(path)?;

    tracing::debug!(
        target: "forge_docstore::persistence",
        path = %path.display(),
        kind = ?kind,
        bytes = bytes.len(),
        "Snapshot written"
    );

    Ok(())
}

/// Read and decode the snapshot at `path`.
///
/// Returns `Ok(None)` when no snapshot exists. Header, checksum and decode
/// failures are reported as errors for which
/// [`DocStoreError::is_corruption`] is true.
pub fn read_snapshot<T: DeserializeOwned>(
    path: &Path,
    kind: SnapshotKind,
    format: SnapshotFormat,
) -> Result<Option<T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    decode(&raw, kind, format).map(Some)
}

fn encode<T: Serialize>(kind: SnapshotKind, format: SnapshotFormat, value: &T) -> Result<Vec<u8>> {
    match format {
        SnapshotFormat::Binary => {
            let payload = bincode::serialize(value)?;
            let header = FileHeader::new(kind, crc32fast::hash(&payload));
            let mut bytes = Vec::with_capacity(FileHeader::SIZE + payload.len());
            bytes.extend_from_slice(&header.to_bytes());
            bytes.extend_from_slice(&payload);
            Ok(bytes)
        }
        SnapshotFormat::Json => Ok(serde_json::to_vec_pretty(&JsonEnvelopeRef {
            version: FORMAT_VERSION,
            kind,
            payload: value,
        })?),
    }
}

fn decode<T: DeserializeOwned>(raw: &[u8], kind: SnapshotKind, format: SnapshotFormat) -> Result<T> {
    match format {
        SnapshotFormat::Binary => {
            let payload = verify_header(raw, kind)?;
            Ok(bincode::deserialize(payload)?)
        }
        SnapshotFormat::Json => {
            let envelope: JsonEnvelope<T> = serde_json::from_slice(raw).map_err(|e| {
                // An unreadable JSON body is corruption, not an I/O failure
                DocStoreError::serialization(e.to_string())
            })?;

            if envelope.version > FORMAT_VERSION {
                return Err(DocStoreError::invalid_format(format!(
                    "unsupported version {} (max supported: {})",
                    envelope.version, FORMAT_VERSION
                )));
            }
            if envelope.kind != kind {
                return Err(DocStoreError::invalid_format(format!(
                    "snapshot kind mismatch: expected {:?}, got {:?}",
                    kind, envelope.kind
                )));
            }

            Ok(envelope.payload)
        }
    }
}

/// Verify file header and return the payload section.
pub(crate) fn verify_header(data: &[u8], expected: SnapshotKind) -> Result<&[u8]> {
    if data.len() < FileHeader::SIZE {
        return Err(DocStoreError::invalid_format("file too small for header"));
    }

    let header = FileHeader::from_bytes(&data[..FileHeader::SIZE])?;
    header.verify(expected)?;

    let payload = &data[FileHeader::SIZE..];
    if crc32fast::hash(payload) != header.checksum {
        return Err(DocStoreError::ChecksumMismatch);
    }

    Ok(payload)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    // Persist the rename itself
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}
