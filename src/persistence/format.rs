//! File format definitions for binary snapshots.

use crate::error::{DocStoreError, Result};
use serde::{Deserialize, Serialize};

/// Magic bytes identifying a forge-docstore snapshot: "FORGEDS\0"
pub const MAGIC: [u8; 8] = *b"FORGEDS\0";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Which structure a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum SnapshotKind {
    /// Canonical document records.
    Documents = 1,
    /// Metadata index buckets, side table and stats.
    MetadataIndex = 2,
}

impl SnapshotKind {
    /// Convert from u32.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Documents),
            2 => Some(Self::MetadataIndex),
            _ => None,
        }
    }
}

/// On-disk encoding of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotFormat {
    /// Header + CRC32 + bincode payload.
    #[default]
    Binary,
    /// Pretty-printed JSON, readable and diffable.
    Json,
}

impl SnapshotFormat {
    /// File extension used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Binary => crate::constants::snapshot::BINARY_EXTENSION,
            SnapshotFormat::Json => crate::constants::snapshot::JSON_EXTENSION,
        }
    }
}

/// File header structure.
///
/// Total size: 24 bytes
/// ```text
/// [MAGIC 8B][VERSION u32][KIND u32][FLAGS u32][CHECKSUM u32]
/// ```
#[derive(Debug, Clone)]
pub struct FileHeader {
    /// Magic bytes (must be MAGIC)
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Snapshot kind
    pub kind: SnapshotKind,
    /// Reserved flag bits
    pub flags: u32,
    /// CRC32 checksum of the payload (everything after header)
    pub checksum: u32,
}

impl FileHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 24;

    /// Create a new header.
    pub fn new(kind: SnapshotKind, checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            kind,
            flags: 0,
            checksum,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&(self.kind as u32).to_le_bytes());
        bytes[16..20].copy_from_slice(&self.flags.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DocStoreError::invalid_format("header too small"));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        if magic != MAGIC {
            return Err(DocStoreError::invalid_format("invalid magic bytes"));
        }

        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let kind_raw = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
        let flags = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let checksum = u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);

        let kind = SnapshotKind::from_u32(kind_raw)
            .ok_or_else(|| DocStoreError::invalid_format("unknown snapshot kind"))?;

        Ok(Self {
            magic,
            version,
            kind,
            flags,
            checksum,
        })
    }

    /// Verify the header is valid and matches the expected kind.
    pub fn verify(&self, expected: SnapshotKind) -> Result<()> {
        if self.magic != MAGIC {
            return Err(DocStoreError::invalid_format("invalid magic bytes"));
        }

        if self.version > FORMAT_VERSION {
            return Err(DocStoreError::invalid_format(format!(
                "unsupported version {} (max supported: {})",
                self.version, FORMAT_VERSION
            )));
        }

        if self.kind != expected {
            return Err(DocStoreError::invalid_format(format!(
                "snapshot kind mismatch: expected {:?}, got {:?}",
                expected, self.kind
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = FileHeader::new(SnapshotKind::Documents, 0x12345678);
        let bytes = header.to_bytes();
        let parsed = FileHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.magic, MAGIC);
        assert_eq!(parsed.version, FORMAT_VERSION);
        assert_eq!(parsed.kind, SnapshotKind::Documents);
        assert_eq!(parsed.checksum, 0x12345678);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = [0u8; FileHeader::SIZE];
        bytes[0..8].copy_from_slice(b"INVALID\0");

        let result = FileHeader::from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_kind_mismatch() {
        let header = FileHeader::new(SnapshotKind::Documents, 0);
        let result = header.verify(SnapshotKind::MetadataIndex);
        assert!(result.is_err());
    }

    #[test]
    fn test_future_version_rejected() {
        let mut header = FileHeader::new(SnapshotKind::MetadataIndex, 0);
        header.version = FORMAT_VERSION + 1;
        assert!(header.verify(SnapshotKind::MetadataIndex).is_err());
    }

    #[test]
    fn test_snapshot_kind_from_u32() {
        assert_eq!(SnapshotKind::from_u32(1), Some(SnapshotKind::Documents));
        assert_eq!(SnapshotKind::from_u32(2), Some(SnapshotKind::MetadataIndex));
        assert_eq!(SnapshotKind::from_u32(99), None);
    }
}
