//! core::metadata::schema
//!
//! Record schemas for the values stored in the metadata indices.
//!
//! # Schema Design
//!
//! Every stored record is JSON and:
//! - Self-describing with `kind` and `schema_version`
//! - Strictly parsed (unknown fields rejected)
//! - Version-dispatched through a small envelope before full parsing
//!
//! # Example
//!
//! ```
//! use metatx::core::metadata::schema::{parse_file_record, FileRecord};
//! use metatx::core::types::FileId;
//!
//! let dir = FileRecord::directory(FileId::new(8), FileId::new(7), "logs", 1000, "alice", "staff", 0o755);
//! let bytes = dir.encode().unwrap();
//! let parsed = parse_file_record(&bytes).unwrap();
//! assert_eq!(parsed, dir);
//! assert!(parsed.is_directory());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{FileId, NodeId};

/// Kind identifier for file and directory records.
pub const FILE_RECORD_KIND: &str = "metatx.file";

/// Kind identifier for address mapping records.
pub const ADDRESS_MAPPING_KIND: &str = "metatx.address-mapping";

/// Current schema version for all record kinds.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from record encoding and decoding.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse record: {0}")]
    ParseError(String),

    #[error("invalid kind '{found}', expected '{expected}'")]
    InvalidKind {
        found: String,
        expected: &'static str,
    },

    #[error("unsupported schema version {0}, supported: {SCHEMA_VERSION}")]
    UnsupportedVersion(u32),

    #[error("failed to encode record: {0}")]
    EncodeError(String),
}

/// Envelope for version dispatch before full parsing.
#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    kind: String,
    schema_version: u32,
}

fn parse_versioned<T: DeserializeOwned>(
    bytes: &[u8],
    expected: &'static str,
) -> Result<T, MetadataError> {
    let envelope: RecordEnvelope =
        serde_json::from_slice(bytes).map_err(|e| MetadataError::ParseError(e.to_string()))?;

    if envelope.kind != expected {
        return Err(MetadataError::InvalidKind {
            found: envelope.kind,
            expected,
        });
    }
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(MetadataError::UnsupportedVersion(envelope.schema_version));
    }

    serde_json::from_slice(bytes).map_err(|e| MetadataError::ParseError(e.to_string()))
}

/// Whether a record describes a directory or a regular file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Directory,
    File,
}

/// POSIX timestamps in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PosixTimes {
    pub atime: u32,
    pub ctime: u32,
    pub mtime: u32,
}

impl PosixTimes {
    /// All three timestamps set to `time`.
    pub fn all(time: u32) -> Self {
        Self {
            atime: time,
            ctime: time,
            mtime: time,
        }
    }
}

/// A file or directory record in the file index.
///
/// Keyed by `(parent_id, name)`; see [`super::keys::file_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileRecord {
    pub kind: String,
    pub schema_version: u32,
    pub id: FileId,
    pub parent_id: FileId,
    pub name: String,
    pub file_type: FileType,
    pub times: PosixTimes,
    pub owner: String,
    pub owning_group: String,
    /// Permission bits, including setuid/setgid/sticky (`0o7777` mask).
    pub mode: u32,
    /// Windows attribute bits, carried for clients that set them.
    #[serde(default)]
    pub w32_attrs: u64,
    pub link_count: u32,
}

impl FileRecord {
    /// Create a directory record with all timestamps set to `time`.
    pub fn directory(
        id: FileId,
        parent_id: FileId,
        name: impl Into<String>,
        time: u32,
        owner: impl Into<String>,
        owning_group: impl Into<String>,
        mode: u32,
    ) -> Self {
        Self {
            kind: FILE_RECORD_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            id,
            parent_id,
            name: name.into(),
            file_type: FileType::Directory,
            times: PosixTimes::all(time),
            owner: owner.into(),
            owning_group: owning_group.into(),
            mode: mode & 0o7777,
            w32_attrs: 0,
            link_count: 1,
        }
    }

    /// True if this record is a directory.
    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    /// Serialize to the stored byte form.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        serde_json::to_vec(self).map_err(|e| MetadataError::EncodeError(e.to_string()))
    }
}

/// Parse a stored file record.
pub fn parse_file_record(bytes: &[u8]) -> Result<FileRecord, MetadataError> {
    parse_versioned(bytes, FILE_RECORD_KIND)
}

/// A service address registered in the directory service.
///
/// `version` starts at 1 on first registration and increments on every
/// update; clients must present the version they last read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressMapping {
    pub kind: String,
    pub schema_version: u32,
    pub uuid: NodeId,
    pub version: u64,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    pub match_network: String,
    pub ttl_s: u32,
}

/// Network pattern matching every client.
pub const MATCH_ANY_NETWORK: &str = "*";

/// Default lifetime of a mapping in client caches.
pub const DEFAULT_MAPPING_TTL_S: u32 = 3600;

impl AddressMapping {
    /// A mapping reachable from any network with the default TTL.
    pub fn new(
        uuid: NodeId,
        version: u64,
        protocol: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            kind: ADDRESS_MAPPING_KIND.to_string(),
            schema_version: SCHEMA_VERSION,
            uuid,
            version,
            protocol: protocol.into(),
            address: address.into(),
            port,
            match_network: MATCH_ANY_NETWORK.to_string(),
            ttl_s: DEFAULT_MAPPING_TTL_S,
        }
    }

    /// Serialize to the stored byte form.
    pub fn encode(&self) -> Result<Vec<u8>, MetadataError> {
        serde_json::to_vec(self).map_err(|e| MetadataError::EncodeError(e.to_string()))
    }
}

/// Parse a stored address mapping.
pub fn parse_address_mapping(bytes: &[u8]) -> Result<AddressMapping, MetadataError> {
    parse_versioned(bytes, ADDRESS_MAPPING_KIND)
}
