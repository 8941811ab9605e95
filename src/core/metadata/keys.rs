//! core::metadata::keys
//!
//! Index ids and key layouts.
//!
//! # Volume database
//!
//! | Index | Key | Value |
//! |---|---|---|
//! | [`FILE_INDEX`] | `parent_id (u64 BE) ++ name` | [`FileRecord`](super::schema::FileRecord) |
//! | [`VOLUME_INDEX`] | [`LAST_FILE_ID_KEY`] | last assigned file id (u64 BE) |
//!
//! # Directory-service database
//!
//! | Index | Key | Value |
//! |---|---|---|
//! | [`ADDRESS_MAPPING_INDEX`] | node uuid bytes | [`AddressMapping`](super::schema::AddressMapping) |

use crate::core::types::{FileId, IndexId};

/// File and directory records.
pub const FILE_INDEX: IndexId = IndexId::new(0);

/// Volume-wide counters.
pub const VOLUME_INDEX: IndexId = IndexId::new(1);

/// Address mappings in the directory-service database.
pub const ADDRESS_MAPPING_INDEX: IndexId = IndexId::new(0);

/// Key of the last-assigned-file-id record in [`VOLUME_INDEX`].
pub const LAST_FILE_ID_KEY: &[u8] = b"last_file_id";

/// Key of a file record: the parent id followed by the entry name.
pub fn file_key(parent_id: FileId, name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + name.len());
    key.extend_from_slice(&parent_id.to_be_bytes());
    key.extend_from_slice(name.as_bytes());
    key
}

/// Encode a file id value.
pub fn encode_file_id(id: FileId) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// Decode a file id value; `None` if the value is not 8 bytes.
pub fn decode_file_id(bytes: &[u8]) -> Option<FileId> {
    let raw: [u8; 8] = bytes.try_into().ok()?;
    Some(FileId::new(u64::from_be_bytes(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_is_parent_then_name() {
        let key = file_key(FileId::new(7), "logs");
        assert_eq!(&key[..8], &7u64.to_be_bytes());
        assert_eq!(&key[8..], b"logs");
    }

    #[test]
    fn file_id_value_decodes() {
        let bytes = encode_file_id(FileId::new(42));
        assert_eq!(decode_file_id(&bytes), Some(FileId::new(42)));
        assert_eq!(decode_file_id(b"short"), None);
    }
}
