//! core::metadata
//!
//! Stored record schemas and key layouts.
//!
//! # Modules
//!
//! - [`schema`] - Record types (v1) and strict parsing
//! - [`keys`] - Index ids and key encodings
//!
//! # Schema Design
//!
//! - Self-describing: includes `kind` and `schema_version`
//! - Strict parsing: unknown fields are rejected
//! - Keys are byte strings; numeric components are big-endian so that
//!   prefix scans list a directory's children in one range

pub mod keys;
pub mod schema;

pub use keys::{
    decode_file_id, encode_file_id, file_key, ADDRESS_MAPPING_INDEX,
    FILE_INDEX, LAST_FILE_ID_KEY, VOLUME_INDEX,
};
pub use schema::{
    parse_address_mapping, parse_file_record, AddressMapping, FileRecord, FileType,
    MetadataError, PosixTimes, ADDRESS_MAPPING_KIND, DEFAULT_MAPPING_TTL_S, FILE_RECORD_KIND,
    MATCH_ANY_NETWORK, SCHEMA_VERSION,
};
