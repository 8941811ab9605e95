//! store::volume
//!
//! Per-volume handle: typed reads over the file index and file id
//! allocation.
//!
//! # File ids
//!
//! Ids are handed out from an in-process counter, not from the stored
//! last-id record. Two concurrent creations in one volume therefore never
//! receive the same id even though both read the record before either
//! commits. The record is still written with every creation so that a
//! restarted node can seed its counter; since batches may commit in a
//! different order than ids were allocated, the record can lag, and
//! [`VolumeStore::open`] seeds from the larger of the record and the
//! highest id present in the file index.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use metatx::core::types::FileId;
//! use metatx::engine::gate::WriteGate;
//! use metatx::store::volume::{RootAttributes, VolumeStore};
//! use metatx::store::MemoryEngine;
//!
//! let engine = MemoryEngine::start("vol", WriteGate::Unreplicated).unwrap();
//! let volume = VolumeStore::bootstrap("vol", engine, &RootAttributes::default(), 0).unwrap();
//!
//! assert_eq!(volume.root().unwrap().id, FileId::ROOT);
//! assert_eq!(volume.next_file_id(), FileId::new(2));
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::core::metadata::{
    decode_file_id, encode_file_id, file_key, parse_file_record, FileRecord, FILE_INDEX,
    LAST_FILE_ID_KEY, VOLUME_INDEX,
};
use crate::core::types::FileId;
use crate::engine::gate::WriteGate;

use super::batch::WriteBatch;
use super::memory::MemoryEngine;
use super::{StorageEngine, StorageError};

/// Ownership and mode of a new volume's root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAttributes {
    pub owner: String,
    pub group: String,
    pub mode: u32,
}

impl Default for RootAttributes {
    fn default() -> Self {
        Self {
            owner: "root".into(),
            group: "root".into(),
            mode: 0o755,
        }
    }
}

/// One volume's metadata database.
pub struct VolumeStore {
    name: String,
    engine: Arc<dyn StorageEngine>,
    last_id: AtomicU64,
}

impl VolumeStore {
    /// Create the root directory if the volume is empty, then open it.
    ///
    /// Bootstrap writes go through [`MemoryEngine::install`] because they
    /// are local initialization, not client writes.
    pub fn bootstrap(
        name: &str,
        engine: Arc<MemoryEngine>,
        root: &RootAttributes,
        time: u32,
    ) -> Result<Self, StorageError> {
        let root_key = file_key(FileId::NONE, name);
        if engine.lookup(FILE_INDEX, &root_key)?.is_none() {
            let record = FileRecord::directory(
                FileId::ROOT,
                FileId::NONE,
                name,
                time,
                root.owner.as_str(),
                root.group.as_str(),
                root.mode,
            );
            let value = record
                .encode()
                .map_err(|e| StorageError::corrupt(FILE_INDEX, &root_key, e))?;

            let mut batch = WriteBatch::new();
            batch.expect_absent(FILE_INDEX, root_key.clone());
            batch.put(FILE_INDEX, root_key, value);
            batch.put(
                VOLUME_INDEX,
                LAST_FILE_ID_KEY.to_vec(),
                encode_file_id(FileId::ROOT),
            );
            engine
                .install(&batch)
                .map_err(|e| StorageError::Unavailable(format!("bootstrap of '{}': {}", name, e)))?;
            tracing::info!(volume = name, "created volume root");
        }

        Self::open(name, engine)
    }

    /// Open an existing volume and seed the id counter.
    pub fn open(name: &str, engine: Arc<dyn StorageEngine>) -> Result<Self, StorageError> {
        let recorded = match engine.lookup(VOLUME_INDEX, LAST_FILE_ID_KEY)? {
            Some(bytes) => decode_file_id(&bytes).ok_or_else(|| {
                StorageError::corrupt(VOLUME_INDEX, LAST_FILE_ID_KEY, "expected 8-byte file id")
            })?,
            None => FileId::NONE,
        };

        let mut highest = FileId::NONE;
        for (key, value) in engine.scan_prefix(FILE_INDEX, &[])? {
            let record =
                parse_file_record(&value).map_err(|e| StorageError::corrupt(FILE_INDEX, &key, e))?;
            highest = highest.max(record.id);
        }

        let seed = recorded.max(highest);
        tracing::debug!(
            volume = name,
            recorded = recorded.get(),
            highest = highest.get(),
            "opened volume"
        );

        Ok(Self {
            name: name.to_string(),
            engine,
            last_id: AtomicU64::new(seed.get()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The engine holding this volume's database.
    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.engine
    }

    /// The admission policy for writes to this volume.
    pub fn write_gate(&self) -> &WriteGate {
        self.engine.write_gate()
    }

    /// Reserve the next file id. Ids are never reused, even if the
    /// creation that reserved one fails.
    pub fn next_file_id(&self) -> FileId {
        FileId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The volume's root directory record.
    pub fn root(&self) -> Result<FileRecord, StorageError> {
        self.lookup_file(FileId::NONE, &self.name)?.ok_or_else(|| {
            StorageError::corrupt(
                FILE_INDEX,
                &file_key(FileId::NONE, &self.name),
                "volume root is missing",
            )
        })
    }

    /// Look up the entry `name` in directory `parent_id`.
    pub fn lookup_file(
        &self,
        parent_id: FileId,
        name: &str,
    ) -> Result<Option<FileRecord>, StorageError> {
        let key = file_key(parent_id, name);
        match self.engine.lookup(FILE_INDEX, &key)? {
            Some(bytes) => parse_file_record(&bytes)
                .map(Some)
                .map_err(|e| StorageError::corrupt(FILE_INDEX, &key, e)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for VolumeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeStore")
            .field("name", &self.name)
            .field("engine", &self.engine.name())
            .field("last_id", &self.last_id.load(Ordering::SeqCst))
            .finish()
    }
}

/// All volumes served by this node, fixed at startup.
#[derive(Debug, Default, Clone)]
pub struct VolumeRegistry {
    volumes: BTreeMap<String, Arc<VolumeStore>>,
}

impl VolumeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume. Returns `false` if one with the same name exists.
    pub fn insert(&mut self, volume: VolumeStore) -> bool {
        if self.volumes.contains_key(volume.name()) {
            return false;
        }
        self.volumes
            .insert(volume.name().to_string(), Arc::new(volume));
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<VolumeStore>> {
        self.volumes.get(name)
    }

    /// Volume names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.volumes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}
