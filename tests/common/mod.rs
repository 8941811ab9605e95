//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use metatx::access::{PathResolver, PolicyKind};
use metatx::core::clock::FixedClock;
use metatx::core::metadata::{
    encode_file_id, file_key, parse_file_record, FileRecord, FILE_INDEX, LAST_FILE_ID_KEY,
    VOLUME_INDEX,
};
use metatx::core::types::{FileId, IndexId, NodeId, ProcedureId, UserDetails};
use metatx::engine::{
    Callback, Dispatcher, DispatcherBuilder, LeadershipToken, Reply, RequestMetadata, WriteGate,
};
use metatx::ops::{register_all, Services};
use metatx::store::volume::RootAttributes;
use metatx::store::{MemoryEngine, StorageEngine, VolumeRegistry, VolumeStore, WriteBatch};

pub const VOLUME: &str = "vol";

/// Id of the `data` directory installed by [`Node::start`].
pub const DATA_DIR: FileId = FileId::new(7);

/// A master node serving volume `vol`:
///
/// ```text
/// /            id 1, root:root 0755
/// /data        id 7, alice:staff 0755
/// ```
pub struct Node {
    pub dispatcher: Dispatcher,
    pub engine: Arc<MemoryEngine>,
    pub directory: Arc<MemoryEngine>,
    pub token: LeadershipToken,
    pub clock: Arc<FixedClock>,
}

impl Node {
    pub fn start() -> Self {
        Self::start_with(PolicyKind::Posix)
    }

    pub fn start_with(policy: PolicyKind) -> Self {
        let local = NodeId::new("mrc-1").unwrap();
        let token = LeadershipToken::new(local.clone(), Some(local));
        let gate = WriteGate::Replicated(token.clone());

        let engine = MemoryEngine::start(VOLUME, gate.clone()).unwrap();
        VolumeStore::bootstrap(VOLUME, engine.clone(), &RootAttributes::default(), 0).unwrap();

        let data = FileRecord::directory(DATA_DIR, FileId::ROOT, "data", 0, "alice", "staff", 0o755);
        let mut batch = WriteBatch::new();
        batch.put(FILE_INDEX, file_key(FileId::ROOT, "data"), data.encode().unwrap());
        batch.put(VOLUME_INDEX, LAST_FILE_ID_KEY.to_vec(), encode_file_id(DATA_DIR));
        engine.install(&batch).unwrap();

        let volume = VolumeStore::open(VOLUME, engine.clone()).unwrap();
        let mut registry = VolumeRegistry::new();
        registry.insert(volume);

        let directory = MemoryEngine::start("directory", gate.clone()).unwrap();
        let clock = Arc::new(FixedClock::new(1000));
        let services = Services {
            metadata_gate: gate,
            resolver: PathResolver::new(Arc::new(registry)),
            access: policy.build(),
            clock: clock.clone(),
            directory: directory.clone(),
        };
        let mut builder = DispatcherBuilder::new();
        register_all(&mut builder, &services).unwrap();

        Self {
            dispatcher: builder.build(),
            engine,
            directory,
            token,
            clock,
        }
    }

    /// Dispatch and wait for the reply.
    pub async fn call(
        &self,
        procedure: ProcedureId,
        user: UserDetails,
        payload: serde_json::Value,
    ) -> Reply {
        let (callback, rx) = Callback::channel();
        self.dispatcher
            .dispatch(procedure, payload, user, RequestMetadata::new(), callback);
        rx.await.expect("every request gets a reply")
    }

    pub fn advertise(&self, master: &str) {
        self.token
            .advertise_master(Some(NodeId::new(master).unwrap()));
    }

    pub fn record(&self, parent: FileId, name: &str) -> Option<FileRecord> {
        self.engine
            .lookup(FILE_INDEX, &file_key(parent, name))
            .unwrap()
            .map(|bytes| parse_file_record(&bytes).unwrap())
    }
}

pub fn mkdir(path: &str, mode: u32) -> serde_json::Value {
    serde_json::json!({"volume_name": VOLUME, "path": path, "mode": mode})
}

pub fn alice() -> UserDetails {
    UserDetails::new("alice", vec!["staff".into()])
}

pub fn bob() -> UserDetails {
    UserDetails::new("bob", vec!["users".into()])
}

/// Entries present in `after` but absent or different in `before`.
pub fn changed(
    before: &[(IndexId, Vec<u8>, Vec<u8>)],
    after: &[(IndexId, Vec<u8>, Vec<u8>)],
) -> Vec<(IndexId, Vec<u8>)> {
    after
        .iter()
        .filter(|entry| !before.contains(entry))
        .map(|(index, key, _)| (*index, key.clone()))
        .collect()
}
