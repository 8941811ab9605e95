//! End-to-end tests of the mutation pipeline through the dispatcher.
//!
//! Each test drives a request from dispatch to its single reply and then
//! inspects the volume database directly.

mod common;

use std::sync::Arc;

use common::{alice, bob, changed, mkdir, Node, DATA_DIR};
use metatx::core::metadata::{
    decode_file_id, file_key, ADDRESS_MAPPING_INDEX, FILE_INDEX, LAST_FILE_ID_KEY, VOLUME_INDEX,
};
use metatx::core::types::{Errno, FileId, IndexId, ProcedureId, UserDetails};
use metatx::engine::{
    AtomicUpdate, Callback, DispatcherBuilder, ErrorKind, Operation, OperationError, Prepared,
    RequestContext, RequestMetadata, Response, WriteGate,
};
use metatx::ops::{CREATE_DIRECTORY, DELETE_MAPPING, SET_MAPPING};
use metatx::store::{CommitCallback, CommitError, MemoryEngine, StorageEngine, StorageError, WriteBatch};

mod create_directory {
    use super::*;

    #[tokio::test]
    async fn writes_three_entries_and_returns_the_timestamp() {
        let node = Node::start();
        let before = node.engine.dump();

        let reply = node.call(CREATE_DIRECTORY, alice(), mkdir("data/logs", 0o755)).await;
        assert_eq!(reply.result, Ok(Response::Timestamp { timestamp_s: 1000 }));

        let after = node.engine.dump();
        let mut touched = changed(&before, &after);
        touched.sort();
        let mut expected = vec![
            (FILE_INDEX, file_key(DATA_DIR, "logs")),
            (FILE_INDEX, file_key(FileId::ROOT, "data")),
            (VOLUME_INDEX, LAST_FILE_ID_KEY.to_vec()),
        ];
        expected.sort();
        assert_eq!(touched, expected);

        let logs = node.record(DATA_DIR, "logs").unwrap();
        assert_eq!(logs.id, FileId::new(8));
        assert_eq!(logs.parent_id, DATA_DIR);
        assert_eq!(logs.owner, "alice");
        assert_eq!(logs.owning_group, "staff");
        assert_eq!(logs.mode, 0o755);
        assert_eq!(logs.times.atime, 1000);
        assert_eq!(logs.times.ctime, 1000);
        assert_eq!(logs.times.mtime, 1000);

        let data = node.record(FileId::ROOT, "data").unwrap();
        assert_eq!(data.times.ctime, 1000);
        assert_eq!(data.times.mtime, 1000);
        assert_eq!(data.times.atime, 0);

        let last = node.engine.lookup(VOLUME_INDEX, LAST_FILE_ID_KEY).unwrap().unwrap();
        assert_eq!(decode_file_id(&last), Some(FileId::new(8)));
    }

    #[tokio::test]
    async fn existing_name_fails_without_side_effects() {
        let node = Node::start();
        let before = node.engine.dump();

        let reply = node.call(CREATE_DIRECTORY, alice(), mkdir("data", 0o755)).await;
        let err = reply.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.errno(), Some(Errno::Eexist));
        assert_eq!(node.engine.dump(), before);
    }

    #[tokio::test]
    async fn volume_root_is_eexist_even_without_permission() {
        let node = Node::start();
        let before = node.engine.dump();

        let reply = node.call(CREATE_DIRECTORY, bob(), mkdir("/", 0o755)).await;
        assert_eq!(reply.result.unwrap_err().errno(), Some(Errno::Eexist));
        assert_eq!(node.engine.dump(), before);
    }

    #[tokio::test]
    async fn permission_denied_without_side_effects() {
        let node = Node::start();
        let before = node.engine.dump();
        let sequence = node.engine.last_sequence();

        let reply = node.call(CREATE_DIRECTORY, bob(), mkdir("data/x", 0o755)).await;
        assert_eq!(reply.result.unwrap_err().errno(), Some(Errno::Eacces));
        assert_eq!(node.engine.dump(), before);
        assert_eq!(node.engine.last_sequence(), sequence);
    }

    #[tokio::test]
    async fn missing_parent_is_enoent() {
        let node = Node::start();
        let reply = node.call(CREATE_DIRECTORY, alice(), mkdir("data/a/b", 0o755)).await;
        assert_eq!(reply.result.unwrap_err().errno(), Some(Errno::Enoent));
    }

    #[tokio::test]
    async fn search_denial_precedes_existence() {
        let node = Node::start();
        // Lock bob out of /data, then ask about a name that exists below it.
        node.call(CREATE_DIRECTORY, alice(), mkdir("data/private", 0o700))
            .await
            .result
            .unwrap();
        node.call(CREATE_DIRECTORY, alice(), mkdir("data/private/x", 0o755))
            .await
            .result
            .unwrap();

        let reply = node
            .call(CREATE_DIRECTORY, bob(), mkdir("data/private/x", 0o755))
            .await;
        assert_eq!(reply.result.unwrap_err().errno(), Some(Errno::Eacces));
    }

    #[tokio::test]
    async fn ids_are_unique_across_requests() {
        let node = Node::start();
        for name in ["a", "b", "c"] {
            node.call(CREATE_DIRECTORY, alice(), mkdir(&format!("data/{}", name), 0o755))
                .await
                .result
                .unwrap();
        }
        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|n| node.record(DATA_DIR, n).unwrap().id)
            .collect();
        assert_eq!(ids, vec![FileId::new(8), FileId::new(9), FileId::new(10)]);
    }
}

mod leadership {
    use super::*;

    #[tokio::test]
    async fn follower_redirects_before_validation() {
        let node = Node::start();
        node.advertise("mrc-2");
        let before = node.engine.dump();

        // Both a valid and a nonsensical payload get the same redirect.
        for payload in [mkdir("data/logs", 0o755), serde_json::json!({"junk": 1})] {
            let reply = node.call(CREATE_DIRECTORY, alice(), payload).await;
            let err = reply.result.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Redirect);
            assert_eq!(err.redirect_hint().map(|m| m.as_str()), Some("mrc-2"));
        }
        assert_eq!(node.engine.dump(), before);
    }

    #[tokio::test]
    async fn regaining_mastership_resumes_writes() {
        let node = Node::start();
        node.advertise("mrc-2");
        assert!(node
            .call(CREATE_DIRECTORY, alice(), mkdir("data/a", 0o755))
            .await
            .result
            .is_err());

        node.advertise("mrc-1");
        assert!(node
            .call(CREATE_DIRECTORY, alice(), mkdir("data/a", 0o755))
            .await
            .is_success());
    }

    #[tokio::test]
    async fn unknown_master_still_redirects() {
        let node = Node::start();
        node.token.advertise_master(None);
        let reply = node
            .call(DELETE_MAPPING, UserDetails::root(), serde_json::json!({"uuid": "osd-1"}))
            .await;
        let err = reply.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Redirect);
        assert!(err.redirect_hint().is_none());
    }
}

mod mappings {
    use super::*;

    fn set(uuid: &str, version: u64) -> serde_json::Value {
        serde_json::json!({
            "uuid": uuid,
            "version": version,
            "protocol": "oncrpc",
            "address": "10.0.0.5",
            "port": 32640,
        })
    }

    #[tokio::test]
    async fn set_then_delete_twice() {
        let node = Node::start();
        let reply = node.call(SET_MAPPING, UserDetails::root(), set("osd-1", 0)).await;
        assert_eq!(reply.result, Ok(Response::MappingSet { new_version: 1 }));
        assert!(node
            .directory
            .lookup(ADDRESS_MAPPING_INDEX, b"osd-1")
            .unwrap()
            .is_some());

        for _ in 0..2 {
            let reply = node
                .call(DELETE_MAPPING, UserDetails::root(), serde_json::json!({"uuid": "osd-1"}))
                .await;
            assert_eq!(reply.result, Ok(Response::Empty));
        }
        assert!(node
            .directory
            .lookup(ADDRESS_MAPPING_INDEX, b"osd-1")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn stale_version_is_eagain() {
        let node = Node::start();
        node.call(SET_MAPPING, UserDetails::root(), set("osd-1", 0))
            .await
            .result
            .unwrap();
        let reply = node.call(SET_MAPPING, UserDetails::root(), set("osd-1", 0)).await;
        assert_eq!(reply.result.unwrap_err().errno(), Some(Errno::Eagain));
    }

    #[tokio::test]
    async fn delete_leaves_the_volume_alone() {
        let node = Node::start();
        let before = node.engine.dump();
        node.call(DELETE_MAPPING, UserDetails::root(), serde_json::json!({"uuid": "osd-1"}))
            .await
            .result
            .unwrap();
        assert_eq!(node.engine.dump(), before);
    }
}

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn unknown_procedure_fails_through_callback() {
        let node = Node::start();
        let reply = node
            .call(ProcedureId::new(4242), alice(), serde_json::json!({}))
            .await;
        assert!(matches!(
            reply.result,
            Err(OperationError::UnknownProcedure(id)) if id.get() == 4242
        ));
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let node = Node::start();
        let metadata = RequestMetadata::new();
        let id = metadata.request_id;
        let (callback, rx) = Callback::channel();
        node.dispatcher
            .dispatch(CREATE_DIRECTORY, mkdir("data/x", 0o755), alice(), metadata, callback);
        assert_eq!(rx.await.unwrap().metadata.request_id, id);
    }
}

/// Operations built outside `ops` that exercise the failure paths of the
/// commit and post-processing stages.
mod failure_paths {
    use super::*;

    const SCRIPTED: ProcedureId = ProcedureId::new(900);

    /// An engine whose commits always fail.
    struct BrokenEngine {
        gate: WriteGate,
    }

    impl StorageEngine for BrokenEngine {
        fn name(&self) -> &str {
            "broken"
        }

        fn write_gate(&self) -> &WriteGate {
            &self.gate
        }

        fn commit(&self, _batch: WriteBatch, on_done: CommitCallback) {
            on_done(Err(CommitError::Storage("disk full".into())));
        }

        fn lookup(&self, _: IndexId, _: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(None)
        }

        fn scan_prefix(
            &self,
            _: IndexId,
            _: &[u8],
        ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
            Ok(Vec::new())
        }
    }

    enum Post {
        Ok,
        Err,
        Panic,
    }

    struct Scripted {
        engine: Arc<dyn StorageEngine>,
        post: fn() -> Post,
    }

    impl Operation for Scripted {
        fn procedure_id(&self) -> ProcedureId {
            SCRIPTED
        }

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn prepare(&self, _ctx: &RequestContext) -> Result<Prepared, OperationError> {
            let post = self.post;
            let mut update = AtomicUpdate::new(
                Arc::clone(&self.engine),
                Box::new(move |_, _| match post() {
                    Post::Ok => Ok(Response::Empty),
                    Post::Err => Err(anyhow::anyhow!("response encoding failed")),
                    Post::Panic => panic!("post-processor bug"),
                }),
            );
            update.add_put(IndexId::new(0), b"a".to_vec(), b"1".to_vec());
            update.add_put(IndexId::new(0), b"b".to_vec(), b"2".to_vec());
            Ok(Prepared::Update(update))
        }
    }

    async fn run(
        engine: Arc<dyn StorageEngine>,
        post: fn() -> Post,
    ) -> Result<Response, OperationError> {
        let mut builder = DispatcherBuilder::new();
        builder.register(Arc::new(Scripted { engine, post })).unwrap();
        let dispatcher = builder.build();

        let (callback, rx) = Callback::channel();
        dispatcher.dispatch(
            SCRIPTED,
            serde_json::Value::Null,
            UserDetails::root(),
            RequestMetadata::new(),
            callback,
        );
        rx.await.unwrap().result
    }

    #[tokio::test]
    async fn commit_failure_skips_post_processing() {
        let engine = Arc::new(BrokenEngine {
            gate: WriteGate::Unreplicated,
        });
        let err = run(engine, || Post::Panic).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Commit);
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn post_processor_error_keeps_the_commit() {
        let engine = MemoryEngine::start("scripted", WriteGate::Unreplicated).unwrap();
        let err = run(engine.clone(), || Post::Err).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PostProcessing);
        assert_eq!(engine.dump().len(), 2);
    }

    #[tokio::test]
    async fn post_processor_panic_is_contained() {
        let engine = MemoryEngine::start("scripted", WriteGate::Unreplicated).unwrap();
        let err = run(engine.clone(), || Post::Panic).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PostProcessing);
        assert!(err.to_string().contains("post-processor bug"));
        assert_eq!(engine.dump().len(), 2);

        // The engine keeps serving.
        assert_eq!(run(engine.clone(), || Post::Ok).await, Ok(Response::Empty));
    }

    #[tokio::test]
    async fn leadership_lost_before_commit_is_a_commit_redirect() {
        let node = Node::start();
        let engine: Arc<dyn StorageEngine> = node.engine.clone();
        node.advertise("mrc-2");

        // The scripted op skips the gate, so the engine's own check catches it.
        let err = run(engine, || Post::Ok).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Commit);
        assert_eq!(err.redirect_hint().map(|m| m.as_str()), Some("mrc-2"));
        assert!(node.engine.lookup(IndexId::new(0), b"a").unwrap().is_none());
    }
}
