//! engine::update
//!
//! The atomic update: an ordered write batch bound to a post-processor.
//!
//! # Architecture
//!
//! An operation builds one [`AtomicUpdate`] per request, after all of its
//! validation has passed. `submit` consumes the update, hands the batch to
//! the storage engine and returns immediately. When the engine reports the
//! commit outcome:
//!
//! ```text
//! commit Ok  -> post-processor(result, metadata) -> Ok  -> callback.success
//!                                                -> Err -> callback.failure(PostProcessing)
//! commit Err -> callback.failure(Commit)   (post-processor never runs)
//! ```
//!
//! # Invariants
//!
//! - The post-processor runs at most once, and only after a successful commit
//! - A panicking post-processor is contained; the committed mutation stays
//! - The callback fires exactly once, even if the engine drops the
//!   completion without invoking it
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use std::sync::Arc;
//! use metatx::core::types::IndexId;
//! use metatx::engine::gate::WriteGate;
//! use metatx::engine::{AtomicUpdate, Callback, RequestMetadata, Response};
//! use metatx::store::MemoryEngine;
//!
//! let engine = MemoryEngine::start("example", WriteGate::Unreplicated).unwrap();
//! let mut update = AtomicUpdate::new(engine, Box::new(|_, _| Ok(Response::Empty)));
//! update.add_put(IndexId::new(0), b"k".to_vec(), b"v".to_vec());
//!
//! let (callback, reply) = Callback::channel();
//! update.submit(callback, RequestMetadata::new());
//! assert_eq!(reply.await.unwrap().result, Ok(Response::Empty));
//! # }
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::callback::Callback;
use super::error::OperationError;
use super::request::{RequestMetadata, Response};
use crate::core::types::IndexId;
use crate::store::{CommitError, CommitResult, StorageEngine, UpdateEntry, WriteBatch};

/// Builds the response once the batch is durable.
///
/// Bound when the update is created; it captures whatever pre-commit
/// values the response needs.
pub type PostProcessor =
    Box<dyn FnOnce(&CommitResult, &RequestMetadata) -> anyhow::Result<Response> + Send + 'static>;

/// An ordered set of mutations committed together.
pub struct AtomicUpdate {
    engine: Arc<dyn StorageEngine>,
    batch: WriteBatch,
    post: PostProcessor,
}

impl AtomicUpdate {
    /// Start an empty update against `engine`.
    pub fn new(engine: Arc<dyn StorageEngine>, post: PostProcessor) -> Self {
        Self {
            engine,
            batch: WriteBatch::new(),
            post,
        }
    }

    /// Append an insert-or-overwrite.
    pub fn add_put(&mut self, index: IndexId, key: Vec<u8>, value: Vec<u8>) {
        self.batch.put(index, key, value);
    }

    /// Append a delete. Deleting an absent key is not an error.
    pub fn add_delete(&mut self, index: IndexId, key: Vec<u8>) {
        self.batch.delete(index, key);
    }

    /// Require `key` to be absent at commit time.
    pub fn expect_absent(&mut self, index: IndexId, key: Vec<u8>) {
        self.batch.expect_absent(index, key);
    }

    /// Require `key` to hold `value` at commit time.
    pub fn expect_value(&mut self, index: IndexId, key: Vec<u8>, value: Vec<u8>) {
        self.batch.expect_value(index, key, value);
    }

    /// Entries added so far, in order.
    pub fn entries(&self) -> &[UpdateEntry] {
        self.batch.entries()
    }

    /// Hand the batch to the engine. Returns without waiting for the commit.
    pub fn submit(self, callback: Callback, metadata: RequestMetadata) {
        let AtomicUpdate {
            engine,
            batch,
            post,
        } = self;

        tracing::debug!(
            engine = engine.name(),
            request_id = %metadata.request_id,
            entries = batch.len(),
            "submitting batch"
        );

        let pending = PendingCompletion::new(callback, metadata, post);
        engine.commit(batch, Box::new(move |result| pending.finish(result)));
    }
}

impl fmt::Debug for AtomicUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicUpdate")
            .field("engine", &self.engine.name())
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}

/// The per-request state carried through the engine.
///
/// Dropping it unfinished fires the callback with an internal error.
struct PendingCompletion {
    callback: Option<Callback>,
    metadata: Option<RequestMetadata>,
    post: Option<PostProcessor>,
}

impl PendingCompletion {
    fn new(callback: Callback, metadata: RequestMetadata, post: PostProcessor) -> Self {
        Self {
            callback: Some(callback),
            metadata: Some(metadata),
            post: Some(post),
        }
    }

    fn finish(mut self, result: Result<CommitResult, CommitError>) {
        let (Some(callback), Some(metadata), Some(post)) =
            (self.callback.take(), self.metadata.take(), self.post.take())
        else {
            return;
        };

        match result {
            Ok(commit) => match run_post_processor(post, &commit, &metadata) {
                Ok(response) => callback.success(metadata, response),
                Err(message) => {
                    tracing::error!(
                        request_id = %metadata.request_id,
                        sequence = commit.sequence,
                        error = %message,
                        "post-processing failed after commit"
                    );
                    callback.failure(metadata, OperationError::PostProcessing(message));
                }
            },
            Err(cause) => {
                tracing::debug!(
                    request_id = %metadata.request_id,
                    error = %cause,
                    "commit failed"
                );
                callback.failure(metadata, OperationError::Commit(cause));
            }
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if let (Some(callback), Some(metadata)) = (self.callback.take(), self.metadata.take()) {
            tracing::error!(
                request_id = %metadata.request_id,
                "commit completion dropped without a result"
            );
            callback.failure(
                metadata,
                OperationError::Internal("commit completion was dropped by the engine".into()),
            );
        }
    }
}

fn run_post_processor(
    post: PostProcessor,
    commit: &CommitResult,
    metadata: &RequestMetadata,
) -> Result<Response, String> {
    match catch_unwind(AssertUnwindSafe(|| post(commit, metadata))) {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(format!("{:#}", err)),
        Err(panic) => Err(format!("post-processor panicked: {}", panic_message(&*panic))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
