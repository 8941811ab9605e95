//! store::memory
//!
//! In-memory storage engine with a single FIFO commit worker.
//!
//! # Architecture
//!
//! `commit` enqueues the batch on an unbounded channel and returns. A worker
//! task drains the queue and applies one batch at a time under the state
//! write lock, then invokes the batch's completion on the worker. This gives
//! every batch a position in one total order (its commit `sequence`), which
//! in particular linearizes batches that share keys.
//!
//! # Commit Steps
//!
//! Inside the write lock, for each batch:
//! 1. Re-check the engine's [`WriteGate`]; a lost mastership fails the batch
//! 2. Check all preconditions against the pre-batch state
//! 3. Apply entries in order, recording the previous value of each key
//! 4. On a mid-batch failure, restore recorded values in reverse order
//! 5. Bump the commit sequence
//!
//! Readers take the read lock and never observe a partially applied batch.
//!
//! # Example
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use metatx::core::types::IndexId;
//! use metatx::engine::gate::WriteGate;
//! use metatx::store::{MemoryEngine, StorageEngine, WriteBatch};
//!
//! let engine = MemoryEngine::start("example", WriteGate::Unreplicated).unwrap();
//!
//! let mut batch = WriteBatch::new();
//! batch.put(IndexId::new(0), b"k".to_vec(), b"v".to_vec());
//!
//! let (tx, rx) = tokio::sync::oneshot::channel();
//! engine.commit(batch, Box::new(move |result| {
//!     let _ = tx.send(result);
//! }));
//!
//! let result = rx.await.unwrap().unwrap();
//! assert_eq!(result.applied, 1);
//! assert_eq!(engine.lookup(IndexId::new(0), b"k").unwrap(), Some(b"v".to_vec()));
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use super::batch::{DisplayKey, EntryKind, UpdateEntry, WriteBatch};
use super::{CommitCallback, CommitError, CommitResult, StorageEngine, StorageError};
use crate::core::types::IndexId;
use crate::engine::gate::WriteGate;

type Index = BTreeMap<Vec<u8>, Vec<u8>>;

/// Committed state of all indices.
#[derive(Debug, Default)]
struct State {
    indices: HashMap<IndexId, Index>,
    sequence: u64,
}

/// Previous value of a key, recorded before an entry overwrote it.
struct Undo {
    index: IndexId,
    key: Vec<u8>,
    previous: Option<Vec<u8>>,
}

impl State {
    fn get(&self, index: IndexId, key: &[u8]) -> Option<&[u8]> {
        self.indices
            .get(&index)
            .and_then(|idx| idx.get(key))
            .map(Vec::as_slice)
    }

    fn apply_entry(&mut self, entry: &UpdateEntry) -> Undo {
        let index = self.indices.entry(entry.index).or_default();
        let previous = match &entry.kind {
            EntryKind::Put(value) => index.insert(entry.key.clone(), value.clone()),
            EntryKind::Delete => index.remove(&entry.key),
        };
        Undo {
            index: entry.index,
            key: entry.key.clone(),
            previous,
        }
    }

    fn rollback(&mut self, undo: Vec<Undo>) {
        for step in undo.into_iter().rev() {
            let index = self.indices.entry(step.index).or_default();
            match step.previous {
                Some(value) => {
                    index.insert(step.key, value);
                }
                None => {
                    index.remove(&step.key);
                }
            }
        }
    }
}

struct CommitJob {
    batch: WriteBatch,
    on_done: CommitCallback,
}

struct Shared {
    name: String,
    gate: WriteGate,
    state: RwLock<State>,
    #[cfg(any(test, feature = "fault_injection"))]
    faults: std::sync::Mutex<Vec<usize>>,
}

impl Shared {
    fn apply(&self, batch: &WriteBatch, enforce_gate: bool) -> Result<CommitResult, CommitError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if enforce_gate {
            self.gate
                .check_writable()
                .map_err(|redirect| CommitError::NotMaster {
                    master: redirect.master,
                })?;
        }

        for pre in batch.preconditions() {
            if !pre.holds(state.get(pre.index, &pre.key)) {
                return Err(CommitError::PreconditionFailed {
                    index: pre.index,
                    key: pre.key.clone(),
                });
            }
        }

        let fail_at = self.take_fault();

        let mut undo = Vec::with_capacity(batch.len());
        for (position, entry) in batch.entries().iter().enumerate() {
            if fail_at == Some(position) {
                state.rollback(undo);
                return Err(CommitError::Storage(format!(
                    "injected fault at entry {} ({} {})",
                    position,
                    entry.index,
                    DisplayKey(&entry.key)
                )));
            }
            undo.push(state.apply_entry(entry));
        }

        state.sequence += 1;
        Ok(CommitResult {
            sequence: state.sequence,
            applied: batch.len(),
        })
    }

    #[cfg(any(test, feature = "fault_injection"))]
    fn take_fault(&self) -> Option<usize> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        if faults.is_empty() {
            None
        } else {
            Some(faults.remove(0))
        }
    }

    #[cfg(not(any(test, feature = "fault_injection")))]
    fn take_fault(&self) -> Option<usize> {
        None
    }
}

/// An in-memory [`StorageEngine`].
pub struct MemoryEngine {
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<CommitJob>,
}

impl MemoryEngine {
    /// Create an engine and spawn its commit worker on the current Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` when called outside a runtime.
    pub fn start(name: impl Into<String>, gate: WriteGate) -> Result<Arc<Self>, StorageError> {
        let name = name.into();
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            StorageError::Unavailable(format!("engine '{}' needs a tokio runtime: {}", name, e))
        })?;

        let shared = Arc::new(Shared {
            name,
            gate,
            state: RwLock::new(State::default()),
            #[cfg(any(test, feature = "fault_injection"))]
            faults: std::sync::Mutex::new(Vec::new()),
        });

        let (queue, jobs) = mpsc::unbounded_channel();
        handle.spawn(run_worker(Arc::clone(&shared), jobs));

        Ok(Arc::new(Self { shared, queue }))
    }

    /// Apply a batch synchronously without the write-master check.
    ///
    /// This is the path for state that does not originate from a client
    /// write on this node: volume bootstrap and entries shipped by the
    /// replication subsystem. Preconditions are still enforced.
    pub fn install(&self, batch: &WriteBatch) -> Result<CommitResult, CommitError> {
        self.shared.apply(batch, false)
    }

    /// Sequence number of the most recent commit (0 before the first).
    pub fn last_sequence(&self) -> u64 {
        self.read_state().sequence
    }

    /// Copy of every stored entry, ordered by index then key.
    pub fn dump(&self) -> Vec<(IndexId, Vec<u8>, Vec<u8>)> {
        let state = self.read_state();
        let mut indices: Vec<_> = state.indices.iter().collect();
        indices.sort_by_key(|(id, _)| **id);
        indices
            .into_iter()
            .flat_map(|(id, index)| {
                index
                    .iter()
                    .map(move |(k, v)| (*id, k.clone(), v.clone()))
            })
            .collect()
    }

    /// Fail the next commit when it reaches entry `position`, after the
    /// entries before it have been applied. Faults queue up in call order.
    #[cfg(any(test, feature = "fault_injection"))]
    pub fn inject_fault_at(&self, position: usize) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(position);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.shared.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageEngine for MemoryEngine {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn write_gate(&self) -> &WriteGate {
        &self.shared.gate
    }

    fn commit(&self, batch: WriteBatch, on_done: CommitCallback) {
        if let Err(mpsc::error::SendError(job)) = self.queue.send(CommitJob { batch, on_done }) {
            (job.on_done)(Err(CommitError::Shutdown(self.shared.name.clone())));
        }
    }

    fn lookup(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.read_state().get(index, key).map(<[u8]>::to_vec))
    }

    fn scan_prefix(
        &self,
        index: IndexId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let state = self.read_state();
        let Some(index) = state.indices.get(&index) else {
            return Ok(Vec::new());
        };
        Ok(index
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

async fn run_worker(shared: Arc<Shared>, mut jobs: mpsc::UnboundedReceiver<CommitJob>) {
    while let Some(CommitJob { batch, on_done }) = jobs.recv().await {
        let result = shared.apply(&batch, true);
        match &result {
            Ok(commit) => tracing::debug!(
                engine = %shared.name,
                sequence = commit.sequence,
                entries = commit.applied,
                "batch committed"
            ),
            Err(error) => tracing::warn!(
                engine = %shared.name,
                entries = batch.len(),
                %error,
                "batch rejected"
            ),
        }

        // A panicking completion must not take the worker down with it.
        if catch_unwind(AssertUnwindSafe(move || on_done(result))).is_err() {
            tracing::error!(engine = %shared.name, "commit completion panicked");
        }
    }
    tracing::debug!(engine = %shared.name, "commit worker stopped");
}
