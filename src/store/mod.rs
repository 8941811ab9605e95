//! store
//!
//! Storage engine contract and the reference in-memory engine.
//!
//! # Modules
//!
//! - [`batch`] - The atomic write unit: entries plus preconditions
//! - [`memory`] - In-memory engine with a FIFO commit worker
//! - [`volume`] - Per-volume handle over an engine (reads, id allocation)
//!
//! # Engine Contract
//!
//! A [`StorageEngine`] must:
//! 1. Apply every entry of a committed batch or none of them
//! 2. Linearize batches that touch the same key
//! 3. Re-check its [`WriteGate`] inside the commit critical section
//! 4. Check batch preconditions inside the same critical section
//! 5. Invoke the commit callback exactly once per `commit` call
//!
//! `commit` never blocks waiting for durability; completion is delivered on
//! the engine's own execution context.

pub mod batch;
pub mod memory;
pub mod volume;

pub use batch::{EntryKind, Expected, Precondition, UpdateEntry, WriteBatch};
pub use memory::MemoryEngine;
pub use volume::{VolumeRegistry, VolumeStore};

use thiserror::Error;

use crate::core::types::{IndexId, NodeId};
use crate::engine::gate::{display_master, WriteGate};
use batch::DisplayKey;

/// Outcome of a successful commit, opaque to most operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// Position of this batch in the engine's total commit order.
    pub sequence: u64,
    /// Number of entries applied.
    pub applied: usize,
}

/// Engine-level commit failure. Nothing of the batch is visible.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    /// Leadership was lost between admission and commit.
    #[error("not the write master at commit time; current master: {}", display_master(.master))]
    NotMaster { master: Option<NodeId> },

    /// A batch precondition did not hold.
    #[error("precondition failed on {index} key {}", DisplayKey(.key))]
    PreconditionFailed { index: IndexId, key: Vec<u8> },

    /// The engine stopped before the batch could be applied.
    #[error("storage engine '{0}' is shut down")]
    Shutdown(String),

    /// The engine failed while applying the batch and rolled it back.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Read-path failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The engine cannot serve requests.
    #[error("storage engine unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("corrupt record in {index} at key {key}: {message}")]
    Corrupt {
        index: IndexId,
        key: String,
        message: String,
    },
}

impl StorageError {
    /// Build a `Corrupt` error for a key.
    pub fn corrupt(index: IndexId, key: &[u8], message: impl ToString) -> Self {
        StorageError::Corrupt {
            index,
            key: DisplayKey(key).to_string(),
            message: message.to_string(),
        }
    }
}

/// Single-fire completion of a commit.
pub type CommitCallback = Box<dyn FnOnce(Result<CommitResult, CommitError>) + Send + 'static>;

/// An indexed key-value store with atomic multi-key commit.
pub trait StorageEngine: Send + Sync {
    /// Human-readable engine name, used in logs.
    fn name(&self) -> &str;

    /// The admission policy this engine enforces at commit time.
    fn write_gate(&self) -> &WriteGate;

    /// Apply `batch` atomically and report the outcome through `on_done`.
    ///
    /// Returns immediately. `on_done` runs exactly once, possibly on
    /// another thread.
    fn commit(&self, batch: WriteBatch, on_done: CommitCallback);

    /// Read the current value of a key.
    fn lookup(&self, index: IndexId, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Read all entries whose key starts with `prefix`, in key order.
    fn scan_prefix(
        &self,
        index: IndexId,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}
