//! store::batch
//!
//! The unit of atomic commit handed to a storage engine.
//!
//! A [`WriteBatch`] is an ordered list of put/delete entries plus a set of
//! preconditions. The engine checks every precondition and applies every
//! entry inside one critical section: either all entries become visible or
//! none do.
//!
//! # Ordering
//!
//! Entries are applied in insertion order, so a later entry on the same key
//! wins. Preconditions are evaluated against the state *before* any entry of
//! the batch is applied.
//!
//! # Example
//!
//! ```
//! use metatx::core::types::IndexId;
//! use metatx::store::batch::{EntryKind, WriteBatch};
//!
//! let mut batch = WriteBatch::new();
//! batch.expect_absent(IndexId::new(0), b"new".to_vec());
//! batch.put(IndexId::new(0), b"new".to_vec(), b"value".to_vec());
//! batch.delete(IndexId::new(1), b"old".to_vec());
//!
//! assert_eq!(batch.len(), 2);
//! assert_eq!(batch.entries()[1].kind, EntryKind::Delete);
//! assert_eq!(batch.preconditions().len(), 1);
//! ```

use std::fmt;

use crate::core::types::IndexId;

/// What an entry does to its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Insert or overwrite the key with a value.
    Put(Vec<u8>),
    /// Remove the key. Deleting an absent key is not an error.
    Delete,
}

/// A single mutation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub index: IndexId,
    pub key: Vec<u8>,
    pub kind: EntryKind,
}

/// Expected state of a key at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    /// The key must not exist.
    Absent,
    /// The key must exist with exactly this value.
    Value(Vec<u8>),
}

/// A compare condition checked atomically with the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub index: IndexId,
    pub key: Vec<u8>,
    pub expected: Expected,
}

impl Precondition {
    /// Evaluate against the current value of the key.
    pub fn holds(&self, current: Option<&[u8]>) -> bool {
        match (&self.expected, current) {
            (Expected::Absent, None) => true,
            (Expected::Value(want), Some(have)) => want.as_slice() == have,
            _ => false,
        }
    }
}

/// An ordered set of entries committed as one indivisible unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    entries: Vec<UpdateEntry>,
    preconditions: Vec<Precondition>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a put entry.
    pub fn put(&mut self, index: IndexId, key: Vec<u8>, value: Vec<u8>) {
        self.entries.push(UpdateEntry {
            index,
            key,
            kind: EntryKind::Put(value),
        });
    }

    /// Append a delete entry.
    pub fn delete(&mut self, index: IndexId, key: Vec<u8>) {
        self.entries.push(UpdateEntry {
            index,
            key,
            kind: EntryKind::Delete,
        });
    }

    /// Require `key` to be absent at commit time.
    pub fn expect_absent(&mut self, index: IndexId, key: Vec<u8>) {
        self.preconditions.push(Precondition {
            index,
            key,
            expected: Expected::Absent,
        });
    }

    /// Require `key` to hold exactly `value` at commit time.
    pub fn expect_value(&mut self, index: IndexId, key: Vec<u8>, value: Vec<u8>) {
        self.preconditions.push(Precondition {
            index,
            key,
            expected: Expected::Value(value),
        });
    }

    /// Entries in application order.
    pub fn entries(&self) -> &[UpdateEntry] {
        &self.entries
    }

    /// Preconditions checked before any entry is applied.
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Number of entries (preconditions are not counted).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the batch has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render a key for logs and error messages: UTF-8 where printable,
/// hex otherwise.
pub struct DisplayKey<'a>(pub &'a [u8]);

impl fmt::Display for DisplayKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.0) {
            Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "{:?}", s),
            _ => {
                f.write_str("0x")?;
                for byte in self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}
