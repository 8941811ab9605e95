//! engine::gate
//!
//! Leadership gating for writes to replicated stores.
//!
//! # Architecture
//!
//! A replicated store accepts writes only on its current write master. The
//! replication subsystem publishes who that is through a [`LeadershipToken`];
//! everything else only reads it.
//!
//! The gate is checked twice:
//!
//! 1. By the operation, before any batch is built. This is an early reject
//!    that keeps followers from doing validation work for nothing.
//! 2. By the storage engine, inside its commit critical section. This is
//!    the authoritative check: leadership may move between (1) and the
//!    commit, and a batch that passed (1) must still not become durable on
//!    a node that lost mastership.
//!
//! # Invariants
//!
//! - Unreplicated stores always pass
//! - A replicated store passes only when local id == advertised master id
//! - An unknown master never passes
//!
//! # Example
//!
//! ```
//! use metatx::core::types::NodeId;
//! use metatx::engine::gate::{LeadershipToken, WriteGate};
//!
//! let local = NodeId::new("mrc-1").unwrap();
//! let token = LeadershipToken::new(local.clone(), None);
//! let gate = WriteGate::Replicated(token.clone());
//!
//! // Unknown master: redirect with no hint
//! assert!(gate.check_writable().is_err());
//!
//! token.advertise_master(Some(local));
//! assert!(gate.check_writable().is_ok());
//!
//! token.advertise_master(Some(NodeId::new("mrc-2").unwrap()));
//! let redirect = gate.check_writable().unwrap_err();
//! assert_eq!(redirect.master.unwrap().as_str(), "mrc-2");
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use crate::core::types::NodeId;

/// Rejection from a gate: the caller should retry against `master`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("not the write master; current master: {}", display_master(.master))]
pub struct Redirect {
    /// The advertised master, if one is known.
    pub master: Option<NodeId>,
}

/// Format an optional master for messages.
pub(crate) fn display_master(master: &Option<NodeId>) -> &str {
    master.as_ref().map_or("unknown", NodeId::as_str)
}

/// Process-wide view of which replica is the write master.
///
/// Cloning shares the underlying state. Only the replication subsystem
/// should call [`advertise_master`](Self::advertise_master).
#[derive(Debug, Clone)]
pub struct LeadershipToken {
    local: NodeId,
    master: Arc<watch::Sender<Option<NodeId>>>,
}

impl LeadershipToken {
    /// Create a token for `local` with an initially advertised master.
    pub fn new(local: NodeId, master: Option<NodeId>) -> Self {
        let (tx, _rx) = watch::channel(master);
        Self {
            local,
            master: Arc::new(tx),
        }
    }

    /// This node's identity.
    pub fn local(&self) -> &NodeId {
        &self.local
    }

    /// The currently advertised master.
    pub fn master(&self) -> Option<NodeId> {
        self.master.borrow().clone()
    }

    /// True if this node is the advertised master.
    pub fn is_master(&self) -> bool {
        self.master.borrow().as_ref() == Some(&self.local)
    }

    /// Publish a new master (or `None` while an election is in progress).
    pub fn advertise_master(&self, master: Option<NodeId>) {
        let previous = self.master.send_replace(master.clone());
        if previous != master {
            tracing::info!(
                local = %self.local,
                previous = display_master(&previous),
                current = display_master(&master),
                "write master changed"
            );
        }
    }
}

/// Write admission policy of one store.
#[derive(Debug, Clone)]
pub enum WriteGate {
    /// The store is local to this node; every write is admitted.
    Unreplicated,
    /// The store is replicated; only the write master admits writes.
    Replicated(LeadershipToken),
}

impl WriteGate {
    /// Decide whether this node may accept a write right now.
    pub fn check_writable(&self) -> Result<(), Redirect> {
        match self {
            WriteGate::Unreplicated => Ok(()),
            WriteGate::Replicated(token) => {
                let master = token.master();
                if master.as_ref() == Some(token.local()) {
                    Ok(())
                } else {
                    Err(Redirect { master })
                }
            }
        }
    }

    /// True if writes are subject to leadership.
    pub fn is_replicated(&self) -> bool {
        matches!(self, WriteGate::Replicated(_))
    }
}
