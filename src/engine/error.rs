//! engine::error
//!
//! The error type delivered to callbacks.
//!
//! # Kinds
//!
//! | Kind | Raised | Side effects |
//! |---|---|---|
//! | Validation | before the batch is built | none |
//! | Redirect | by the leadership gate, before the batch is built | none |
//! | Commit | by the engine, asynchronously | none (batch rolled back) |
//! | PostProcessing | after a successful commit | mutation is durable |
//! | Internal | read failures, dropped completions | none known |
//!
//! A `PostProcessing` error means "applied, response indeterminate": clients
//! must not blindly retry a non-idempotent request that failed this way.

use serde::Serialize;
use thiserror::Error;

use super::gate::{display_master, Redirect};
use crate::core::metadata::MetadataError;
use crate::core::types::{Errno, NodeId, ProcedureId, TypeError};
use crate::store::{CommitError, StorageError};

/// Coarse classification of an [`OperationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Redirect,
    Commit,
    PostProcessing,
    Internal,
}

/// Failure of a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// A POSIX-level validation failure (permission, existence, ...).
    #[error("{errno}: {message}")]
    Posix { errno: Errno, message: String },

    /// The request payload could not be decoded or is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No operation is registered for the procedure id.
    #[error("unknown procedure id {0}")]
    UnknownProcedure(ProcedureId),

    /// This node is not the write master for the target store.
    #[error("not the write master; current master: {}", display_master(.master))]
    Redirect { master: Option<NodeId> },

    /// The engine failed to commit the batch; nothing was applied.
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    /// Building the response failed after the batch was committed.
    #[error("mutation applied but response could not be built: {0}")]
    PostProcessing(String),

    /// Reading state during validation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OperationError {
    /// Shorthand for a POSIX validation failure.
    pub fn posix(errno: Errno, message: impl Into<String>) -> Self {
        OperationError::Posix {
            errno,
            message: message.into(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Posix { .. }
            | OperationError::InvalidArgument(_)
            | OperationError::UnknownProcedure(_) => ErrorKind::Validation,
            OperationError::Redirect { .. } => ErrorKind::Redirect,
            OperationError::Commit(_) => ErrorKind::Commit,
            OperationError::PostProcessing(_) => ErrorKind::PostProcessing,
            OperationError::Storage(_) | OperationError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The POSIX errno, if this is a POSIX failure.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            OperationError::Posix { errno, .. } => Some(*errno),
            OperationError::InvalidArgument(_) => Some(Errno::Einval),
            _ => None,
        }
    }

    /// Where the client should retry, for redirects raised either by the
    /// gate or by the engine at commit time.
    pub fn redirect_hint(&self) -> Option<&NodeId> {
        match self {
            OperationError::Redirect { master }
            | OperationError::Commit(CommitError::NotMaster { master }) => master.as_ref(),
            _ => None,
        }
    }
}

impl From<Redirect> for OperationError {
    fn from(redirect: Redirect) -> Self {
        OperationError::Redirect {
            master: redirect.master,
        }
    }
}

impl From<TypeError> for OperationError {
    fn from(err: TypeError) -> Self {
        OperationError::InvalidArgument(err.to_string())
    }
}

impl From<MetadataError> for OperationError {
    fn from(err: MetadataError) -> Self {
        OperationError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            OperationError::posix(Errno::Eexist, "x").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            OperationError::Redirect { master: None }.kind(),
            ErrorKind::Redirect
        );
        assert_eq!(
            OperationError::Commit(CommitError::Shutdown("e".into())).kind(),
            ErrorKind::Commit
        );
        assert_eq!(
            OperationError::PostProcessing("x".into()).kind(),
            ErrorKind::PostProcessing
        );
        assert_eq!(
            OperationError::Internal("x".into()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn posix_display() {
        let err = OperationError::posix(Errno::Eexist, "file or directory 'a' exists already");
        assert_eq!(err.to_string(), "EEXIST: file or directory 'a' exists already");
        assert_eq!(err.errno(), Some(Errno::Eexist));
    }

    #[test]
    fn redirect_hint_covers_commit_time_redirects() {
        let master = NodeId::new("m").unwrap();
        let err = OperationError::Commit(CommitError::NotMaster {
            master: Some(master.clone()),
        });
        assert_eq!(err.redirect_hint(), Some(&master));

        let err: OperationError = Redirect {
            master: Some(master.clone()),
        }
        .into();
        assert_eq!(err.redirect_hint(), Some(&master));
    }

    #[test]
    fn type_errors_are_invalid_arguments() {
        let err: OperationError = TypeError::InvalidPath("bad".into()).into();
        assert_eq!(err.errno(), Some(Errno::Einval));
    }
}
