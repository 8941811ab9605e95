//! engine::dispatch
//!
//! Routes requests to the operation registered for their procedure id.
//!
//! # Architecture
//!
//! Operations are registered once at startup through a
//! [`DispatcherBuilder`]; `build` freezes the table into an immutable
//! [`Dispatcher`] that is shared across all request handlers. The
//! dispatcher keeps no per-request state.
//!
//! Each operation implements [`Operation::prepare`]: validate the request
//! and either build an [`AtomicUpdate`] or answer directly. The provided
//! [`Operation::start`] turns that into exactly one callback invocation:
//!
//! ```text
//! prepare -> Err(e)               -> callback.failure(e)   (no batch built)
//!         -> Prepared::Done(resp) -> callback.success(resp)
//!         -> Prepared::Update(u)  -> u.submit(callback)    (async)
//! ```
//!
//! # Invariants
//!
//! - One operation per procedure id
//! - Unknown procedure ids fail through the callback, never by panic
//! - Validation failures never reach the storage engine

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::callback::Callback;
use super::error::OperationError;
use super::request::{RequestContext, RequestMetadata, Response};
use super::update::AtomicUpdate;
use crate::core::types::{ProcedureId, UserDetails};

/// Result of validating a request.
#[derive(Debug)]
pub enum Prepared {
    /// Submit this update; the reply comes from its post-processor.
    Update(AtomicUpdate),
    /// Reply immediately without touching storage.
    Done(Response),
}

/// A request handler for one procedure id.
///
/// Implementations are stateless with respect to requests and are shared
/// across concurrent requests.
pub trait Operation: Send + Sync {
    /// The procedure id this operation serves.
    fn procedure_id(&self) -> ProcedureId;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Validate the request and build its mutation.
    ///
    /// Must not have side effects other than reads.
    fn prepare(&self, ctx: &RequestContext) -> Result<Prepared, OperationError>;

    /// Begin processing. Returns without waiting for the commit.
    fn start(&self, ctx: RequestContext, callback: Callback) {
        match self.prepare(&ctx) {
            Ok(Prepared::Update(update)) => update.submit(callback, ctx.metadata),
            Ok(Prepared::Done(response)) => callback.success(ctx.metadata, response),
            Err(err) => {
                match &err {
                    OperationError::Redirect { .. } => tracing::info!(
                        operation = self.name(),
                        request_id = %ctx.metadata.request_id,
                        error = %err,
                        "redirecting write"
                    ),
                    _ => tracing::debug!(
                        operation = self.name(),
                        request_id = %ctx.metadata.request_id,
                        error = %err,
                        "request rejected"
                    ),
                }
                callback.failure(ctx.metadata, err);
            }
        }
    }
}

/// Registration failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("procedure id {id} is already registered to '{existing}'")]
    DuplicateProcedure {
        id: ProcedureId,
        existing: &'static str,
    },
}

/// Collects operations before the dispatcher is frozen.
#[derive(Default)]
pub struct DispatcherBuilder {
    operations: HashMap<ProcedureId, Arc<dyn Operation>>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `operation` under its procedure id.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::DuplicateProcedure` if the id is taken.
    pub fn register(&mut self, operation: Arc<dyn Operation>) -> Result<&mut Self, DispatchError> {
        let id = operation.procedure_id();
        if let Some(existing) = self.operations.get(&id) {
            return Err(DispatchError::DuplicateProcedure {
                id,
                existing: existing.name(),
            });
        }
        self.operations.insert(id, operation);
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            operations: Arc::new(self.operations),
        }
    }
}

/// Immutable procedure table.
#[derive(Clone)]
pub struct Dispatcher {
    operations: Arc<HashMap<ProcedureId, Arc<dyn Operation>>>,
}

impl Dispatcher {
    /// Route one request.
    ///
    /// The callback fires exactly once: synchronously for unknown ids and
    /// validation failures, otherwise when the commit completes.
    pub fn dispatch(
        &self,
        procedure_id: ProcedureId,
        payload: serde_json::Value,
        user: UserDetails,
        metadata: RequestMetadata,
        callback: Callback,
    ) {
        let Some(operation) = self.operations.get(&procedure_id) else {
            tracing::warn!(
                procedure = %procedure_id,
                request_id = %metadata.request_id,
                "unknown procedure id"
            );
            callback.failure(metadata, OperationError::UnknownProcedure(procedure_id));
            return;
        };

        tracing::debug!(
            operation = operation.name(),
            procedure = %procedure_id,
            request_id = %metadata.request_id,
            user = %user.user_id,
            "dispatching request"
        );

        operation.start(
            RequestContext {
                procedure_id,
                payload,
                user,
                metadata,
            },
            callback,
        );
    }

    /// Registered procedure ids, ascending.
    pub fn procedures(&self) -> Vec<(ProcedureId, &'static str)> {
        let mut ids: Vec<_> = self
            .operations
            .iter()
            .map(|(id, op)| (*id, op.name()))
            .collect();
        ids.sort_by_key(|(id, _)| *id);
        ids
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("procedures", &self.procedures())
            .finish()
    }
}
