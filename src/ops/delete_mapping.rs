//! ops::delete_mapping
//!
//! Remove a node's address mapping from the directory service.
//!
//! Deleting a mapping that does not exist succeeds, so retries are safe.

use std::sync::Arc;

use serde::Deserialize;

use super::DELETE_MAPPING;
use crate::core::metadata::ADDRESS_MAPPING_INDEX;
use crate::core::types::{NodeId, ProcedureId};
use crate::engine::{AtomicUpdate, Operation, OperationError, Prepared, RequestContext, Response};
use crate::store::StorageEngine;

/// Request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteMappingArgs {
    pub uuid: NodeId,
}

pub struct DeleteMapping {
    directory: Arc<dyn StorageEngine>,
}

impl DeleteMapping {
    pub fn new(directory: Arc<dyn StorageEngine>) -> Self {
        Self { directory }
    }
}

impl Operation for DeleteMapping {
    fn procedure_id(&self) -> ProcedureId {
        DELETE_MAPPING
    }

    fn name(&self) -> &'static str {
        "delete_mapping"
    }

    fn prepare(&self, ctx: &RequestContext) -> Result<Prepared, OperationError> {
        self.directory.write_gate().check_writable()?;

        let args: DeleteMappingArgs = ctx.decode()?;
        let mut update = AtomicUpdate::new(
            Arc::clone(&self.directory),
            Box::new(|_, _| Ok(Response::Empty)),
        );
        update.add_delete(ADDRESS_MAPPING_INDEX, args.uuid.as_str().as_bytes().to_vec());
        Ok(Prepared::Update(update))
    }
}
