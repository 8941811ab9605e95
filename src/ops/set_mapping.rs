//! ops::set_mapping
//!
//! Register or update a node's address mapping in the directory service.
//!
//! Updates are optimistic: the client sends the version it last read (0
//! for a new mapping). A stale version fails with `EAGAIN` before anything
//! is built, and the stored value read here is a commit-time precondition,
//! so a concurrent update that lands in between fails the batch instead of
//! being overwritten.

use std::sync::Arc;

use serde::Deserialize;

use super::SET_MAPPING;
use crate::core::metadata::{
    parse_address_mapping, AddressMapping, ADDRESS_MAPPING_INDEX, DEFAULT_MAPPING_TTL_S,
    MATCH_ANY_NETWORK,
};
use crate::core::types::{Errno, NodeId, ProcedureId};
use crate::engine::{AtomicUpdate, Operation, OperationError, Prepared, RequestContext, Response};
use crate::store::{StorageEngine, StorageError};

fn default_match_network() -> String {
    MATCH_ANY_NETWORK.to_string()
}

fn default_ttl() -> u32 {
    DEFAULT_MAPPING_TTL_S
}

/// Request payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetMappingArgs {
    pub uuid: NodeId,
    /// The version the client last read; 0 for a new mapping.
    pub version: u64,
    pub protocol: String,
    pub address: String,
    pub port: u16,
    #[serde(default = "default_match_network")]
    pub match_network: String,
    #[serde(default = "default_ttl")]
    pub ttl_s: u32,
}

pub struct SetMapping {
    directory: Arc<dyn StorageEngine>,
}

impl SetMapping {
    pub fn new(directory: Arc<dyn StorageEngine>) -> Self {
        Self { directory }
    }
}

impl Operation for SetMapping {
    fn procedure_id(&self) -> ProcedureId {
        SET_MAPPING
    }

    fn name(&self) -> &'static str {
        "set_mapping"
    }

    fn prepare(&self, ctx: &RequestContext) -> Result<Prepared, OperationError> {
        self.directory.write_gate().check_writable()?;

        let args: SetMappingArgs = ctx.decode()?;
        let key = args.uuid.as_str().as_bytes().to_vec();

        let current = self.directory.lookup(ADDRESS_MAPPING_INDEX, &key)?;
        let stored_version = match &current {
            Some(bytes) => {
                parse_address_mapping(bytes)
                    .map_err(|e| StorageError::corrupt(ADDRESS_MAPPING_INDEX, &key, e))?
                    .version
            }
            None => 0,
        };

        if args.version != stored_version {
            return Err(OperationError::posix(
                Errno::Eagain,
                format!(
                    "version mismatch for '{}': request has {}, current is {}",
                    args.uuid, args.version, stored_version
                ),
            ));
        }

        let new_version = stored_version + 1;
        let mapping = AddressMapping {
            match_network: args.match_network,
            ttl_s: args.ttl_s,
            ..AddressMapping::new(args.uuid, new_version, args.protocol, args.address, args.port)
        };

        let mut update = AtomicUpdate::new(
            Arc::clone(&self.directory),
            Box::new(move |_, _| Ok(Response::MappingSet { new_version })),
        );
        match current {
            Some(bytes) => update.expect_value(ADDRESS_MAPPING_INDEX, key.clone(), bytes),
            None => update.expect_absent(ADDRESS_MAPPING_INDEX, key.clone()),
        }
        update.add_put(ADDRESS_MAPPING_INDEX, key, mapping.encode()?);

        Ok(Prepared::Update(update))
    }
}
