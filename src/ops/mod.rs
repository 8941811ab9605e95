//! ops
//!
//! Request handlers, one per procedure id.
//!
//! # Procedures
//!
//! | Id | Operation | Store |
//! |---|---|---|
//! | 2 | [`SetMapping`] | directory service |
//! | 3 | [`DeleteMapping`] | directory service |
//! | 10 | [`CreateDirectory`] | volume |
//!
//! Operations never commit directly: they build an
//! [`AtomicUpdate`](crate::engine::AtomicUpdate) and return it from
//! `prepare`, and the engine's pipeline does the rest.

pub mod create_dir;
pub mod delete_mapping;
pub mod set_mapping;

pub use create_dir::{CreateDirectory, CreateDirectoryArgs};
pub use delete_mapping::{DeleteMapping, DeleteMappingArgs};
pub use set_mapping::{SetMapping, SetMappingArgs};

use std::sync::Arc;

use crate::access::{AccessManager, PathResolver};
use crate::core::clock::Clock;
use crate::core::types::ProcedureId;
use crate::engine::{DispatchError, DispatcherBuilder, WriteGate};
use crate::store::StorageEngine;

/// Procedure id of [`SetMapping`].
pub const SET_MAPPING: ProcedureId = ProcedureId::new(2);

/// Procedure id of [`DeleteMapping`].
pub const DELETE_MAPPING: ProcedureId = ProcedureId::new(3);

/// Procedure id of [`CreateDirectory`].
pub const CREATE_DIRECTORY: ProcedureId = ProcedureId::new(10);

/// Shared collaborators handed to operations at registration.
#[derive(Clone)]
pub struct Services {
    /// Admission for writes to volume metadata.
    pub metadata_gate: WriteGate,
    pub resolver: PathResolver,
    pub access: Arc<dyn AccessManager>,
    pub clock: Arc<dyn Clock>,
    /// The directory-service database.
    pub directory: Arc<dyn StorageEngine>,
}

/// Register every operation.
pub fn register_all(
    builder: &mut DispatcherBuilder,
    services: &Services,
) -> Result<(), DispatchError> {
    builder
        .register(Arc::new(SetMapping::new(Arc::clone(&services.directory))))?
        .register(Arc::new(DeleteMapping::new(Arc::clone(&services.directory))))?
        .register(Arc::new(CreateDirectory::new(
            services.metadata_gate.clone(),
            services.resolver.clone(),
            Arc::clone(&services.access),
            Arc::clone(&services.clock),
        )))?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the operation tests.

    use std::sync::Arc;

    use crate::access::{PathResolver, PolicyKind};
    use crate::core::clock::FixedClock;
    use crate::core::types::{NodeId, ProcedureId, UserDetails};
    use crate::engine::{
        Callback, Dispatcher, DispatcherBuilder, LeadershipToken, Reply, RequestMetadata,
        WriteGate,
    };
    use crate::store::volume::RootAttributes;
    use crate::store::{MemoryEngine, VolumeRegistry, VolumeStore};

    use super::{register_all, Services};

    pub struct Fixture {
        pub dispatcher: Dispatcher,
        pub volume_engine: Arc<MemoryEngine>,
        pub directory_engine: Arc<MemoryEngine>,
        pub token: LeadershipToken,
        pub clock: Arc<FixedClock>,
    }

    /// A replicated node "local" that is currently master, serving volume
    /// "vol" (root owned by root, mode 0755) with the POSIX policy.
    pub fn fixture() -> Fixture {
        let local = NodeId::new("local").unwrap();
        let token = LeadershipToken::new(local.clone(), Some(local));
        let gate = WriteGate::Replicated(token.clone());

        let volume_engine = MemoryEngine::start("vol", gate.clone()).unwrap();
        let directory_engine = MemoryEngine::start("dir", gate.clone()).unwrap();
        let volume =
            VolumeStore::bootstrap("vol", volume_engine.clone(), &RootAttributes::default(), 0)
                .unwrap();

        let mut registry = VolumeRegistry::new();
        registry.insert(volume);

        let clock = Arc::new(FixedClock::new(1000));
        let services = Services {
            metadata_gate: gate,
            resolver: PathResolver::new(Arc::new(registry)),
            access: PolicyKind::Posix.build(),
            clock: clock.clone(),
            directory: directory_engine.clone(),
        };

        let mut builder = DispatcherBuilder::new();
        register_all(&mut builder, &services).unwrap();

        Fixture {
            dispatcher: builder.build(),
            volume_engine,
            directory_engine,
            token,
            clock,
        }
    }

    impl Fixture {
        pub async fn call(
            &self,
            procedure: ProcedureId,
            user: UserDetails,
            payload: serde_json::Value,
        ) -> Reply {
            let (callback, rx) = Callback::channel();
            self.dispatcher
                .dispatch(procedure, payload, user, RequestMetadata::new(), callback);
            rx.await.expect("callback fired")
        }

        pub fn lose_mastership(&self) {
            self.token
                .advertise_master(Some(NodeId::new("other").unwrap()));
        }
    }
}
