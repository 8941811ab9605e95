//! service
//!
//! Assembles a running node from its configuration.
//!
//! # Architecture
//!
//! ```text
//! ServiceConfig
//!   -> LeadershipToken (if replication is enabled)
//!   -> one MemoryEngine per volume + one for the directory service
//!   -> VolumeRegistry -> PathResolver
//!   -> Services -> Dispatcher
//! ```
//!
//! Engines spawn their commit workers on the current Tokio runtime, so
//! [`Service::build`] must run inside one.

use std::sync::Arc;

use thiserror::Error;

use crate::access::PathResolver;
use crate::core::clock::Clock;
use crate::core::config::{ConfigError, ServiceConfig};
use crate::engine::{DispatchError, Dispatcher, DispatcherBuilder, LeadershipToken, WriteGate};
use crate::ops::{self, Services};
use crate::store::{MemoryEngine, StorageError, VolumeRegistry, VolumeStore};

/// Name of the directory-service engine.
pub const DIRECTORY_ENGINE: &str = "directory";

/// Startup failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("volume '{0}' is declared twice")]
    DuplicateVolume(String),
}

/// A fully wired node.
pub struct Service {
    dispatcher: Dispatcher,
    leadership: Option<LeadershipToken>,
    volumes: Arc<VolumeRegistry>,
    directory: Arc<MemoryEngine>,
}

impl Service {
    /// Build every component described by `config`.
    pub fn build(config: &ServiceConfig, clock: Arc<dyn Clock>) -> Result<Self, ServiceError> {
        config.validate()?;
        let node_id = config.node_id()?;

        let leadership = if config.replication_enabled() {
            Some(LeadershipToken::new(node_id.clone(), config.initial_master()?))
        } else {
            None
        };
        let metadata_gate = match &leadership {
            Some(token) => WriteGate::Replicated(token.clone()),
            None => WriteGate::Unreplicated,
        };
        let directory_gate = if config.directory_replicated() {
            metadata_gate.clone()
        } else {
            WriteGate::Unreplicated
        };

        let now = clock.now_secs();
        let mut registry = VolumeRegistry::new();
        for section in &config.volumes {
            let engine = MemoryEngine::start(section.name.as_str(), metadata_gate.clone())?;
            let volume =
                VolumeStore::bootstrap(&section.name, engine, &section.root_attributes(), now)?;
            if !registry.insert(volume) {
                return Err(ServiceError::DuplicateVolume(section.name.clone()));
            }
        }
        let volumes = Arc::new(registry);

        let directory = MemoryEngine::start(DIRECTORY_ENGINE, directory_gate)?;

        let services = Services {
            metadata_gate,
            resolver: PathResolver::new(Arc::clone(&volumes)),
            access: config.access_policy().build(),
            clock,
            directory: directory.clone(),
        };
        let mut builder = DispatcherBuilder::new();
        ops::register_all(&mut builder, &services)?;

        tracing::info!(
            node = %node_id,
            replicated = leadership.is_some(),
            volumes = volumes.len(),
            policy = services.access.name(),
            "service ready"
        );

        Ok(Self {
            dispatcher: builder.build(),
            leadership,
            volumes,
            directory,
        })
    }

    /// The request router.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The leadership token, when replication is enabled.
    pub fn leadership(&self) -> Option<&LeadershipToken> {
        self.leadership.as_ref()
    }

    pub fn volumes(&self) -> &VolumeRegistry {
        &self.volumes
    }

    /// The directory-service database.
    pub fn directory(&self) -> &Arc<MemoryEngine> {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::config::VolumeSection;
    use crate::core::config::schema::ReplicationSection;
    use crate::core::types::FileId;
    use crate::store::StorageEngine;

    fn config() -> ServiceConfig {
        let mut config = ServiceConfig::starter("mrc-1");
        config.volumes.push(VolumeSection {
            name: "home".into(),
            owner: Some("alice".into()),
            ..Default::default()
        });
        config
    }

    #[tokio::test]
    async fn builds_volumes_and_operations() {
        let service = Service::build(&config(), Arc::new(FixedClock::new(5))).unwrap();
        assert_eq!(service.volumes().names().collect::<Vec<_>>(), vec!["default", "home"]);
        let home = service.volumes().get("home").unwrap();
        let root = home.root().unwrap();
        assert_eq!(root.id, FileId::ROOT);
        assert_eq!(root.owner, "alice");
        assert_eq!(root.times.ctime, 5);
        assert_eq!(service.dispatcher().procedures().len(), 3);
        assert!(service.leadership().is_none());
        assert!(!service.directory().write_gate().is_replicated());
    }

    #[tokio::test]
    async fn replication_gates_volumes() {
        let mut config = config();
        config.replication = ReplicationSection {
            enabled: Some(true),
            master: Some("mrc-2".into()),
        };
        let service = Service::build(&config, Arc::new(FixedClock::new(0))).unwrap();
        let token = service.leadership().unwrap();
        assert!(!token.is_master());

        let gate = service.volumes().get("home").unwrap().write_gate();
        assert!(matches!(gate, WriteGate::Replicated(_)));
        assert!(gate.check_writable().is_err());
        // The directory database is not replicated unless configured.
        assert!(service.directory().write_gate().check_writable().is_ok());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = config();
        config.volumes.push(VolumeSection {
            name: "home".into(),
            ..Default::default()
        });
        assert!(matches!(
            Service::build(&config, Arc::new(FixedClock::new(0))),
            Err(ServiceError::Config(_))
        ));
    }
}
