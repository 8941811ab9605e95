//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! [node]
//! uuid = "mrc-1"
//!
//! [replication]
//! enabled = true
//! master = "mrc-1"
//!
//! [directory]
//! replicated = true
//!
//! [access]
//! policy = "posix"
//!
//! [[volumes]]
//! name = "home"
//! owner = "root"
//! group = "root"
//! mode = 0o755
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing: node ids and volume names must be
//! well formed, volume names unique, and modes within `0o7777`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::access::PolicyKind;
use crate::core::path::validate_volume_name;
use crate::core::types::NodeId;
use crate::store::volume::RootAttributes;

/// Node id used when none is configured.
pub const DEFAULT_NODE_ID: &str = "local";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub node: NodeSection,
    pub replication: ReplicationSection,
    pub directory: DirectorySection,
    pub access: AccessSection,
    pub volumes: Vec<VolumeSection>,
}

/// `[node]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSection {
    /// This node's identity, compared against the advertised master.
    pub uuid: Option<String>,
}

/// `[replication]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReplicationSection {
    /// Whether volume metadata is replicated (and writes gated).
    pub enabled: Option<bool>,
    /// Initially advertised write master. Unset means unknown: every write
    /// is redirected until a master is advertised.
    pub master: Option<String>,
}

/// `[directory]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorySection {
    /// Whether the directory-service database follows the write master.
    pub replicated: Option<bool>,
}

/// `[access]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AccessSection {
    pub policy: Option<PolicyKind>,
}

/// `[[volumes]]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VolumeSection {
    pub name: String,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
}

impl VolumeSection {
    /// Root directory attributes, with defaults filled in.
    pub fn root_attributes(&self) -> RootAttributes {
        let defaults = RootAttributes::default();
        RootAttributes {
            owner: self.owner.clone().unwrap_or(defaults.owner),
            group: self.group.clone().unwrap_or(defaults.group),
            mode: self.mode.unwrap_or(defaults.mode),
        }
    }
}

impl ServiceConfig {
    /// A starting configuration for `config init`.
    pub fn starter(node_id: &str) -> Self {
        Self {
            node: NodeSection {
                uuid: Some(node_id.to_string()),
            },
            access: AccessSection {
                policy: Some(PolicyKind::Posix),
            },
            volumes: vec![VolumeSection {
                name: "default".to_string(),
                mode: Some(0o755),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.node_id()?;
        self.initial_master()?;

        if !self.replication_enabled() && self.replication.master.is_some() {
            return Err(ConfigError::InvalidValue(
                "replication.master is set but replication is disabled".to_string(),
            ));
        }
        if self.directory_replicated() && !self.replication_enabled() {
            return Err(ConfigError::InvalidValue(
                "directory.replicated requires replication.enabled".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for volume in &self.volumes {
            validate_volume_name(&volume.name).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid volume name: {}", e))
            })?;
            if !seen.insert(volume.name.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "volume '{}' is declared twice",
                    volume.name
                )));
            }
            if let Some(mode) = volume.mode {
                if mode > 0o7777 {
                    return Err(ConfigError::InvalidValue(format!(
                        "volume '{}': mode {:o} exceeds 7777",
                        volume.name, mode
                    )));
                }
            }
        }

        Ok(())
    }

    /// This node's id.
    pub fn node_id(&self) -> Result<NodeId, ConfigError> {
        let raw = self.node.uuid.as_deref().unwrap_or(DEFAULT_NODE_ID);
        NodeId::new(raw)
            .map_err(|e| ConfigError::InvalidValue(format!("invalid node.uuid: {}", e)))
    }

    /// The master advertised at startup, if configured.
    pub fn initial_master(&self) -> Result<Option<NodeId>, ConfigError> {
        self.replication
            .master
            .as_deref()
            .map(|m| {
                NodeId::new(m).map_err(|e| {
                    ConfigError::InvalidValue(format!("invalid replication.master: {}", e))
                })
            })
            .transpose()
    }

    /// Whether volume metadata writes are gated on leadership.
    pub fn replication_enabled(&self) -> bool {
        self.replication.enabled.unwrap_or(false)
    }

    /// Whether directory-service writes are gated on leadership.
    pub fn directory_replicated(&self) -> bool {
        self.directory.replicated.unwrap_or(false)
    }

    /// The configured access policy.
    pub fn access_policy(&self) -> PolicyKind {
        self.access.policy.unwrap_or_default()
    }
}
