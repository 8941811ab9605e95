//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ProcedureId`] - Identifies an operation type for dispatch
//! - [`IndexId`] - A named key space inside a storage engine
//! - [`FileId`] - Volume-local file or directory identifier
//! - [`NodeId`] - Validated replica identity (UUID-like string)
//! - [`Errno`] - POSIX error numbers surfaced to clients
//! - [`UserDetails`] - Authenticated caller identity
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use metatx::core::types::{FileId, NodeId, ProcedureId};
//!
//! let node = NodeId::new("mrc-1").unwrap();
//! assert_eq!(node.as_str(), "mrc-1");
//! assert!(NodeId::new("").is_err());
//!
//! assert_eq!(FileId::ROOT.get(), 1);
//! assert_eq!(ProcedureId::new(10).get(), 10);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid volume name: {0}")]
    InvalidVolumeName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Integer identifying an operation type for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcedureId(u32);

impl ProcedureId {
    /// Create a procedure id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named key space within a storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexId(u8);

impl IndexId {
    /// Create an index id.
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "idx{}", self.0)
    }
}

/// Volume-local identifier of a file or directory.
///
/// Id 0 is reserved as the parent of a volume's root directory; the root
/// itself is always [`FileId::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    /// Parent id of every volume root.
    pub const NONE: FileId = FileId(0);

    /// Id of every volume root directory.
    pub const ROOT: FileId = FileId(1);

    /// Create a file id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian encoding, used as a key prefix so ids sort numerically.
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated replica identity.
///
/// Node ids are compared byte-for-byte by the leadership gate, so they are
/// not normalized: `MRC-1` and `mrc-1` are different nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    /// Create a new validated node id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidNodeId` if the id is empty or contains
    /// whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidNodeId("node id cannot be empty".into()));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidNodeId(format!(
                "node id '{}' cannot contain whitespace or control characters",
                id.escape_debug()
            )));
        }
        Ok(Self(id))
    }

    /// Get the node id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// POSIX error numbers reported to clients for validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Errno {
    /// Operation not permitted.
    Eperm,
    /// No such file or directory.
    Enoent,
    /// Resource temporarily unavailable (stale version).
    Eagain,
    /// Permission denied.
    Eacces,
    /// File exists.
    Eexist,
    /// Not a directory.
    Enotdir,
    /// Invalid argument.
    Einval,
}

impl Errno {
    /// The symbolic POSIX name.
    pub fn as_str(self) -> &'static str {
        match self {
            Errno::Eperm => "EPERM",
            Errno::Enoent => "ENOENT",
            Errno::Eagain => "EAGAIN",
            Errno::Eacces => "EACCES",
            Errno::Eexist => "EEXIST",
            Errno::Enotdir => "ENOTDIR",
            Errno::Einval => "EINVAL",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated identity of the caller, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// User id.
    pub user_id: String,
    /// Group ids; the first one is the primary group.
    pub group_ids: Vec<String>,
    /// Superusers bypass mode-bit checks.
    #[serde(default)]
    pub super_user: bool,
}

impl UserDetails {
    /// Create details for a regular user.
    pub fn new(user_id: impl Into<String>, group_ids: Vec<String>) -> Self {
        Self {
            user_id: user_id.into(),
            group_ids,
            super_user: false,
        }
    }

    /// Create details for the superuser `root`.
    pub fn root() -> Self {
        Self {
            user_id: "root".to_string(),
            group_ids: vec!["root".to_string()],
            super_user: true,
        }
    }

    /// The primary group, if any groups were supplied.
    pub fn primary_group(&self) -> Option<&str> {
        self.group_ids.first().map(String::as_str)
    }

    /// Check group membership.
    pub fn in_group(&self, group: &str) -> bool {
        self.group_ids.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod node_id {
        use super::*;

        #[test]
        fn valid_ids() {
            assert!(NodeId::new("mrc-1").is_ok());
            assert!(NodeId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").is_ok());
        }

        #[test]
        fn empty_rejected() {
            assert!(NodeId::new("").is_err());
        }

        #[test]
        fn whitespace_rejected() {
            assert!(NodeId::new("mrc 1").is_err());
            assert!(NodeId::new("mrc-1\n").is_err());
        }

        #[test]
        fn comparison_is_exact() {
            assert_ne!(NodeId::new("MRC-1").unwrap(), NodeId::new("mrc-1").unwrap());
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<NodeId, _> = serde_json::from_str("\"\"");
            assert!(result.is_err());
        }
    }

    mod file_id {
        use super::*;

        #[test]
        fn be_bytes_sort_numerically() {
            assert!(FileId::new(2).to_be_bytes() < FileId::new(256).to_be_bytes());
        }

        #[test]
        fn reserved_ids() {
            assert_eq!(FileId::NONE.get(), 0);
            assert_eq!(FileId::ROOT.get(), 1);
        }
    }

    mod errno {
        use super::*;

        #[test]
        fn display_is_symbolic() {
            assert_eq!(Errno::Eexist.to_string(), "EEXIST");
            assert_eq!(Errno::Eacces.to_string(), "EACCES");
        }

        #[test]
        fn serde_uses_symbolic_name() {
            let json = serde_json::to_string(&Errno::Enotdir).unwrap();
            assert_eq!(json, "\"ENOTDIR\"");
        }
    }

    mod user_details {
        use super::*;

        #[test]
        fn primary_group_is_first() {
            let user = UserDetails::new("alice", vec!["staff".into(), "wheel".into()]);
            assert_eq!(user.primary_group(), Some("staff"));
            assert!(user.in_group("wheel"));
            assert!(!user.in_group("root"));
            assert!(!user.super_user);
        }

        #[test]
        fn super_user_defaults_false_in_json() {
            let user: UserDetails =
                serde_json::from_str(r#"{"user_id":"bob","group_ids":["users"]}"#).unwrap();
            assert!(!user.super_user);
        }
    }
}
