//! access::policy
//!
//! Authorization policies.
//!
//! # Policies
//!
//! | Policy | Behavior |
//! |---|---|
//! | [`PosixAccessPolicy`] | owner/group/other mode bits; the superuser bypasses all checks |
//! | [`AllowAll`] | every access is granted |
//!
//! Denials are reported as `EACCES`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::resolver::Resolution;
use crate::core::metadata::FileRecord;
use crate::core::types::{Errno, FileId, UserDetails};
use crate::engine::OperationError;

/// The kind of access being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    /// Traverse a directory.
    Search,
}

impl AccessMode {
    /// The `rwx` bit this mode requires, in the "other" position.
    fn bit(self) -> u32 {
        match self {
            AccessMode::Read => 0o4,
            AccessMode::Write => 0o2,
            AccessMode::Search => 0o1,
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
            AccessMode::Search => "search",
        })
    }
}

/// Authorization decisions for path-based operations.
pub trait AccessManager: Send + Sync {
    /// Short policy name for logs.
    fn name(&self) -> &'static str;

    /// Check `mode` access to `file`, whose parent directory is `parent_id`.
    fn check_permission(
        &self,
        mode: AccessMode,
        file: &FileRecord,
        parent_id: FileId,
        user: &UserDetails,
    ) -> Result<(), OperationError>;

    /// Check search access on every directory of the resolved prefix.
    fn check_search_permission(
        &self,
        resolution: &Resolution,
        user: &UserDetails,
    ) -> Result<(), OperationError> {
        for dir in resolution.prefix() {
            self.check_permission(AccessMode::Search, dir, dir.parent_id, user)?;
        }
        Ok(())
    }
}

/// Which policy a node enforces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Posix,
    AllowAll,
}

impl PolicyKind {
    /// Instantiate the policy.
    pub fn build(self) -> Arc<dyn AccessManager> {
        match self {
            PolicyKind::Posix => Arc::new(PosixAccessPolicy),
            PolicyKind::AllowAll => Arc::new(AllowAll),
        }
    }
}

/// POSIX permission bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixAccessPolicy;

impl AccessManager for PosixAccessPolicy {
    fn name(&self) -> &'static str {
        "posix"
    }

    fn check_permission(
        &self,
        mode: AccessMode,
        file: &FileRecord,
        _parent_id: FileId,
        user: &UserDetails,
    ) -> Result<(), OperationError> {
        if user.super_user {
            return Ok(());
        }

        let shift = if user.user_id == file.owner {
            6
        } else if user.in_group(&file.owning_group) {
            3
        } else {
            0
        };

        if (file.mode >> shift) & mode.bit() != 0 {
            Ok(())
        } else {
            Err(OperationError::posix(
                Errno::Eacces,
                format!(
                    "{} access denied on '{}' (id {}, mode {:o}) for user '{}'",
                    mode, file.name, file.id, file.mode, user.user_id
                ),
            ))
        }
    }
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessManager for AllowAll {
    fn name(&self) -> &'static str {
        "allow_all"
    }

    fn check_permission(
        &self,
        _mode: AccessMode,
        _file: &FileRecord,
        _parent_id: FileId,
        _user: &UserDetails,
    ) -> Result<(), OperationError> {
        Ok(())
    }
}
