//! access::resolver
//!
//! Resolves a volume path to the chain of directory records leading to it.
//!
//! # Invariants
//!
//! - Every record in the prefix is a directory
//! - The prefix starts at the volume root and ends at the parent of the
//!   target
//! - A volume-root path has no parent and an empty prefix

use std::sync::Arc;

use crate::core::metadata::FileRecord;
use crate::core::path::MetaPath;
use crate::core::types::{Errno, FileId};
use crate::engine::OperationError;
use crate::store::{VolumeRegistry, VolumeStore};

/// Result of walking a path.
#[derive(Debug, Clone)]
pub struct Resolution {
    path: MetaPath,
    prefix: Vec<FileRecord>,
    target: Option<FileRecord>,
}

impl Resolution {
    /// The resolved path.
    pub fn path(&self) -> &MetaPath {
        &self.path
    }

    /// Directories from the volume root down to the parent, inclusive.
    pub fn prefix(&self) -> &[FileRecord] {
        &self.prefix
    }

    /// The directory containing the target, or `None` for the volume root.
    pub fn parent(&self) -> Option<&FileRecord> {
        self.prefix.last()
    }

    /// The id of the parent's own parent, needed to address the parent's
    /// record. `None` for the volume root.
    pub fn parents_parent_id(&self) -> Option<FileId> {
        self.parent().map(|p| p.parent_id)
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.path.last()
    }

    /// The target record, if it exists.
    pub fn target(&self) -> Option<&FileRecord> {
        self.target.as_ref()
    }

    /// Fail with `EEXIST` if the target exists.
    pub fn check_if_file_exists_already(&self) -> Result<(), OperationError> {
        match &self.target {
            Some(_) => Err(OperationError::posix(
                Errno::Eexist,
                format!("file or directory '{}' exists already", self.path),
            )),
            None => Ok(()),
        }
    }
}

/// Walks paths against the registered volumes.
#[derive(Debug, Clone)]
pub struct PathResolver {
    volumes: Arc<VolumeRegistry>,
}

impl PathResolver {
    pub fn new(volumes: Arc<VolumeRegistry>) -> Self {
        Self { volumes }
    }

    /// Look up a volume by name.
    ///
    /// # Errors
    ///
    /// `ENOENT` if no such volume is served here.
    pub fn volume(&self, name: &str) -> Result<&Arc<VolumeStore>, OperationError> {
        self.volumes.get(name).ok_or_else(|| {
            OperationError::posix(Errno::Enoent, format!("volume '{}' does not exist", name))
        })
    }

    /// Resolve `path` within its volume.
    ///
    /// # Errors
    ///
    /// - `ENOENT` for an unknown volume or a missing intermediate directory
    /// - `ENOTDIR` if an intermediate component is not a directory
    /// - `Storage` if a record cannot be read
    pub fn resolve(&self, path: &MetaPath) -> Result<Resolution, OperationError> {
        let volume = self.volume(path.volume())?;
        resolve_in(volume, path)
    }
}

/// Resolve `path` within an already selected volume.
pub fn resolve_in(volume: &VolumeStore, path: &MetaPath) -> Result<Resolution, OperationError> {
    let root = volume.root()?;
    if path.is_volume_root() {
        return Ok(Resolution {
            path: path.clone(),
            prefix: Vec::new(),
            target: Some(root),
        });
    }

    let mut prefix = vec![root];
    for (depth, component) in path.parent_components().iter().enumerate() {
        let current = &prefix[prefix.len() - 1];
        let child = volume.lookup_file(current.id, component)?.ok_or_else(|| {
            OperationError::posix(
                Errno::Enoent,
                format!(
                    "path component '{}' of '{}' does not exist",
                    path.components()[..=depth].join("/"),
                    path
                ),
            )
        })?;
        if !child.is_directory() {
            return Err(OperationError::posix(
                Errno::Enotdir,
                format!(
                    "path component '{}' of '{}' is not a directory",
                    path.components()[..=depth].join("/"),
                    path
                ),
            ));
        }
        prefix.push(child);
    }

    let parent_id = prefix[prefix.len() - 1].id;
    let target = volume.lookup_file(parent_id, path.last())?;

    Ok(Resolution {
        path: path.clone(),
        prefix,
        target,
    })
}
