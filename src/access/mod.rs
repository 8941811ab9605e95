//! access
//!
//! Path resolution and authorization for path-based mutations.
//!
//! # Modules
//!
//! - [`resolver`] - Walks a path to its parent directory and target
//! - [`policy`] - Mode-bit and allow-all authorization policies
//!
//! # Check Order
//!
//! Creation-style operations run their checks in this order, and the first
//! failure wins:
//!
//! 1. Resolve the path (`ENOENT`, `ENOTDIR`)
//! 2. The path must have a parent (`EEXIST` for the volume root)
//! 3. Search permission on every directory of the prefix (`EACCES`)
//! 4. Write permission on the parent (`EACCES`)
//! 5. The target must not exist (`EEXIST`)
//!
//! A caller that lacks permission on the parent therefore learns nothing
//! about whether the target exists.

pub mod policy;
pub mod resolver;

pub use policy::{AccessManager, AccessMode, AllowAll, PolicyKind, PosixAccessPolicy};
pub use resolver::{resolve_in, PathResolver, Resolution};
