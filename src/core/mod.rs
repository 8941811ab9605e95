//! core
//!
//! Core domain types, schemas, and configuration for metatx.
//!
//! # Modules
//!
//! - [`types`] - Strong types: NodeId, FileId, IndexId, Errno, etc.
//! - [`path`] - Validated volume paths
//! - [`metadata`] - Stored record schemas and key layouts
//! - [`clock`] - Time source for POSIX timestamps
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod clock;
pub mod config;
pub mod metadata;
pub mod path;
pub mod types;
