//! metatx - Atomic mutation pipeline for a replicated filesystem metadata service
//!
//! Every metadata-changing request follows one lifecycle: it is routed by
//! procedure id, admitted only on the write master, validated against the
//! caller's permissions and the current namespace, turned into a single
//! atomic batch, committed, and answered through exactly one callback.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, serves requests)
//! - [`service`] - Wires configuration into engines, volumes and operations
//! - [`ops`] - Concrete operations (create directory, address mappings)
//! - [`engine`] - Dispatch → Gate → Validate → Batch → Commit → Reply lifecycle
//! - [`access`] - Path resolution and permission policy
//! - [`store`] - Storage engine contract and the in-memory engine
//! - [`core`] - Domain types, record schemas, clock, and configuration
//!
//! # Correctness Invariants
//!
//! metatx maintains the following invariants:
//!
//! 1. Only the write master admits mutations; others redirect
//! 2. A request's effects are committed all together or not at all
//! 3. Every request receives exactly one reply
//! 4. Operations never write storage except through an atomic update

pub mod access;
pub mod cli;
pub mod core;
pub mod engine;
pub mod ops;
pub mod service;
pub mod store;
