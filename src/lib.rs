//! heap-sync - Per-account background mail sync coordination
//!
//! This crate decides when each configured mailbox syncs, runs the sync as a
//! structured fan-out of deadline-bounded resource operations, and exposes
//! the resulting state as flags the UI can observe.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;

pub use services::SyncCoordinator;
