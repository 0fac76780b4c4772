//! Resource sync providers.
//!
//! This module contains the [`ResourceSync`] trait and the bundled
//! implementation:
//!
//! - [`InMemoryResources`] - scripted in-process backend
//!
//! # Architecture
//!
//! The data-access services that actually talk to the mail server (folder
//! hierarchy, per-folder messages, contacts, notes, calendar, tasks) live
//! outside this crate. They plug into the coordinator through
//! [`ResourceSync`], one method per resource operation, each keyed by account.

mod memory;
mod traits;

pub use memory::{Behavior, InMemoryResources, ResourceCall};
pub use traits::{ResourceError, ResourceSync, Result};

#[cfg(test)]
pub use traits::MockResourceSync;
