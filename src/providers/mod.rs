//! External collaborator seams.
//!
//! This module contains the traits the coordinator consumes and simple
//! implementations of them:
//!
//! - [`resources`] - account-scoped resource sync operations
//! - [`connectivity`] - network availability

pub mod connectivity;
pub mod resources;

pub use connectivity::{Connectivity, StaticConnectivity};
pub use resources::{ResourceError, ResourceSync};
