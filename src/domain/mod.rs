//! Domain layer types for the sync coordinator.
//!
//! This module contains the identifiers, folder descriptors, resource
//! categories and per-account status shared by the providers and services.

mod folder;
mod resource;
mod sync_status;
mod types;

pub use folder::{mail_bearing, Folder, FolderType, DEFAULT_MAIL_FOLDER_TYPES};
pub use resource::AuxResource;
pub use sync_status::{AccountSyncStatus, SyncStatusKind};
pub use types::{AccountId, FolderId};
