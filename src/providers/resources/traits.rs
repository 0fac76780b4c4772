//! Resource sync trait definition.
//!
//! This module defines the [`ResourceSync`] trait which abstracts over the
//! per-resource data-access services (folders, messages, contacts, notes,
//! calendar, tasks). Every operation is scoped to one account, may fail, and
//! may take arbitrarily long; the sync pipeline bounds each call with its own
//! deadline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AccountId, Folder, FolderId};

/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors that can occur during resource sync operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected or failed the request.
    #[error("server error: {0}")]
    Server(String),

    /// Requested folder or account was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Local persistence failed while applying server data.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Account-scoped sync operations consumed by the coordinator.
///
/// Implementations persist what they fetch; the coordinator only cares about
/// success or failure, plus the folder list needed to plan message sync.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceSync: Send + Sync {
    /// Refreshes the folder hierarchy and returns the current folder list.
    async fn sync_folders(&self, account_id: AccountId) -> Result<Vec<Folder>>;

    /// Pulls new and changed messages for one folder.
    async fn sync_messages(&self, account_id: AccountId, folder_id: &FolderId) -> Result<()>;

    /// Downloads bodies of the `limit` most recent messages in the primary inbox.
    async fn prefetch_bodies(&self, account_id: AccountId, limit: usize) -> Result<()>;

    /// Syncs the personal address book.
    async fn sync_contacts(&self, account_id: AccountId) -> Result<()>;

    /// Syncs the organisation directory (global address list).
    async fn sync_directory(&self, account_id: AccountId) -> Result<()>;

    /// Syncs notes.
    async fn sync_notes(&self, account_id: AccountId) -> Result<()>;

    /// Syncs calendar events.
    async fn sync_calendar(&self, account_id: AccountId) -> Result<()>;

    /// Syncs tasks.
    async fn sync_tasks(&self, account_id: AccountId) -> Result<()>;

    /// Persists the time of the last completed pass.
    async fn record_last_sync(&self, account_id: AccountId, at: DateTime<Utc>) -> Result<()>;
}
