//! Per-account sync status.

use tokio::time::Instant;

use serde::{Deserialize, Serialize};

/// Where one account stands with respect to automatic sync.
///
/// `Synced` is terminal: the eligibility gate never starts another automatic
/// pass until the account is reset. It does not distinguish a clean pass from
/// one that ran out of time or hit an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountSyncStatus {
    /// No pass has run, or the last one was cancelled.
    #[default]
    Idle,
    /// A job is live for the account.
    Syncing,
    /// A pass reached a terminal outcome.
    Synced,
    /// A pass failed under the cool-down policy; retry allowed after `retry_at`.
    Failed {
        /// Earliest instant the gate lets a new pass start.
        retry_at: Instant,
    },
}

impl AccountSyncStatus {
    /// Returns true for the terminal `Synced` state.
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Returns true while the account is cooling down after a failure.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        matches!(self, Self::Failed { retry_at } if now < *retry_at)
    }

    /// Returns a serializable label for this status.
    pub fn kind(&self) -> SyncStatusKind {
        match self {
            Self::Idle => SyncStatusKind::Idle,
            Self::Syncing => SyncStatusKind::Syncing,
            Self::Synced => SyncStatusKind::Synced,
            Self::Failed { .. } => SyncStatusKind::Failed,
        }
    }
}

/// Status label without the instant payload, carried by `SyncEvent::Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatusKind {
    /// Eligible to start.
    Idle,
    /// A job is live.
    Syncing,
    /// Terminal until reset.
    Synced,
    /// Cooling down after a failed pass.
    Failed,
}
