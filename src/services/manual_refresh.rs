//! User-triggered refresh.
//!
//! A manual refresh runs the folder and message steps of a pass for one
//! account regardless of whether the account already reached `Synced`. It
//! lives on a [`ScreenScope`] owned by the requesting screen rather than on
//! the coordinator's process-wide scope: closing the screen cancels the
//! refresh and leaves background jobs alone.

use std::sync::Arc;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::notice_service::Notice;
use super::pipeline::{PassReport, PipelineError};
use super::sync_coordinator::SyncCoordinator;
use crate::domain::AccountId;

/// Cancellation scope tied to a screen's visible lifetime.
///
/// Dropping the scope cancels every refresh started on it.
#[derive(Debug, Default)]
pub struct ScreenScope {
    token: CancellationToken,
}

impl ScreenScope {
    /// Creates an open scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token that is cancelled when the scope closes.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Closes the scope, cancelling its refreshes.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Returns true once the scope has been closed.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ScreenScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// How a manual refresh ended.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Folder and message steps ran to completion.
    Completed(PassReport),
    /// Refused before any resource call: no network.
    NoNetwork,
    /// The folder list could not be fetched.
    Failed(PipelineError),
    /// The manual deadline cut the refresh short.
    DeadlineExceeded,
    /// The screen scope closed first.
    Cancelled,
}

impl RefreshOutcome {
    /// Returns true for [`RefreshOutcome::Completed`].
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

impl SyncCoordinator {
    /// Refreshes one account's folders and messages on behalf of a screen.
    ///
    /// Bypasses the `Synced` check but not the connectivity check. Waits for
    /// every per-folder sub-task, bounded by the manual deadline, and posts a
    /// notice for every outcome except cancellation. Does not change the
    /// account's background status.
    pub async fn manual_refresh(&self, account_id: AccountId, scope: &ScreenScope) -> RefreshOutcome {
        self.refresh_until_cancelled(account_id, scope.token()).await
    }

    /// Spawns [`manual_refresh`](Self::manual_refresh) as its own task.
    pub fn spawn_manual_refresh(
        self: &Arc<Self>,
        account_id: AccountId,
        scope: &ScreenScope,
    ) -> JoinHandle<RefreshOutcome> {
        let coordinator = Arc::clone(self);
        let token = scope.token();
        tokio::spawn(async move { coordinator.refresh_until_cancelled(account_id, token).await })
    }

    async fn refresh_until_cancelled(
        &self,
        account_id: AccountId,
        token: CancellationToken,
    ) -> RefreshOutcome {
        if token.is_cancelled() {
            return RefreshOutcome::Cancelled;
        }

        if !self.connectivity.is_available() {
            tracing::info!(%account_id, "Manual refresh refused: no network");
            self.set_no_network(account_id, true);
            self.post(Notice::no_network(account_id));
            return RefreshOutcome::NoNetwork;
        }
        self.set_no_network(account_id, false);

        tracing::info!(%account_id, "Manual refresh started");

        let pipeline = self.pipeline.clone();
        let deadline = self.settings.manual_deadline;
        let mut work = JoinSet::new();
        work.spawn(async move {
            tokio::time::timeout(deadline, pipeline.refresh_folders(account_id)).await
        });

        let outcome = tokio::select! {
            _ = token.cancelled() => RefreshOutcome::Cancelled,
            joined = work.join_next() => match joined {
                Some(Ok(Ok(Ok(report)))) => RefreshOutcome::Completed(report),
                Some(Ok(Ok(Err(e)))) => RefreshOutcome::Failed(e),
                Some(Ok(Err(_))) => RefreshOutcome::DeadlineExceeded,
                Some(Err(e)) if e.is_panic() => {
                    RefreshOutcome::Failed(PipelineError::Panicked(e.to_string()))
                }
                Some(Err(_)) | None => RefreshOutcome::Cancelled,
            },
        };

        match &outcome {
            RefreshOutcome::Completed(report) => {
                tracing::info!(
                    %account_id,
                    folders = report.folders_found,
                    failures = report.failures(),
                    "Manual refresh completed"
                );
                self.post(Notice::refresh_complete(account_id, report.folders_found));
            }
            RefreshOutcome::Failed(e) => {
                tracing::error!(%account_id, error = %e, "Manual refresh failed");
                self.post(Notice::refresh_failed(account_id, &e.to_string()));
            }
            RefreshOutcome::DeadlineExceeded => {
                tracing::warn!(%account_id, "Manual refresh hit its deadline");
                self.post(Notice::refresh_timed_out(account_id));
            }
            RefreshOutcome::Cancelled => {
                tracing::debug!(%account_id, "Manual refresh cancelled");
            }
            RefreshOutcome::NoNetwork => {}
        }

        outcome
    }

    fn post(&self, notice: Notice) {
        let category = notice.category;
        if let Err(e) = self.notices.notify(notice) {
            tracing::debug!(?category, error = %e, "Notice dropped");
        }
    }
}
