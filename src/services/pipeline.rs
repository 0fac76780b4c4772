//! Resource fan-out pipeline.
//!
//! One account's sync pass, step by step:
//!
//! 1. sync the folder list (sequential, nothing else starts before it returns)
//! 2. settle delay
//! 3. pick mail-bearing folders by type code
//! 4. one concurrent message sync per mail folder, each with its own deadline
//! 5. best-effort body prefetch for the primary inbox
//! 6. one concurrent sub-task per auxiliary resource, each with its own deadline
//! 7. record the last-sync timestamp
//!
//! Sub-tasks in steps 4 and 6 run in a [`JoinSet`]: a failure, timeout or
//! panic in one is recorded in the [`PassReport`] and never reaches its
//! siblings. Only a folder-list failure aborts a pass. Dropping a running
//! pass aborts every sub-task it spawned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinSet;

use super::folder_cache::FolderSnapshotCache;
use crate::config::SyncSettings;
use crate::domain::{mail_bearing, AccountId, AuxResource, Folder, FolderId};
use crate::providers::resources::{ResourceError, ResourceSync, Result as ResourceResult};

/// Errors that reach the pipeline boundary.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The folder list could not be synced, so nothing else can be planned.
    #[error("folder sync failed for account {account_id}: {source}")]
    FolderSync {
        /// Account being synced.
        account_id: AccountId,
        /// Underlying resource error.
        #[source]
        source: ResourceError,
    },

    /// The pass panicked outside any isolated sub-task.
    #[error("sync pass panicked: {0}")]
    Panicked(String),
}

/// Outcome of one isolated sub-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Finished successfully.
    Completed,
    /// Returned an error.
    Failed(String),
    /// Exceeded its own deadline and was abandoned.
    TimedOut,
    /// Panicked or was aborted before reporting.
    Panicked,
}

impl StepOutcome {
    /// Returns true for [`StepOutcome::Completed`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// Account synced.
    pub account_id: AccountId,
    /// Folders returned by the folder sync.
    pub folders_found: usize,
    /// Per mail-bearing folder message sync outcome.
    pub messages: Vec<(FolderId, StepOutcome)>,
    /// Body prefetch outcome, if attempted.
    pub prefetch: Option<StepOutcome>,
    /// Per auxiliary resource outcome.
    pub auxiliary: Vec<(AuxResource, StepOutcome)>,
    /// Timestamp written as the last successful sync.
    pub last_sync: Option<DateTime<Utc>>,
}

impl PassReport {
    fn new(account_id: AccountId, folders_found: usize) -> Self {
        Self {
            account_id,
            folders_found,
            messages: Vec::new(),
            prefetch: None,
            auxiliary: Vec::new(),
            last_sync: None,
        }
    }

    /// Number of sub-tasks that did not complete.
    pub fn failures(&self) -> usize {
        let messages = self.messages.iter().filter(|(_, o)| !o.is_success()).count();
        let auxiliary = self.auxiliary.iter().filter(|(_, o)| !o.is_success()).count();
        messages + auxiliary
    }

    /// Returns true if every sub-task completed.
    pub fn is_clean(&self) -> bool {
        self.failures() == 0
    }

    /// Outcome of one folder's message sync.
    pub fn message_outcome(&self, folder_id: &FolderId) -> Option<&StepOutcome> {
        self.messages
            .iter()
            .find(|(id, _)| id == folder_id)
            .map(|(_, outcome)| outcome)
    }

    /// Outcome of one auxiliary resource.
    pub fn auxiliary_outcome(&self, resource: AuxResource) -> Option<&StepOutcome> {
        self.auxiliary
            .iter()
            .find(|(r, _)| *r == resource)
            .map(|(_, outcome)| outcome)
    }
}

/// Executes sync passes against a [`ResourceSync`] backend.
#[derive(Clone)]
pub struct Pipeline {
    resources: Arc<dyn ResourceSync>,
    settings: Arc<SyncSettings>,
    cache: Arc<FolderSnapshotCache>,
}

impl Pipeline {
    /// Creates a pipeline.
    pub fn new(
        resources: Arc<dyn ResourceSync>,
        settings: Arc<SyncSettings>,
        cache: Arc<FolderSnapshotCache>,
    ) -> Self {
        Self {
            resources,
            settings,
            cache,
        }
    }

    /// Runs a full background pass (steps 1-7).
    ///
    /// The caller bounds the whole pass with the background deadline.
    pub async fn run_background_pass(
        &self,
        account_id: AccountId,
    ) -> Result<PassReport, PipelineError> {
        let folders = self.sync_folder_list(account_id).await?;
        let mut report = PassReport::new(account_id, folders.len());

        report.messages = self.sync_mail_folders(account_id, &folders).await;
        report.prefetch = self.prefetch_inbox(account_id, &folders).await;
        report.auxiliary = self.sync_auxiliary(account_id).await;

        let now = Utc::now();
        match self.resources.record_last_sync(account_id, now).await {
            Ok(()) => report.last_sync = Some(now),
            Err(e) => {
                tracing::warn!(%account_id, error = %e, "Failed to record last sync time");
            }
        }

        Ok(report)
    }

    /// Runs the folder and message portion of a pass (steps 1-4).
    ///
    /// Used by manual refresh; returns once every folder sub-task has
    /// finished or hit its deadline.
    pub async fn refresh_folders(&self, account_id: AccountId) -> Result<PassReport, PipelineError> {
        let folders = self.sync_folder_list(account_id).await?;
        let mut report = PassReport::new(account_id, folders.len());
        report.messages = self.sync_mail_folders(account_id, &folders).await;
        Ok(report)
    }

    async fn sync_folder_list(&self, account_id: AccountId) -> Result<Vec<Folder>, PipelineError> {
        let folders = self
            .resources
            .sync_folders(account_id)
            .await
            .map_err(|source| PipelineError::FolderSync { account_id, source })?;

        tracing::debug!(%account_id, count = folders.len(), "Folder list synced");
        self.cache.observe(account_id, folders.clone());

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        Ok(folders)
    }

    async fn sync_mail_folders(
        &self,
        account_id: AccountId,
        folders: &[Folder],
    ) -> Vec<(FolderId, StepOutcome)> {
        let targets: Vec<FolderId> = mail_bearing(folders, &self.settings.mail_folder_types)
            .into_iter()
            .map(|folder| folder.id.clone())
            .collect();

        tracing::debug!(
            %account_id,
            total = folders.len(),
            mail = targets.len(),
            "Syncing mail folders"
        );

        let resources = Arc::clone(&self.resources);
        fan_out(
            account_id,
            "messages",
            targets,
            self.settings.folder_deadline,
            move |folder_id: FolderId| {
                let resources = Arc::clone(&resources);
                async move { resources.sync_messages(account_id, &folder_id).await }
            },
        )
        .await
    }

    async fn prefetch_inbox(&self, account_id: AccountId, folders: &[Folder]) -> Option<StepOutcome> {
        let limit = self.settings.prefetch_count;
        if limit == 0 || !folders.iter().any(Folder::is_primary_inbox) {
            return None;
        }

        let outcome = bounded(
            self.settings.resource_deadline,
            self.resources.prefetch_bodies(account_id, limit),
        )
        .await;
        if !outcome.is_success() {
            tracing::debug!(%account_id, ?outcome, "Body prefetch skipped");
        }
        Some(outcome)
    }

    async fn sync_auxiliary(&self, account_id: AccountId) -> Vec<(AuxResource, StepOutcome)> {
        let resources = Arc::clone(&self.resources);
        fan_out(
            account_id,
            "auxiliary",
            self.settings.auxiliary_resources.clone(),
            self.settings.resource_deadline,
            move |resource: AuxResource| {
                let resources = Arc::clone(&resources);
                async move { sync_resource(resources.as_ref(), account_id, resource).await }
            },
        )
        .await
    }
}

async fn sync_resource(
    resources: &dyn ResourceSync,
    account_id: AccountId,
    resource: AuxResource,
) -> ResourceResult<()> {
    match resource {
        AuxResource::Contacts => {
            resources.sync_contacts(account_id).await?;
            resources.sync_directory(account_id).await
        }
        AuxResource::Notes => resources.sync_notes(account_id).await,
        AuxResource::Calendar => resources.sync_calendar(account_id).await,
        AuxResource::Tasks => resources.sync_tasks(account_id).await,
    }
}

async fn bounded<F>(deadline: Duration, operation: F) -> StepOutcome
where
    F: Future<Output = ResourceResult<()>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(())) => StepOutcome::Completed,
        Ok(Err(e)) => StepOutcome::Failed(e.to_string()),
        Err(_) => StepOutcome::TimedOut,
    }
}

/// Spawns one bounded sub-task per key and waits for all of them.
///
/// Outcomes come back in key order. A sub-task that panics leaves its slot
/// as [`StepOutcome::Panicked`].
async fn fan_out<K, F, Fut>(
    account_id: AccountId,
    stage: &'static str,
    keys: Vec<K>,
    deadline: Duration,
    operation: F,
) -> Vec<(K, StepOutcome)>
where
    K: Clone + fmt::Display + Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = ResourceResult<()>> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for (index, key) in keys.iter().cloned().enumerate() {
        let work = operation(key);
        tasks.spawn(async move { (index, bounded(deadline, work).await) });
    }

    let mut outcomes = vec![StepOutcome::Panicked; keys.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = outcome,
            Err(e) => tracing::warn!(%account_id, stage, error = %e, "Sub-task did not report"),
        }
    }

    let results: Vec<(K, StepOutcome)> = keys.into_iter().zip(outcomes).collect();
    for (key, outcome) in &results {
        match outcome {
            StepOutcome::Completed => {
                tracing::debug!(%account_id, stage, target = %key, "Sub-task completed");
            }
            StepOutcome::Failed(error) => {
                tracing::warn!(%account_id, stage, target = %key, %error, "Sub-task failed");
            }
            StepOutcome::TimedOut => {
                tracing::warn!(%account_id, stage, target = %key, "Sub-task timed out");
            }
            StepOutcome::Panicked => {
                tracing::warn!(%account_id, stage, target = %key, "Sub-task panicked");
            }
        }
    }
    results
}
