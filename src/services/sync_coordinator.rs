//! Background sync coordinator.
//!
//! The [`SyncCoordinator`] decides, per account, whether a background pass
//! may start and owns the resulting job until it finishes.
//!
//! # Bookkeeping
//!
//! Per-account status and job handles live in one map keyed by account id,
//! behind a synchronous mutex. The lock is only held for gate checks and
//! state transitions, never across an `.await`, so concurrent passes for
//! different accounts only contend for the few instructions it takes to
//! flip an entry. Connectivity is sampled before the lock is taken.
//!
//! # Job lifecycle
//!
//! ```text
//! Idle --gate passes--> Syncing --completes / deadline / internal error--> Synced
//!                          |
//!                          +--cancelled (reset, shutdown)--> Idle
//! ```
//!
//! Each job carries a child of the coordinator's process-wide cancellation
//! token and a unique job id. A job that finishes after being superseded
//! finds a different id (or no entry) and leaves the bookkeeping alone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::folder_cache::FolderSnapshotCache;
use super::notice_service::NoticeSink;
use super::pipeline::{PassReport, Pipeline, PipelineError};
use crate::config::{FailurePolicy, SyncSettings};
use crate::domain::{AccountId, AccountSyncStatus, SyncStatusKind};
use crate::providers::{Connectivity, ResourceSync};

/// Aggregate flags observed by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncFlags {
    /// At least one account has a live job.
    pub is_syncing: bool,
    /// At least one account has reached `Synced`.
    pub sync_done: bool,
    /// The most recent gate check failed on connectivity.
    pub no_network: bool,
}

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A new job was started.
    Started,
    /// The account already reached `Synced`.
    AlreadySynced,
    /// A job is already live for the account.
    AlreadyRunning,
    /// The last pass failed and the cool-down has not elapsed.
    CoolingDown,
    /// The network is unavailable.
    NoNetwork,
    /// The coordinator has been shut down.
    ShutDown,
}

/// How a background pass ended.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Every step ran; individual sub-tasks may still have failed.
    Completed(PassReport),
    /// The outer deadline cut the pass short.
    DeadlineExceeded,
    /// An error reached the pipeline boundary.
    Failed(PipelineError),
    /// The job was cancelled.
    Cancelled,
}

/// Event emitted by the coordinator.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A background job started.
    Started(AccountId),
    /// A background job reached a terminal outcome.
    Finished {
        /// Account synced.
        account_id: AccountId,
        /// Status the account was left in.
        status: SyncStatusKind,
        /// How the pass ended.
        outcome: PassOutcome,
    },
    /// A live job was cancelled by a reset.
    Cancelled(AccountId),
    /// A sync or refresh was refused because the network is down.
    NoNetwork(AccountId),
    /// A start request was refused by the gate for another reason.
    Skipped {
        /// Account requested.
        account_id: AccountId,
        /// Why it was refused.
        reason: GateDecision,
    },
}

#[derive(Debug)]
struct JobHandle {
    id: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct AccountEntry {
    status: AccountSyncStatus,
    job: Option<JobHandle>,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    accounts: HashMap<AccountId, AccountEntry>,
    no_network: bool,
}

impl Bookkeeping {
    fn flags(&self) -> SyncFlags {
        SyncFlags {
            is_syncing: self.accounts.values().any(|entry| entry.job.is_some()),
            sync_done: self.accounts.values().any(|entry| entry.status.is_synced()),
            no_network: self.no_network,
        }
    }
}

/// Per-account background sync coordinator.
///
/// One instance is shared process-wide so sync status survives screen
/// changes. Construct with [`SyncCoordinator::new`] and keep the `Arc`.
///
/// # Example
///
/// ```ignore
/// let coordinator = SyncCoordinator::new(resources, connectivity, notices, settings);
///
/// coordinator.start_sync_if_needed(AccountId(1));
/// coordinator.settled().await;
/// assert!(coordinator.is_synced_account(AccountId(1)));
/// ```
pub struct SyncCoordinator {
    pub(super) pipeline: Pipeline,
    pub(super) connectivity: Arc<dyn Connectivity>,
    pub(super) notices: Arc<dyn NoticeSink>,
    pub(super) settings: Arc<SyncSettings>,
    cache: Arc<FolderSnapshotCache>,
    book: Mutex<Bookkeeping>,
    next_job_id: AtomicU64,
    scope: CancellationToken,
    flags: watch::Sender<SyncFlags>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncCoordinator {
    /// Creates a coordinator.
    pub fn new(
        resources: Arc<dyn ResourceSync>,
        connectivity: Arc<dyn Connectivity>,
        notices: Arc<dyn NoticeSink>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let settings = Arc::new(settings);
        let cache = Arc::new(FolderSnapshotCache::new());
        let pipeline = Pipeline::new(resources, Arc::clone(&settings), Arc::clone(&cache));
        let (flags, _) = watch::channel(SyncFlags::default());
        let (events, _) = broadcast::channel(100);

        Arc::new(Self {
            pipeline,
            connectivity,
            notices,
            settings,
            cache,
            book: Mutex::new(Bookkeeping::default()),
            next_job_id: AtomicU64::new(1),
            scope: CancellationToken::new(),
            flags,
            events,
        })
    }

    /// Starts a background pass for `account_id` if the gate allows it.
    ///
    /// Idempotent: a second call while a job is live, or after the account
    /// reached `Synced`, does nothing. No resource call is issued on any
    /// refusal path.
    pub fn start_sync_if_needed(self: &Arc<Self>, account_id: AccountId) -> GateDecision {
        let online = self.connectivity.is_available();

        let mut guard = self.lock();
        let book = &mut *guard;

        let decision = self.check_gate(book, account_id, online);
        match decision {
            GateDecision::Started => {
                let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed);
                let cancel = self.scope.child_token();

                let entry = book.accounts.entry(account_id).or_default();
                entry.job = Some(JobHandle {
                    id: job_id,
                    cancel: cancel.clone(),
                });
                entry.status = AccountSyncStatus::Syncing;

                tracing::info!(%account_id, job_id, "Background sync started");
                let _ = self.events.send(SyncEvent::Started(account_id));
                tokio::spawn(Arc::clone(self).run_job(account_id, job_id, cancel));
            }
            GateDecision::NoNetwork => {
                tracing::debug!(%account_id, "Background sync not started: no network");
                let _ = self.events.send(SyncEvent::NoNetwork(account_id));
            }
            reason => {
                tracing::debug!(%account_id, ?reason, "Background sync not started");
                let _ = self.events.send(SyncEvent::Skipped { account_id, reason });
            }
        }

        self.publish(book);
        decision
    }

    /// Gate checks, in order: shutdown, synced, live job, cool-down, network.
    ///
    /// `online` is sampled before the lock is taken.
    fn check_gate(
        &self,
        book: &mut Bookkeeping,
        account_id: AccountId,
        online: bool,
    ) -> GateDecision {
        if self.scope.is_cancelled() {
            return GateDecision::ShutDown;
        }

        if let Some(entry) = book.accounts.get(&account_id) {
            if entry.status.is_synced() {
                return GateDecision::AlreadySynced;
            }
            if entry.job.is_some() {
                return GateDecision::AlreadyRunning;
            }
            if entry.status.is_cooling_down(Instant::now()) {
                return GateDecision::CoolingDown;
            }
        }

        if !online {
            book.no_network = true;
            return GateDecision::NoNetwork;
        }

        book.no_network = false;
        GateDecision::Started
    }

    async fn run_job(self: Arc<Self>, account_id: AccountId, job_id: u64, cancel: CancellationToken) {
        let pipeline = self.pipeline.clone();
        let deadline = self.settings.background_deadline;
        let mut work = tokio::spawn(async move {
            tokio::time::timeout(deadline, pipeline.run_background_pass(account_id)).await
        });

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                work.abort();
                PassOutcome::Cancelled
            }
            joined = &mut work => match joined {
                Ok(Ok(Ok(report))) => PassOutcome::Completed(report),
                Ok(Ok(Err(e))) => PassOutcome::Failed(e),
                Ok(Err(_)) => PassOutcome::DeadlineExceeded,
                Err(e) if e.is_cancelled() => PassOutcome::Cancelled,
                Err(e) => PassOutcome::Failed(PipelineError::Panicked(e.to_string())),
            },
        };

        self.finish_job(account_id, job_id, outcome);
    }

    fn finish_job(&self, account_id: AccountId, job_id: u64, outcome: PassOutcome) {
        let mut guard = self.lock();
        let book = &mut *guard;

        let current = book
            .accounts
            .get_mut(&account_id)
            .filter(|entry| entry.job.as_ref().map(|job| job.id) == Some(job_id));
        let Some(entry) = current else {
            tracing::debug!(%account_id, job_id, "Superseded sync job finished");
            return;
        };

        entry.job = None;
        entry.status = self.terminal_status(&outcome);
        let status = entry.status.kind();
        self.publish(book);

        match &outcome {
            PassOutcome::Completed(report) => tracing::info!(
                %account_id,
                ?status,
                folders = report.folders_found,
                failures = report.failures(),
                "Background sync completed"
            ),
            PassOutcome::DeadlineExceeded => {
                tracing::warn!(%account_id, ?status, "Background sync hit its deadline")
            }
            PassOutcome::Failed(e) => {
                tracing::error!(%account_id, ?status, error = %e, "Background sync failed")
            }
            PassOutcome::Cancelled => {
                tracing::info!(%account_id, ?status, "Background sync cancelled")
            }
        }

        let _ = self.events.send(SyncEvent::Finished {
            account_id,
            status,
            outcome,
        });
    }

    fn terminal_status(&self, outcome: &PassOutcome) -> AccountSyncStatus {
        match outcome {
            PassOutcome::Completed(_) | PassOutcome::DeadlineExceeded => AccountSyncStatus::Synced,
            PassOutcome::Failed(_) => match self.settings.failure_policy {
                FailurePolicy::MarkSynced => AccountSyncStatus::Synced,
                FailurePolicy::CoolDown { period } => AccountSyncStatus::Failed {
                    retry_at: Instant::now() + period,
                },
            },
            PassOutcome::Cancelled => AccountSyncStatus::Idle,
        }
    }

    /// Cancels the account's live job, if any, and clears its status.
    ///
    /// The only way to make a `Synced` account eligible again.
    pub fn reset_account(&self, account_id: AccountId) {
        let cancelled = {
            let mut guard = self.lock();
            let book = &mut *guard;
            let cancelled = book
                .accounts
                .remove(&account_id)
                .and_then(|entry| entry.job)
                .map(|job| job.cancel.cancel())
                .is_some();
            self.publish(book);
            cancelled
        };

        tracing::debug!(%account_id, cancelled, "Account sync state reset");
        if cancelled {
            let _ = self.events.send(SyncEvent::Cancelled(account_id));
        }
    }

    /// Resets every tracked account and clears the no-network flag.
    pub fn reset(&self) {
        let cancelled: Vec<AccountId> = {
            let mut guard = self.lock();
            let book = &mut *guard;
            let cancelled = book
                .accounts
                .drain()
                .filter_map(|(account_id, entry)| {
                    entry.job.map(|job| {
                        job.cancel.cancel();
                        account_id
                    })
                })
                .collect();
            book.no_network = false;
            self.publish(book);
            cancelled
        };

        tracing::info!(cancelled = cancelled.len(), "Sync state reset");
        for account_id in cancelled {
            let _ = self.events.send(SyncEvent::Cancelled(account_id));
        }
    }

    /// Handles an account removal: resets it and evicts its folder snapshot.
    pub fn remove_account(&self, account_id: AccountId) {
        self.reset_account(account_id);
        self.cache.remove(account_id);
    }

    /// Cancels every live job and refuses new ones.
    pub fn shutdown(&self) {
        tracing::info!("Sync coordinator shutting down");
        self.scope.cancel();
    }

    /// Returns true if `account_id` has a live job.
    pub fn is_syncing_account(&self, account_id: AccountId) -> bool {
        self.lock()
            .accounts
            .get(&account_id)
            .is_some_and(|entry| entry.job.is_some())
    }

    /// Returns true if `account_id` reached `Synced`.
    pub fn is_synced_account(&self, account_id: AccountId) -> bool {
        self.status(account_id).is_synced()
    }

    /// Returns the status of one account.
    pub fn status(&self, account_id: AccountId) -> AccountSyncStatus {
        self.lock()
            .accounts
            .get(&account_id)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Returns true if any account has a live job.
    pub fn is_syncing(&self) -> bool {
        self.flags().is_syncing
    }

    /// Returns true if any account reached `Synced`.
    pub fn sync_done(&self) -> bool {
        self.flags().sync_done
    }

    /// Returns true if the last connectivity check failed.
    pub fn no_network(&self) -> bool {
        self.flags().no_network
    }

    /// Returns the current aggregate flags.
    pub fn flags(&self) -> SyncFlags {
        self.lock().flags()
    }

    /// Watches the aggregate flags.
    pub fn watch_flags(&self) -> watch::Receiver<SyncFlags> {
        self.flags.subscribe()
    }

    /// Subscribes to sync events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Waits until no account has a live job.
    pub async fn settled(&self) {
        let mut flags = self.flags.subscribe();
        let _ = flags.wait_for(|flags| !flags.is_syncing).await;
    }

    /// Returns the folder snapshot cache.
    pub fn folder_cache(&self) -> &FolderSnapshotCache {
        &self.cache
    }

    /// Records a connectivity result from a path that bypasses the gate.
    pub(super) fn set_no_network(&self, account_id: AccountId, no_network: bool) {
        {
            let mut guard = self.lock();
            guard.no_network = no_network;
            self.publish(&guard);
        }
        if no_network {
            let _ = self.events.send(SyncEvent::NoNetwork(account_id));
        }
    }

    fn publish(&self, book: &Bookkeeping) {
        self.flags.send_replace(book.flags());
    }

    fn lock(&self) -> MutexGuard<'_, Bookkeeping> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
