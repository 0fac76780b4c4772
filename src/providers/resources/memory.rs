//! In-memory resource sync implementation.
//!
//! Serves a configured folder list per account and records every call it
//! receives. Each call can be scripted to succeed, fail, stall for a while,
//! hang forever or panic, which is what the demo binary and the tests use to
//! exercise deadlines and failure isolation without a server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::traits::{ResourceError, ResourceSync, Result};
use crate::domain::{AccountId, Folder, FolderId};

/// One resource operation, as recorded by [`InMemoryResources`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceCall {
    /// Folder list sync.
    Folders(AccountId),
    /// Message sync for one folder.
    Messages(AccountId, FolderId),
    /// Body prefetch.
    Prefetch(AccountId),
    /// Personal contacts.
    Contacts(AccountId),
    /// Directory contacts.
    Directory(AccountId),
    /// Notes.
    Notes(AccountId),
    /// Calendar.
    Calendar(AccountId),
    /// Tasks.
    Tasks(AccountId),
    /// Last-sync timestamp write.
    RecordLastSync(AccountId),
}

impl ResourceCall {
    /// Account the call was made for.
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::Folders(id)
            | Self::Messages(id, _)
            | Self::Prefetch(id)
            | Self::Contacts(id)
            | Self::Directory(id)
            | Self::Notes(id)
            | Self::Calendar(id)
            | Self::Tasks(id)
            | Self::RecordLastSync(id) => *id,
        }
    }
}

/// Scripted behaviour for a call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Behavior {
    /// Return success after the configured latency.
    #[default]
    Succeed,
    /// Return a server error with this message.
    Fail(String),
    /// Succeed after an extra delay.
    Delay(Duration),
    /// Never complete.
    Hang,
    /// Panic inside the call.
    Panic,
}

#[derive(Debug, Default)]
struct State {
    folders: HashMap<AccountId, Vec<Folder>>,
    behaviors: HashMap<ResourceCall, Behavior>,
    issued: Vec<ResourceCall>,
    completed: Vec<ResourceCall>,
    last_sync: HashMap<AccountId, DateTime<Utc>>,
}

/// Resource sync backed by in-process state.
#[derive(Debug, Default)]
pub struct InMemoryResources {
    state: Mutex<State>,
    latency: Duration,
}

impl InMemoryResources {
    /// Creates an empty instance with no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed latency to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Sets the folder list returned for an account.
    pub fn set_folders(&self, account_id: AccountId, folders: Vec<Folder>) {
        self.lock().folders.insert(account_id, folders);
    }

    /// Scripts the behaviour of one call.
    pub fn set_behavior(&self, call: ResourceCall, behavior: Behavior) {
        self.lock().behaviors.insert(call, behavior);
    }

    /// Every call issued so far, in issue order.
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.lock().issued.clone()
    }

    /// Calls issued for one account.
    pub fn calls_for(&self, account_id: AccountId) -> Vec<ResourceCall> {
        self.lock()
            .issued
            .iter()
            .filter(|call| call.account_id() == account_id)
            .cloned()
            .collect()
    }

    /// Calls that returned successfully.
    pub fn completed(&self) -> Vec<ResourceCall> {
        self.lock().completed.clone()
    }

    /// Returns true if `call` has returned successfully.
    pub fn has_completed(&self, call: &ResourceCall) -> bool {
        self.lock().completed.contains(call)
    }

    /// Number of message sync calls issued for an account.
    pub fn message_sync_count(&self, account_id: AccountId) -> usize {
        self.calls_for(account_id)
            .iter()
            .filter(|call| matches!(call, ResourceCall::Messages(..)))
            .count()
    }

    /// Last-sync timestamp recorded for an account.
    pub fn last_sync(&self, account_id: AccountId) -> Option<DateTime<Utc>> {
        self.lock().last_sync.get(&account_id).copied()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn perform(&self, call: ResourceCall) -> Result<()> {
        let behavior = {
            let mut state = self.lock();
            state.issued.push(call.clone());
            state.behaviors.get(&call).cloned().unwrap_or_default()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => return Err(ResourceError::Server(message)),
            Behavior::Delay(delay) => tokio::time::sleep(delay).await,
            Behavior::Hang => std::future::pending::<()>().await,
            Behavior::Panic => panic!("scripted panic in {:?}", call),
        }

        self.lock().completed.push(call);
        Ok(())
    }
}

#[async_trait]
impl ResourceSync for InMemoryResources {
    async fn sync_folders(&self, account_id: AccountId) -> Result<Vec<Folder>> {
        self.perform(ResourceCall::Folders(account_id)).await?;
        Ok(self
            .lock()
            .folders
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn sync_messages(&self, account_id: AccountId, folder_id: &FolderId) -> Result<()> {
        self.perform(ResourceCall::Messages(account_id, folder_id.clone()))
            .await
    }

    async fn prefetch_bodies(&self, account_id: AccountId, _limit: usize) -> Result<()> {
        self.perform(ResourceCall::Prefetch(account_id)).await
    }

    async fn sync_contacts(&self, account_id: AccountId) -> Result<()> {
        self.perform(ResourceCall::Contacts(account_id)).await
    }

    async fn sync_directory(&self, account_id: AccountId) -> Result<()> {
        self.perform(ResourceCall::Directory(account_id)).await
    }

    async fn sync_notes(&self, account_id: AccountId) -> Result<()> {
        self.perform(ResourceCall::Notes(account_id)).await
    }

    async fn sync_calendar(&self, account_id: AccountId) -> Result<()> {
        self.perform(ResourceCall::Calendar(account_id)).await
    }

    async fn sync_tasks(&self, account_id: AccountId) -> Result<()> {
        self.perform(ResourceCall::Tasks(account_id)).await
    }

    async fn record_last_sync(&self, account_id: AccountId, at: DateTime<Utc>) -> Result<()> {
        self.perform(ResourceCall::RecordLastSync(account_id))
            .await?;
        self.lock().last_sync.insert(account_id, at);
        Ok(())
    }
}
