//! Last-known-good folder lists, per account.
//!
//! Screens read the snapshot once, synchronously, when they first appear so
//! the folder list renders before the live subscription delivers its first
//! value. Entries are replaced on every fresh folder list and only removed
//! when the account itself goes away.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::{AccountId, Folder};

/// Write-through folder list cache keyed by account.
#[derive(Debug, Default)]
pub struct FolderSnapshotCache {
    entries: RwLock<HashMap<AccountId, Vec<Folder>>>,
}

impl FolderSnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly observed folder list. Last write wins.
    pub fn observe(&self, account_id: AccountId, folders: Vec<Folder>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        tracing::trace!(%account_id, count = folders.len(), "Folder snapshot updated");
        entries.insert(account_id, folders);
    }

    /// Returns the last folder list seen for an account.
    pub fn snapshot(&self, account_id: AccountId) -> Option<Vec<Folder>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&account_id).cloned()
    }

    /// Drops an account's entry. Returns true if one existed.
    pub fn remove(&self, account_id: AccountId) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&account_id).is_some()
    }

    /// Number of accounts with a snapshot.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no account has a snapshot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders(account_id: AccountId, names: &[&str]) -> Vec<Folder> {
        names
            .iter()
            .map(|name| Folder::new(account_id, *name, *name, 2))
            .collect()
    }

    #[test]
    fn snapshot_of_unknown_account_is_none() {
        let cache = FolderSnapshotCache::new();
        assert!(cache.snapshot(AccountId(1)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let cache = FolderSnapshotCache::new();
        cache.observe(AccountId(1), folders(AccountId(1), &["a", "b"]));
        cache.observe(AccountId(1), folders(AccountId(1), &["c"]));

        let snapshot = cache.snapshot(AccountId(1)).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].display_name, "c");
    }

    #[test]
    fn accounts_are_independent() {
        let cache = FolderSnapshotCache::new();
        cache.observe(AccountId(1), folders(AccountId(1), &["a"]));
        cache.observe(AccountId(2), folders(AccountId(2), &["b", "c"]));

        assert!(cache.remove(AccountId(1)));
        assert!(!cache.remove(AccountId(1)));

        assert!(cache.snapshot(AccountId(1)).is_none());
        assert_eq!(cache.snapshot(AccountId(2)).unwrap().len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_list_is_still_a_snapshot() {
        let cache = FolderSnapshotCache::new();
        cache.observe(AccountId(5), Vec::new());
        assert_eq!(cache.snapshot(AccountId(5)), Some(Vec::new()));
    }
}
