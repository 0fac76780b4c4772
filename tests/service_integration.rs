//! Integration tests for the sync coordinator.
//!
//! These tests drive the coordinator through its public API against the
//! in-memory providers. Each service module contains its own unit tests for
//! detailed logic testing.

use std::sync::Arc;
use std::time::Duration;

use heap_sync::config::{Settings, SyncSettings};
use heap_sync::domain::{AccountId, AccountSyncStatus, Folder};
use heap_sync::providers::resources::{Behavior, InMemoryResources, ResourceCall};
use heap_sync::providers::{Connectivity, ResourceSync, StaticConnectivity};
use heap_sync::services::{
    GateDecision, NoticeCategory, NoticeQueue, NoticeSettings, NoticeSink, RefreshOutcome,
    ScreenScope, SyncFlags,
};
use heap_sync::SyncCoordinator;
use pretty_assertions::assert_eq;

struct Fixture {
    resources: Arc<InMemoryResources>,
    connectivity: Arc<StaticConnectivity>,
    notices: Arc<NoticeQueue>,
    coordinator: Arc<SyncCoordinator>,
}

fn fixture(settings: SyncSettings) -> Fixture {
    let resources = Arc::new(InMemoryResources::new());

    let first = AccountId(1);
    resources.set_folders(
        first,
        vec![
            Folder::new(first, "inbox", "Inbox", 2),
            Folder::new(first, "sent", "Sent Items", 5),
            Folder::new(first, "drafts", "Drafts", 3),
            Folder::new(first, "calendar", "Calendar", 8),
            Folder::new(first, "tasks", "Tasks", 7),
        ],
    );

    let second = AccountId(2);
    resources.set_folders(second, vec![Folder::new(second, "inbox", "Inbox", 2)]);

    let connectivity = Arc::new(StaticConnectivity::new(true));
    let notices = Arc::new(NoticeQueue::new(NoticeSettings {
        rate_limit: Duration::ZERO,
        ..Default::default()
    }));
    let coordinator = SyncCoordinator::new(
        Arc::clone(&resources) as Arc<dyn ResourceSync>,
        Arc::clone(&connectivity) as Arc<dyn Connectivity>,
        Arc::clone(&notices) as Arc<dyn NoticeSink>,
        settings,
    );

    Fixture {
        resources,
        connectivity,
        notices,
        coordinator,
    }
}

fn fast_settings() -> SyncSettings {
    SyncSettings {
        settle_delay: Duration::ZERO,
        ..Default::default()
    }
}

// ============================================================================
// Eligibility Gate
// ============================================================================

#[tokio::test]
async fn double_start_produces_one_job() {
    let f = fixture(fast_settings());

    let first = f.coordinator.start_sync_if_needed(AccountId(1));
    let second = f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.settled().await;

    assert_eq!(first, GateDecision::Started);
    assert_eq!(second, GateDecision::AlreadyRunning);
    let folder_syncs = f
        .resources
        .calls()
        .into_iter()
        .filter(|call| *call == ResourceCall::Folders(AccountId(1)))
        .count();
    assert_eq!(folder_syncs, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_starts_produce_one_job() {
    for _ in 0..20 {
        let f = fixture(fast_settings());

        let starts: Vec<_> = (0..16)
            .map(|_| {
                let coordinator = Arc::clone(&f.coordinator);
                tokio::spawn(async move { coordinator.start_sync_if_needed(AccountId(1)) })
            })
            .collect();

        let mut started = 0;
        for start in starts {
            if start.await.unwrap() == GateDecision::Started {
                started += 1;
            }
        }
        f.coordinator.settled().await;

        assert_eq!(started, 1);
        let folder_syncs = f
            .resources
            .calls()
            .into_iter()
            .filter(|call| *call == ResourceCall::Folders(AccountId(1)))
            .count();
        assert_eq!(folder_syncs, 1);
        assert!(f.coordinator.is_synced_account(AccountId(1)));
    }
}

#[tokio::test]
async fn synced_account_issues_no_calls_until_reset() {
    let f = fixture(fast_settings());
    f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.settled().await;
    let after_first_pass = f.resources.calls().len();

    for _ in 0..5 {
        f.coordinator.start_sync_if_needed(AccountId(1));
    }
    f.coordinator.settled().await;
    assert_eq!(f.resources.calls().len(), after_first_pass);

    f.coordinator.reset();
    assert!(!f.coordinator.sync_done());
    assert_eq!(
        f.coordinator.start_sync_if_needed(AccountId(1)),
        GateDecision::Started
    );
    f.coordinator.settled().await;
    assert!(f.resources.calls().len() > after_first_pass);
}

#[tokio::test]
async fn no_network_is_set_then_cleared() {
    let f = fixture(fast_settings());
    f.connectivity.set_available(false);

    assert_eq!(
        f.coordinator.start_sync_if_needed(AccountId(1)),
        GateDecision::NoNetwork
    );
    assert!(f.coordinator.no_network());
    assert!(f.resources.calls().is_empty());
    assert!(!f.coordinator.is_synced_account(AccountId(1)));

    f.connectivity.set_available(true);
    assert_eq!(
        f.coordinator.start_sync_if_needed(AccountId(1)),
        GateDecision::Started
    );
    assert!(!f.coordinator.no_network());
    f.coordinator.settled().await;
    assert!(f.coordinator.is_synced_account(AccountId(1)));
}

// ============================================================================
// Job Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancelling_one_account_leaves_the_other_running() {
    let f = fixture(fast_settings());
    f.resources
        .set_behavior(ResourceCall::Folders(AccountId(1)), Behavior::Hang);
    f.resources.set_behavior(
        ResourceCall::Folders(AccountId(2)),
        Behavior::Delay(Duration::from_secs(5)),
    );

    f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.start_sync_if_needed(AccountId(2));
    tokio::time::sleep(Duration::from_secs(1)).await;

    f.coordinator.reset_account(AccountId(1));

    assert_eq!(f.coordinator.status(AccountId(1)), AccountSyncStatus::Idle);
    assert!(f.coordinator.is_syncing_account(AccountId(2)));

    f.coordinator.settled().await;
    assert!(f.coordinator.is_synced_account(AccountId(2)));
    assert_eq!(f.resources.message_sync_count(AccountId(2)), 1);
    assert_eq!(f.resources.message_sync_count(AccountId(1)), 0);
}

#[tokio::test]
async fn two_accounts_sync_concurrently() {
    let f = fixture(fast_settings());

    f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.start_sync_if_needed(AccountId(2));
    assert!(f.coordinator.is_syncing());
    f.coordinator.settled().await;

    assert_eq!(f.resources.message_sync_count(AccountId(1)), 3);
    assert_eq!(f.resources.message_sync_count(AccountId(2)), 1);
    assert!(f.coordinator.is_synced_account(AccountId(1)));
    assert!(f.coordinator.is_synced_account(AccountId(2)));
    assert_eq!(
        f.coordinator.flags(),
        SyncFlags {
            is_syncing: false,
            sync_done: true,
            no_network: false,
        }
    );
}

#[tokio::test]
async fn remove_account_forgets_status_and_snapshot() {
    let f = fixture(fast_settings());
    f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.start_sync_if_needed(AccountId(2));
    f.coordinator.settled().await;

    f.coordinator.remove_account(AccountId(1));

    assert!(f.coordinator.folder_cache().snapshot(AccountId(1)).is_none());
    assert_eq!(
        f.coordinator.folder_cache().snapshot(AccountId(2)).map(|folders| folders.len()),
        Some(1)
    );
    assert_eq!(f.coordinator.status(AccountId(1)), AccountSyncStatus::Idle);
    assert!(f.coordinator.sync_done());
}

// ============================================================================
// Fan-Out Pipeline
// ============================================================================

#[tokio::test]
async fn notes_failure_does_not_affect_siblings() {
    let f = fixture(fast_settings());
    let account = AccountId(1);
    f.resources.set_behavior(
        ResourceCall::Notes(account),
        Behavior::Fail("notes backend down".to_string()),
    );

    f.coordinator.start_sync_if_needed(account);
    f.coordinator.settled().await;

    for call in [
        ResourceCall::Contacts(account),
        ResourceCall::Directory(account),
        ResourceCall::Calendar(account),
        ResourceCall::Tasks(account),
        ResourceCall::Messages(account, "inbox".into()),
        ResourceCall::Messages(account, "sent".into()),
        ResourceCall::Messages(account, "drafts".into()),
        ResourceCall::RecordLastSync(account),
    ] {
        assert!(f.resources.has_completed(&call), "{:?} did not complete", call);
    }
    assert!(!f.resources.has_completed(&ResourceCall::Notes(account)));
    assert!(f.coordinator.is_synced_account(account));
}

#[tokio::test]
async fn panicking_sub_task_is_isolated() {
    let f = fixture(fast_settings());
    let account = AccountId(1);
    f.resources
        .set_behavior(ResourceCall::Calendar(account), Behavior::Panic);

    f.coordinator.start_sync_if_needed(account);
    f.coordinator.settled().await;

    assert!(f.resources.has_completed(&ResourceCall::Tasks(account)));
    assert!(f.resources.last_sync(account).is_some());
    assert!(f.coordinator.is_synced_account(account));
}

#[tokio::test(start_paused = true)]
async fn hanging_folder_is_abandoned_after_its_deadline() {
    let f = fixture(SyncSettings {
        folder_deadline: Duration::from_secs(1),
        ..fast_settings()
    });
    let account = AccountId(1);
    f.resources.set_behavior(
        ResourceCall::Messages(account, "sent".into()),
        Behavior::Hang,
    );

    f.coordinator.start_sync_if_needed(account);
    f.coordinator.settled().await;

    assert!(f
        .resources
        .has_completed(&ResourceCall::Messages(account, "inbox".into())));
    assert!(f
        .resources
        .has_completed(&ResourceCall::Messages(account, "drafts".into())));
    assert!(!f
        .resources
        .has_completed(&ResourceCall::Messages(account, "sent".into())));
    assert!(f.resources.has_completed(&ResourceCall::Contacts(account)));
    assert!(f.resources.has_completed(&ResourceCall::Tasks(account)));
    assert!(f.coordinator.is_synced_account(account));
}

#[tokio::test]
async fn prefetch_targets_primary_inbox() {
    let f = fixture(fast_settings());

    f.coordinator.start_sync_if_needed(AccountId(2));
    f.coordinator.settled().await;

    let calls = f.resources.calls_for(AccountId(2));
    let messages = calls
        .iter()
        .position(|call| matches!(call, ResourceCall::Messages(..)))
        .unwrap();
    let prefetch = calls
        .iter()
        .position(|call| *call == ResourceCall::Prefetch(AccountId(2)))
        .unwrap();
    let contacts = calls
        .iter()
        .position(|call| *call == ResourceCall::Contacts(AccountId(2)))
        .unwrap();
    assert!(messages < prefetch);
    assert!(prefetch < contacts);
}

// ============================================================================
// Manual Refresh
// ============================================================================

#[tokio::test]
async fn manual_refresh_without_network_notifies_and_issues_no_calls() {
    let f = fixture(fast_settings());
    f.connectivity.set_available(false);
    let scope = ScreenScope::new();

    let outcome = f.coordinator.manual_refresh(AccountId(1), &scope).await;

    assert!(matches!(outcome, RefreshOutcome::NoNetwork));
    assert!(f.resources.calls().is_empty());
    assert_eq!(f.notices.active_in(NoticeCategory::NoNetwork).len(), 1);
    assert!(f.coordinator.no_network());
}

#[tokio::test]
async fn manual_refresh_runs_for_synced_account() {
    let f = fixture(fast_settings());
    f.coordinator.start_sync_if_needed(AccountId(2));
    f.coordinator.settled().await;

    let scope = ScreenScope::new();
    let outcome = f.coordinator.manual_refresh(AccountId(2), &scope).await;

    assert!(outcome.is_completed());
    assert_eq!(f.resources.message_sync_count(AccountId(2)), 2);
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cool_down_settings_round_trip_into_coordinator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"sync":{"settle_delay":0,"failure_policy":{"kind":"cool_down","period":30000}}}"#,
    )
    .unwrap();
    let settings = Settings::load(&path).unwrap();

    let f = fixture(settings.sync);
    f.resources.set_behavior(
        ResourceCall::Folders(AccountId(1)),
        Behavior::Fail("unauthorized".to_string()),
    );

    f.coordinator.start_sync_if_needed(AccountId(1));
    f.coordinator.settled().await;
    assert_eq!(
        f.coordinator.start_sync_if_needed(AccountId(1)),
        GateDecision::CoolingDown
    );

    tokio::time::advance(Duration::from_secs(31)).await;
    f.resources
        .set_behavior(ResourceCall::Folders(AccountId(1)), Behavior::Succeed);
    assert_eq!(
        f.coordinator.start_sync_if_needed(AccountId(1)),
        GateDecision::Started
    );
    f.coordinator.settled().await;
    assert!(f.coordinator.is_synced_account(AccountId(1)));
}
