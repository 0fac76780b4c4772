//! heap-sync - Demo driver for the sync coordinator
//!
//! Runs background passes for two in-memory accounts, then a manual refresh,
//! logging what happens along the way.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use heap_sync::config::Settings;
use heap_sync::domain::{AccountId, Folder};
use heap_sync::providers::resources::{Behavior, InMemoryResources, ResourceCall};
use heap_sync::providers::{Connectivity, ResourceSync, StaticConnectivity};
use heap_sync::services::{NoticeQueue, NoticeSink, RefreshOutcome, ScreenScope, SyncEvent};
use heap_sync::SyncCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_default()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level)),
        )
        .init();

    tracing::info!("Starting heap-sync demo");

    let resources = Arc::new(demo_resources());
    let connectivity = Arc::new(StaticConnectivity::new(true));
    let notices = Arc::new(NoticeQueue::default());
    let coordinator = SyncCoordinator::new(
        Arc::clone(&resources) as Arc<dyn ResourceSync>,
        Arc::clone(&connectivity) as Arc<dyn Connectivity>,
        Arc::clone(&notices) as Arc<dyn NoticeSink>,
        settings.sync,
    );

    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SyncEvent::Finished {
                account_id,
                status,
                outcome,
            } = event
            {
                tracing::info!(%account_id, ?status, ?outcome, "Pass finished");
            }
        }
    });

    for account in [AccountId(1), AccountId(2)] {
        coordinator.start_sync_if_needed(account);
    }
    coordinator.settled().await;

    tracing::info!(
        flags = ?coordinator.flags(),
        message_syncs = resources.message_sync_count(AccountId(1))
            + resources.message_sync_count(AccountId(2)),
        "Background sync settled"
    );

    let scope = ScreenScope::new();
    match coordinator.manual_refresh(AccountId(1), &scope).await {
        RefreshOutcome::Completed(report) => {
            tracing::info!(folders = report.folders_found, "Manual refresh done")
        }
        other => tracing::warn!(outcome = ?other, "Manual refresh did not complete"),
    }

    connectivity.set_available(false);
    coordinator.manual_refresh(AccountId(2), &scope).await;

    for notice in notices.active() {
        tracing::info!(title = %notice.title, body = ?notice.body, "Notice");
    }

    coordinator.shutdown();
    Ok(())
}

fn demo_resources() -> InMemoryResources {
    let resources = InMemoryResources::new().with_latency(Duration::from_millis(50));

    let first = AccountId(1);
    resources.set_folders(
        first,
        vec![
            Folder::new(first, "inbox", "Inbox", 2).with_counts(120, 4),
            Folder::new(first, "sent", "Sent Items", 5),
            Folder::new(first, "drafts", "Drafts", 3),
            Folder::new(first, "calendar", "Calendar", 8),
        ],
    );

    let second = AccountId(2);
    resources.set_folders(second, vec![Folder::new(second, "inbox", "Inbox", 2)]);
    resources.set_behavior(
        ResourceCall::Notes(second),
        Behavior::Fail("notes unsupported".to_string()),
    );

    resources
}
