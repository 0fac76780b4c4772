//! Sync services layer.
//!
//! This module contains the coordinator that decides when accounts sync and
//! the pipeline that performs a pass, plus the small caches and notice
//! plumbing around them.
//!
//! # Architecture
//!
//! ```text
//! UI (account became active / pull to refresh)
//!          |
//!          v
//!  SyncCoordinator  -- eligibility gate, job lifecycle, flags
//!          |
//!          v
//!      Pipeline     -- folders, messages, prefetch, auxiliary resources
//!          |
//!          v
//! Providers (ResourceSync, Connectivity)
//! ```
//!
//! # Services Overview
//!
//! - [`SyncCoordinator`]: Per-account background sync with idempotent start and reset
//! - [`Pipeline`]: Structured fan-out of one account's resource operations
//! - [`ScreenScope`]: Cancellation scope for user-triggered refreshes
//! - [`FolderSnapshotCache`]: Last-known folder list per account
//! - [`NoticeQueue`]: User-visible notices raised by manual refresh

mod folder_cache;
mod manual_refresh;
mod notice_service;
mod pipeline;
mod sync_coordinator;

pub use folder_cache::FolderSnapshotCache;
pub use manual_refresh::{RefreshOutcome, ScreenScope};
pub use notice_service::{
    Notice, NoticeCategory, NoticeError, NoticePriority, NoticeQueue, NoticeResult,
    NoticeSettings, NoticeSink, PostedNotice,
};
pub use pipeline::{PassReport, Pipeline, PipelineError, StepOutcome};
pub use sync_coordinator::{GateDecision, PassOutcome, SyncCoordinator, SyncEvent, SyncFlags};
