//! User-visible notices.
//!
//! Background sync never talks to the user directly. The manual refresh path
//! does: when the network is down, the refresh fails or it runs out of time,
//! it posts a [`Notice`] through a [`NoticeSink`]. [`NoticeQueue`] is the
//! in-app implementation the UI drains into toasts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::domain::AccountId;

/// Errors that can occur when posting a notice.
#[derive(Debug, Error)]
pub enum NoticeError {
    /// A notice of the same category was posted too recently.
    #[error("notice rate limit exceeded")]
    RateLimited,

    /// Notice not found.
    #[error("notice not found: {0}")]
    NotFound(String),
}

/// Result type for notice operations.
pub type NoticeResult<T> = Result<T, NoticeError>;

/// Priority level for notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum NoticePriority {
    /// Informational.
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// Needs the user's attention.
    High,
}

/// What a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeCategory {
    /// Refresh refused because the device is offline.
    NoNetwork,
    /// Refresh hit an error.
    RefreshFailed,
    /// Refresh ran past its deadline.
    RefreshTimedOut,
    /// Refresh finished.
    RefreshComplete,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    /// Unique identifier.
    pub id: String,
    /// Notice category.
    pub category: NoticeCategory,
    /// Account the notice concerns, if any.
    pub account_id: Option<AccountId>,
    /// Title text.
    pub title: String,
    /// Body text.
    pub body: Option<String>,
    /// Priority level.
    pub priority: NoticePriority,
    /// Auto-dismiss after this duration.
    pub auto_dismiss: Option<Duration>,
}

impl Notice {
    /// Creates a new notice.
    pub fn new(category: NoticeCategory, title: impl Into<String>) -> Self {
        Self {
            id: format!("notice-{}", uuid::Uuid::new_v4()),
            category,
            account_id: None,
            title: title.into(),
            body: None,
            priority: NoticePriority::Normal,
            auto_dismiss: Some(Duration::from_secs(5)),
        }
    }

    /// Sets the body text.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attaches the notice to an account.
    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: NoticePriority) -> Self {
        self.priority = priority;
        self
    }

    /// Disables auto-dismiss.
    pub fn persistent(mut self) -> Self {
        self.auto_dismiss = None;
        self
    }

    /// Refresh refused: no network.
    pub fn no_network(account_id: AccountId) -> Self {
        Self::new(NoticeCategory::NoNetwork, "No network connection")
            .body("Mail will refresh when you are back online.")
            .account(account_id)
            .priority(NoticePriority::High)
    }

    /// Refresh failed with an error.
    pub fn refresh_failed(account_id: AccountId, message: &str) -> Self {
        Self::new(NoticeCategory::RefreshFailed, "Refresh failed")
            .body(message)
            .account(account_id)
            .priority(NoticePriority::High)
            .persistent()
    }

    /// Refresh ran out of time.
    pub fn refresh_timed_out(account_id: AccountId) -> Self {
        Self::new(NoticeCategory::RefreshTimedOut, "Refresh is taking too long")
            .body("Some folders may not be up to date.")
            .account(account_id)
    }

    /// Refresh finished.
    pub fn refresh_complete(account_id: AccountId, folders: usize) -> Self {
        let title = match folders {
            1 => "1 folder refreshed".to_string(),
            n => format!("{} folders refreshed", n),
        };
        Self::new(NoticeCategory::RefreshComplete, title)
            .account(account_id)
            .priority(NoticePriority::Low)
    }
}

/// Destination for user-visible notices.
pub trait NoticeSink: Send + Sync {
    /// Posts a notice.
    fn notify(&self, notice: Notice) -> NoticeResult<()>;
}

/// A posted notice with tracking info.
#[derive(Debug, Clone)]
pub struct PostedNotice {
    /// The notice itself.
    pub notice: Notice,
    /// When it was posted.
    pub posted_at: Instant,
    /// Whether it has been dismissed.
    pub dismissed: bool,
}

impl PostedNotice {
    fn new(notice: Notice) -> Self {
        Self {
            notice,
            posted_at: Instant::now(),
            dismissed: false,
        }
    }

    /// Returns whether this notice should auto-dismiss.
    pub fn should_auto_dismiss(&self) -> bool {
        if self.dismissed {
            return false;
        }
        match self.notice.auto_dismiss {
            Some(duration) => self.posted_at.elapsed() >= duration,
            None => false,
        }
    }

    fn is_active(&self) -> bool {
        !self.dismissed && !self.should_auto_dismiss()
    }
}

/// Settings for the in-app notice queue.
#[derive(Debug, Clone)]
pub struct NoticeSettings {
    /// Maximum notices kept at once.
    pub max_visible: usize,
    /// Minimum time between notices of the same category.
    pub rate_limit: Duration,
    /// Categories to drop silently.
    pub muted_categories: Vec<NoticeCategory>,
}

impl Default for NoticeSettings {
    fn default() -> Self {
        Self {
            max_visible: 5,
            rate_limit: Duration::from_secs(1),
            muted_categories: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    posted: VecDeque<PostedNotice>,
    last_by_category: HashMap<NoticeCategory, Instant>,
}

/// Bounded in-app notice queue.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    settings: NoticeSettings,
    state: Mutex<QueueState>,
}

impl NoticeQueue {
    /// Creates a queue.
    pub fn new(settings: NoticeSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Dismisses a notice by ID.
    pub fn dismiss(&self, id: &str) -> NoticeResult<()> {
        let mut state = self.lock();
        let posted = state
            .posted
            .iter_mut()
            .find(|posted| posted.notice.id == id)
            .ok_or_else(|| NoticeError::NotFound(id.to_string()))?;
        posted.dismissed = true;
        Ok(())
    }

    /// Drops dismissed and expired notices.
    pub fn cleanup(&self) {
        self.lock().posted.retain(PostedNotice::is_active);
    }

    /// Returns all active notices, oldest first.
    pub fn active(&self) -> Vec<Notice> {
        self.lock()
            .posted
            .iter()
            .filter(|posted| posted.is_active())
            .map(|posted| posted.notice.clone())
            .collect()
    }

    /// Returns active notices of one category.
    pub fn active_in(&self, category: NoticeCategory) -> Vec<Notice> {
        self.active()
            .into_iter()
            .filter(|notice| notice.category == category)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NoticeSink for NoticeQueue {
    fn notify(&self, notice: Notice) -> NoticeResult<()> {
        if self.settings.muted_categories.contains(&notice.category) {
            return Ok(());
        }

        let mut state = self.lock();

        if let Some(last) = state.last_by_category.get(&notice.category) {
            if last.elapsed() < self.settings.rate_limit {
                return Err(NoticeError::RateLimited);
            }
        }

        tracing::debug!(
            title = %notice.title,
            body = ?notice.body,
            account_id = ?notice.account_id,
            "Notice posted"
        );

        state
            .last_by_category
            .insert(notice.category, Instant::now());
        state.posted.push_back(PostedNotice::new(notice));
        while state.posted.len() > self.settings.max_visible {
            state.posted.pop_front();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlimited() -> NoticeQueue {
        NoticeQueue::new(NoticeSettings {
            rate_limit: Duration::ZERO,
            ..Default::default()
        })
    }

    #[test]
    fn notice_builders() {
        let notice = Notice::new(NoticeCategory::RefreshComplete, "Done")
            .body("Body text")
            .account(AccountId(3))
            .priority(NoticePriority::High);

        assert_eq!(notice.title, "Done");
        assert_eq!(notice.body, Some("Body text".to_string()));
        assert_eq!(notice.account_id, Some(AccountId(3)));
        assert_eq!(notice.priority, NoticePriority::High);
    }

    #[test]
    fn no_network_notice() {
        let notice = Notice::no_network(AccountId(1));
        assert_eq!(notice.category, NoticeCategory::NoNetwork);
        assert_eq!(notice.priority, NoticePriority::High);
        assert!(notice.auto_dismiss.is_some());
    }

    #[test]
    fn refresh_failed_is_persistent() {
        let notice = Notice::refresh_failed(AccountId(1), "server error");
        assert!(notice.auto_dismiss.is_none());
        assert_eq!(notice.body.as_deref(), Some("server error"));
    }

    #[test]
    fn refresh_complete_title() {
        assert_eq!(Notice::refresh_complete(AccountId(1), 1).title, "1 folder refreshed");
        assert_eq!(Notice::refresh_complete(AccountId(1), 4).title, "4 folders refreshed");
    }

    #[test]
    fn notify_and_dismiss() {
        let queue = unlimited();
        queue.notify(Notice::no_network(AccountId(1))).unwrap();
        queue.notify(Notice::refresh_timed_out(AccountId(1))).unwrap();
        assert_eq!(queue.active().len(), 2);

        let id = queue.active()[0].id.clone();
        queue.dismiss(&id).unwrap();
        assert_eq!(queue.active().len(), 1);

        queue.cleanup();
        assert!(matches!(queue.dismiss(&id), Err(NoticeError::NotFound(_))));
    }

    #[test]
    fn rate_limited_per_category() {
        let queue = NoticeQueue::new(NoticeSettings {
            rate_limit: Duration::from_secs(60),
            ..Default::default()
        });

        queue.notify(Notice::no_network(AccountId(1))).unwrap();
        let second = queue.notify(Notice::no_network(AccountId(1)));
        assert!(matches!(second, Err(NoticeError::RateLimited)));

        queue.notify(Notice::refresh_timed_out(AccountId(1))).unwrap();
        assert_eq!(queue.active().len(), 2);
    }

    #[test]
    fn muted_categories() {
        let queue = NoticeQueue::new(NoticeSettings {
            muted_categories: vec![NoticeCategory::RefreshComplete],
            ..Default::default()
        });

        queue.notify(Notice::refresh_complete(AccountId(1), 3)).unwrap();
        assert!(queue.active().is_empty());
    }

    #[test]
    fn trims_to_max_visible() {
        let queue = NoticeQueue::new(NoticeSettings {
            max_visible: 2,
            rate_limit: Duration::ZERO,
            ..Default::default()
        });

        for account in 1..=3 {
            queue.notify(Notice::no_network(AccountId(account))).unwrap();
        }

        let active = queue.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].account_id, Some(AccountId(2)));
    }
}
