//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/heap-sync/settings.json` (or the
//! platform equivalent) and loaded at startup. Missing fields fall back to
//! their defaults, so an empty object is a valid settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::{AuxResource, DEFAULT_MAIL_FOLDER_TYPES};

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Background and manual sync behaviour.
    pub sync: SyncSettings,
    /// Log output configuration.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Returns the platform settings file location.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "panbanda", "heap-sync")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from `path`, returning defaults if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from the platform location.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Writes settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write settings to {}", path.display()))?;
        Ok(())
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.sync.validate()
    }
}

/// What happens to an account whose pass ends in an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark the account synced so it is not retried until reset.
    #[default]
    MarkSynced,
    /// Refuse automatic retries for `period`, then allow one new attempt.
    CoolDown {
        /// Cool-down length.
        #[serde(with = "duration_ms")]
        period: Duration,
    },
}

/// Sync configuration.
///
/// Deadlines nest strictly: the background deadline bounds the whole pass
/// and must exceed the resource deadline, which bounds each auxiliary
/// category and must exceed the folder deadline bounding each folder's
/// message sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Bound on one account's whole background pass.
    #[serde(with = "duration_ms")]
    pub background_deadline: Duration,
    /// Bound on one folder's message sync.
    #[serde(with = "duration_ms")]
    pub folder_deadline: Duration,
    /// Bound on one auxiliary resource category.
    #[serde(with = "duration_ms")]
    pub resource_deadline: Duration,
    /// Bound on a user-triggered refresh.
    #[serde(with = "duration_ms")]
    pub manual_deadline: Duration,
    /// Pause between folder sync and message fan-out.
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
    /// Inbox bodies to prefetch after message sync (0 disables).
    pub prefetch_count: usize,
    /// Folder type codes whose messages are synced.
    pub mail_folder_types: Vec<u8>,
    /// Auxiliary categories synced after mail.
    pub auxiliary_resources: Vec<AuxResource>,
    /// Handling of passes that end in an internal error.
    pub failure_policy: FailurePolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            background_deadline: Duration::from_secs(300),
            folder_deadline: Duration::from_secs(120),
            resource_deadline: Duration::from_secs(180),
            manual_deadline: Duration::from_secs(60),
            settle_delay: Duration::from_secs(1),
            prefetch_count: 20,
            mail_folder_types: DEFAULT_MAIL_FOLDER_TYPES.to_vec(),
            auxiliary_resources: AuxResource::ALL.to_vec(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Checks that deadlines are usable and correctly layered.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.background_deadline.is_zero(),
            "background_deadline must be non-zero"
        );
        ensure!(!self.folder_deadline.is_zero(), "folder_deadline must be non-zero");
        ensure!(
            !self.resource_deadline.is_zero(),
            "resource_deadline must be non-zero"
        );
        ensure!(!self.manual_deadline.is_zero(), "manual_deadline must be non-zero");
        ensure!(
            self.background_deadline > self.resource_deadline,
            "background_deadline must be longer than resource_deadline"
        );
        ensure!(
            self.resource_deadline > self.folder_deadline,
            "resource_deadline must be longer than folder_deadline"
        );
        Ok(())
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
