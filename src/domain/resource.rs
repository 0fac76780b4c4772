//! Auxiliary resource categories synced alongside mail.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-mail resource category with its own sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxResource {
    /// Personal and directory contacts.
    Contacts,
    /// Notes.
    Notes,
    /// Calendar events.
    Calendar,
    /// Tasks.
    Tasks,
}

impl AuxResource {
    /// Every category, in the order they are spawned.
    pub const ALL: [AuxResource; 4] = [
        AuxResource::Contacts,
        AuxResource::Notes,
        AuxResource::Calendar,
        AuxResource::Tasks,
    ];

    /// Short name used in logs and task labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Contacts => "contacts",
            Self::Notes => "notes",
            Self::Calendar => "calendar",
            Self::Tasks => "tasks",
        }
    }
}

impl fmt::Display for AuxResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
