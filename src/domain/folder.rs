//! Folder domain types.
//!
//! Folders arrive from the server with an Exchange ActiveSync style type
//! code. The code decides whether the sync pipeline pulls messages for the
//! folder or leaves it to one of the auxiliary resource syncs.

use serde::{Deserialize, Serialize};

use super::{AccountId, FolderId};

/// A folder descriptor as last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Server-assigned folder identifier.
    pub id: FolderId,
    /// Account this folder belongs to.
    pub account_id: AccountId,
    /// Name shown in the folder list.
    pub display_name: String,
    /// Raw folder type code.
    pub type_code: u8,
    /// Total message count.
    pub total_count: u32,
    /// Unread message count.
    pub unread_count: u32,
}

impl Folder {
    /// Creates an empty folder descriptor.
    pub fn new(
        account_id: AccountId,
        id: impl Into<FolderId>,
        display_name: impl Into<String>,
        type_code: u8,
    ) -> Self {
        Self {
            id: id.into(),
            account_id,
            display_name: display_name.into(),
            type_code,
            total_count: 0,
            unread_count: 0,
        }
    }

    /// Sets the message counts.
    pub fn with_counts(mut self, total: u32, unread: u32) -> Self {
        self.total_count = total;
        self.unread_count = unread;
        self
    }

    /// Returns the decoded folder type.
    pub fn folder_type(&self) -> FolderType {
        FolderType::from_code(self.type_code)
    }

    /// Returns true if this is the account's default inbox.
    pub fn is_primary_inbox(&self) -> bool {
        self.folder_type() == FolderType::Inbox
    }
}

/// Decoded folder type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FolderType {
    /// User-created folder of unspecified content.
    Generic,
    /// Default inbox.
    Inbox,
    /// Drafts.
    Drafts,
    /// Deleted items.
    Deleted,
    /// Sent items.
    Sent,
    /// Outbox.
    Outbox,
    /// Default tasks folder.
    Tasks,
    /// Default calendar.
    Calendar,
    /// Default contacts.
    Contacts,
    /// Default notes.
    Notes,
    /// Journal.
    Journal,
    /// User-created mail folder.
    UserMail,
    /// User-created calendar.
    UserCalendar,
    /// User-created contacts folder.
    UserContacts,
    /// User-created tasks folder.
    UserTasks,
    /// User-created journal.
    UserJournal,
    /// User-created notes folder.
    UserNotes,
    /// Recipient information cache.
    RecipientCache,
    /// Any code the client does not know.
    Unknown(u8),
}

impl FolderType {
    /// Decodes a server type code.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Generic,
            2 => Self::Inbox,
            3 => Self::Drafts,
            4 => Self::Deleted,
            5 => Self::Sent,
            6 => Self::Outbox,
            7 => Self::Tasks,
            8 => Self::Calendar,
            9 => Self::Contacts,
            10 => Self::Notes,
            11 => Self::Journal,
            12 => Self::UserMail,
            13 => Self::UserCalendar,
            14 => Self::UserContacts,
            15 => Self::UserTasks,
            16 => Self::UserJournal,
            17 => Self::UserNotes,
            19 => Self::RecipientCache,
            other => Self::Unknown(other),
        }
    }
}

/// Type codes of folders that carry mail by default.
pub const DEFAULT_MAIL_FOLDER_TYPES: [u8; 7] = [1, 2, 3, 4, 5, 6, 12];

/// Splits a folder list into the folders whose type code is on the allow-list.
///
/// Order of the input is preserved.
pub fn mail_bearing<'a>(folders: &'a [Folder], allowed_types: &[u8]) -> Vec<&'a Folder> {
    folders
        .iter()
        .filter(|folder| allowed_types.contains(&folder.type_code))
        .collect()
}
