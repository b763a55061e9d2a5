//! Mailbox folders and lookup criteria for Postbox

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Message, ThreadId, User};

/// Mailbox folder views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    /// Messages received by the user
    Inbox,
    /// Messages sent by the user
    Outbox,
    /// Messages the user moved to trash
    Trash,
}

impl std::fmt::Display for Folder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Folder::Inbox => write!(f, "inbox"),
            Folder::Outbox => write!(f, "outbox"),
            Folder::Trash => write!(f, "trash"),
        }
    }
}

impl std::str::FromStr for Folder {
    type Err = crate::error::PostboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inbox" => Ok(Folder::Inbox),
            "outbox" | "sent" => Ok(Folder::Outbox),
            "trash" => Ok(Folder::Trash),
            other => Err(crate::error::PostboxError::validation(format!(
                "Unknown folder: {}",
                other
            ))),
        }
    }
}

impl Folder {
    /// Criteria selecting this folder's rows for `user`
    pub fn query_for(&self, user: &User) -> MessageQuery {
        match self {
            Folder::Inbox => MessageQuery::new()
                .owner(user)
                .recipient(user)
                .deleted(false),
            Folder::Outbox => MessageQuery::new()
                .owner(user)
                .sender(user)
                .deleted(false),
            Folder::Trash => MessageQuery::new().owner(user).deleted(true),
        }
    }
}

/// Equality criteria over message rows. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageQuery {
    pub owner: Option<Uuid>,
    pub sender: Option<Uuid>,
    pub recipient: Option<Uuid>,
    pub thread: Option<ThreadId>,
    pub unread: Option<bool>,
    pub deleted: Option<bool>,
}

impl MessageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, user: &User) -> Self {
        self.owner = Some(user.id);
        self
    }

    pub fn sender(mut self, user: &User) -> Self {
        self.sender = Some(user.id);
        self
    }

    pub fn recipient(mut self, user: &User) -> Self {
        self.recipient = Some(user.id);
        self
    }

    pub fn thread(mut self, thread: &ThreadId) -> Self {
        self.thread = Some(thread.clone());
        self
    }

    pub fn unread(mut self, unread: bool) -> Self {
        self.unread = Some(unread);
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Check whether a message satisfies every set criterion
    pub fn matches(&self, message: &Message) -> bool {
        self.owner.map_or(true, |id| message.owner.id == id)
            && self.sender.map_or(true, |id| message.sender.id == id)
            && self.recipient.map_or(true, |id| message.recipient.id == id)
            && self.thread.as_ref().map_or(true, |t| &message.thread == t)
            && self.unread.map_or(true, |u| message.unread == u)
            && self.deleted.map_or(true, |d| message.deleted == d)
    }
}
