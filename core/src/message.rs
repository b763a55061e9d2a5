//! Message records for Postbox
//!
//! Every compose or reply action produces one row per mailbox: the sender's
//! own copy (the canonical record) and one clone per recipient. All rows of a
//! conversation share a [`ThreadId`].

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A messaging user as seen by the mailbox layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Stable user ID
    pub id: Uuid,
    /// Unique username, used in display lists
    pub username: String,
}

impl User {
    /// Create a user with a fresh ID
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
        }
    }

    /// Create a user with a known ID
    pub fn with_id(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}

/// Opaque conversation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Generate a new random thread ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing (stored) thread ID
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ThreadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A private message row living in one user's mailbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,
    /// Mailbox owner
    pub owner: User,
    /// Recipient usernames, comma separated
    pub to: String,
    /// Subject
    pub subject: String,
    /// Body text
    pub body: String,
    /// Original author
    pub sender: User,
    /// The single user this row is addressed to
    pub recipient: User,
    /// Conversation this row belongs to
    pub thread: ThreadId,
    /// Message this row replies to, within the owner's mailbox
    pub parent: Option<Uuid>,
    /// Send time
    pub sent_at: Option<OffsetDateTime>,
    /// Unread flag
    pub unread: bool,
    /// Time the owner read the message
    pub read_at: Option<OffsetDateTime>,
    /// Time this row was created as a reply
    pub replied_at: Option<OffsetDateTime>,
    /// Soft delete flag
    pub deleted: bool,
    /// Soft delete time
    pub deleted_at: Option<OffsetDateTime>,
    /// Language the body was written in
    pub language: Option<String>,
    /// Language `body_translated` is in
    pub language_translated: Option<String>,
    /// Machine-translated body
    pub body_translated: Option<String>,
}

impl Message {
    /// Create a new unread message owned by `owner`
    pub fn new(
        owner: User,
        sender: User,
        recipient: User,
        subject: impl Into<String>,
        body: impl Into<String>,
        thread: ThreadId,
    ) -> Self {
        let to = recipient.username.clone();
        Self {
            id: Uuid::new_v4(),
            owner,
            to,
            subject: subject.into(),
            body: body.into(),
            sender,
            recipient,
            thread,
            parent: None,
            sent_at: None,
            unread: true,
            read_at: None,
            replied_at: None,
            deleted: false,
            deleted_at: None,
            language: None,
            language_translated: None,
            body_translated: None,
        }
    }

    /// Build the copy of this message that lands in `recipient`'s mailbox.
    ///
    /// Shared fields (subject, body, thread, send time, translation) are
    /// copied verbatim; mailbox state starts fresh.
    pub fn clone_for(&self, recipient: &User) -> Self {
        let mut clone = Message::new(
            recipient.clone(),
            self.sender.clone(),
            recipient.clone(),
            self.subject.clone(),
            self.body.clone(),
            self.thread.clone(),
        );
        clone.sent_at = self.sent_at;
        clone.language = self.language.clone();
        clone.language_translated = self.language_translated.clone();
        clone.body_translated = self.body_translated.clone();
        clone
    }

    /// Whether the owner has not opened the message yet
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }

    /// Whether this row was written as a reply
    pub fn replied(&self) -> bool {
        self.replied_at.is_some()
    }

    /// Whether a translated body is available
    pub fn has_translation(&self) -> bool {
        self.body_translated
            .as_deref()
            .map(|body| !body.is_empty())
            .unwrap_or(false)
    }

    /// Usernames from the display `to` list
    pub fn recipient_names(&self) -> Vec<&str> {
        self.to
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn mark_read(&mut self) {
        self.unread = false;
        self.read_at = Some(OffsetDateTime::now_utc());
    }

    pub fn mark_unread(&mut self) {
        self.unread = true;
        self.read_at = None;
    }

    pub fn move_to_trash(&mut self) {
        self.deleted = true;
        self.deleted_at = Some(OffsetDateTime::now_utc());
    }

    pub fn undelete(&mut self) {
        self.deleted = false;
        self.deleted_at = None;
    }
}
