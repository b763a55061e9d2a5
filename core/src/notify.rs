//! Delivery notices for received messages

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PostboxResult;
use crate::message::{Message, User};

/// Kind of event a notice announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoticeKind {
    /// A new message arrived
    #[serde(rename = "messages_received")]
    Received,
    /// A reply to one of the user's messages arrived
    #[serde(rename = "messages_reply_received")]
    ReplyReceived,
}

impl NoticeKind {
    /// Stable label used by notification backends
    pub fn label(&self) -> &'static str {
        match self {
            NoticeKind::Received => "messages_received",
            NoticeKind::ReplyReceived => "messages_reply_received",
        }
    }
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A notice for one or more users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub recipients: Vec<User>,
    pub kind: NoticeKind,
    /// The delivered message
    pub message: Message,
    /// Message being replied to, for replies
    pub parent: Option<Message>,
}

impl Notice {
    pub fn received(message: &Message) -> Self {
        Self {
            recipients: vec![message.recipient.clone()],
            kind: NoticeKind::Received,
            message: message.clone(),
            parent: None,
        }
    }

    pub fn reply_received(message: &Message, parent: &Message) -> Self {
        Self {
            recipients: vec![message.recipient.clone()],
            kind: NoticeKind::ReplyReceived,
            message: message.clone(),
            parent: Some(parent.clone()),
        }
    }
}

/// Notification dispatch. Callers treat delivery as best-effort.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &Notice) -> PostboxResult<()>;
}

/// Notifier that drops every notice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notice: &Notice) -> PostboxResult<()> {
        Ok(())
    }
}

/// Notifier that writes each notice to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &Notice) -> PostboxResult<()> {
        let recipients: Vec<&str> = notice.recipients.iter().map(|u| u.username.as_str()).collect();
        tracing::info!(
            kind = notice.kind.label(),
            recipients = %recipients.join(","),
            message_id = %notice.message.id,
            "From: {}\nSubject: {}",
            notice.message.sender,
            notice.message.subject
        );
        Ok(())
    }
}
