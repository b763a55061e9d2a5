//! Message thread service
//!
//! Turns compose and reply actions into the set of rows to persist: one
//! sender-owned canonical record plus one clone per recipient, all sharing a
//! thread. Also answers the display questions (inbox count, body rendering)
//! and the mailbox actions (list, open, trash, restore).

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{PostboxError, PostboxResult};
use crate::mailbox::{Folder, MessageQuery};
use crate::message::{Message, ThreadId, User};
use crate::notify::{NoopNotifier, Notice, Notifier};
use crate::profile::{UserDirectory, UserProfile};
use crate::quote::{format_quote, quote_subject};
use crate::render::MessageRenderer;
use crate::storage::MessageRepository;
use crate::translate::{fill_translation, Translator};

/// Predicate deciding whether a user may receive messages
pub type RecipientFilter = Arc<dyn Fn(&User) -> bool + Send + Sync>;

/// A new conversation
#[derive(Debug, Clone, Default)]
pub struct ComposeRequest {
    pub recipients: Vec<User>,
    pub subject: String,
    pub body: String,
    /// Language the body is written in
    pub language: Option<String>,
}

impl ComposeRequest {
    pub fn new(recipients: Vec<User>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
            language: None,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A reply to an existing message. Unset fields fall back to defaults
/// derived from the parent.
#[derive(Debug, Clone, Default)]
pub struct ReplyRequest {
    pub recipients: Option<Vec<User>>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub language: Option<String>,
}

impl ReplyRequest {
    /// Reply with the given body and every other field defaulted
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// The initial reply form for `parent`: its sender, a "Re: " subject and
    /// the quoted body
    pub fn prefilled(parent: &Message) -> Self {
        Self {
            recipients: Some(vec![parent.sender.clone()]),
            subject: Some(quote_subject(&parent.subject)),
            body: Some(format_quote(&parent.sender, &parent.body)),
            language: None,
        }
    }
}

/// Rows produced by a compose or reply
#[derive(Debug, Clone)]
pub struct SendOutcome {
    /// The sender-owned canonical record
    pub sent: Message,
    /// One copy per recipient other than the sender
    pub copies: Vec<Message>,
}

impl SendOutcome {
    pub fn into_parts(self) -> (Message, Vec<Message>) {
        (self.sent, self.copies)
    }

    /// Owners of the recipient copies
    pub fn delivered_to(&self) -> Vec<&User> {
        self.copies.iter().map(|copy| &copy.owner).collect()
    }

    pub fn thread(&self) -> &ThreadId {
        &self.sent.thread
    }
}

/// Compose, reply and mailbox operations over a message repository
pub struct MessageThreadService {
    repository: Arc<dyn MessageRepository>,
    directory: Arc<dyn UserDirectory>,
    translator: Option<Arc<dyn Translator>>,
    notifier: Arc<dyn Notifier>,
    renderer: MessageRenderer,
    translation_timeout: Duration,
    translation_enabled: bool,
    notifications_enabled: bool,
    recipient_filter: Option<RecipientFilter>,
}

impl MessageThreadService {
    /// Create a service with default settings, no translator and a no-op
    /// notifier
    pub fn new(repository: Arc<dyn MessageRepository>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            repository,
            directory,
            translator: None,
            notifier: Arc::new(NoopNotifier),
            renderer: MessageRenderer::default(),
            translation_timeout: Duration::from_secs(10),
            translation_enabled: true,
            notifications_enabled: true,
            recipient_filter: None,
        }
    }

    /// Create a service using the display, translation and notification
    /// settings of `config`
    pub fn from_config(
        config: &Config,
        repository: Arc<dyn MessageRepository>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let mut service = Self::new(repository, directory);
        service.renderer = MessageRenderer::new(config.display.free_member_truncate_words);
        service.translation_timeout = config.translation.timeout();
        service.translation_enabled = config.translation.enabled;
        service.notifications_enabled = config.notifications.enabled;
        service
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Reject recipients for which `filter` returns false
    pub fn with_recipient_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&User) -> bool + Send + Sync + 'static,
    {
        self.recipient_filter = Some(Arc::new(filter));
        self
    }

    pub fn renderer(&self) -> &MessageRenderer {
        &self.renderer
    }

    /// Start a new conversation.
    ///
    /// With `commit` false the rows are built and returned but nothing is
    /// stored and nobody is notified.
    pub async fn compose(
        &self,
        sender: &User,
        request: ComposeRequest,
        commit: bool,
    ) -> PostboxResult<SendOutcome> {
        self.validate(&request.recipients, &request.subject, &request.body)
            .await?;

        let mut sent = self.canonical_record(sender, &request.recipients, request.subject, request.body, ThreadId::new());
        sent.language = request.language;
        self.translate_for_primary(&mut sent, &request.recipients[0]).await;

        let copies: Vec<Message> = request
            .recipients
            .iter()
            .filter(|recipient| recipient.id != sender.id)
            .map(|recipient| sent.clone_for(recipient))
            .collect();

        let outcome = SendOutcome { sent, copies };
        if commit {
            self.commit(&outcome, None).await?;
        }
        Ok(outcome)
    }

    /// Reply to `parent`, which must live in `sender`'s mailbox.
    ///
    /// The reply joins the parent's thread. Each recipient copy is linked to
    /// the message it answers in that recipient's own mailbox when exactly
    /// one such message exists.
    pub async fn reply(
        &self,
        sender: &User,
        parent: &Message,
        request: ReplyRequest,
        commit: bool,
    ) -> PostboxResult<SendOutcome> {
        if parent.owner.id != sender.id {
            return Err(PostboxError::not_found(format!(
                "Message {} in mailbox of {}",
                parent.id, sender
            )));
        }

        let recipients = request
            .recipients
            .unwrap_or_else(|| vec![parent.sender.clone()]);
        let subject = request
            .subject
            .unwrap_or_else(|| quote_subject(&parent.subject));
        let body = request
            .body
            .unwrap_or_else(|| format_quote(&parent.sender, &parent.body));
        self.validate(&recipients, &subject, &body).await?;

        let replied_at = OffsetDateTime::now_utc();
        let mut sent = self.canonical_record(sender, &recipients, subject, body, parent.thread.clone());
        sent.language = request.language;
        sent.replied_at = Some(replied_at);
        sent.parent = Some(parent.id);
        self.translate_for_primary(&mut sent, &recipients[0]).await;

        let mut copies = Vec::with_capacity(recipients.len());
        for recipient in recipients.iter().filter(|r| r.id != sender.id) {
            let mut copy = sent.clone_for(recipient);
            copy.replied_at = Some(replied_at);
            copy.parent = self.resolve_parent(recipient, sender, &parent.thread).await;
            copies.push(copy);
        }

        let outcome = SendOutcome { sent, copies };
        if commit {
            self.commit(&outcome, Some(parent)).await?;
        }
        Ok(outcome)
    }

    /// Number of unread, undeleted messages in the inbox of `user`.
    ///
    /// `None` for anonymous viewers and when the count cannot be read.
    pub async fn inbox_count(&self, user: Option<&User>) -> Option<u64> {
        let user = user?;
        let query = Folder::Inbox.query_for(user).unread(true);
        match self.repository.count(&query).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Failed to count inbox of {}: {}", user, e);
                None
            }
        }
    }

    /// Render a body for a viewer with a known profile
    pub fn render_message(
        &self,
        message: &Message,
        prefer_translated: bool,
        viewer: Option<&UserProfile>,
    ) -> String {
        self.renderer.render(message, prefer_translated, viewer)
    }

    /// Render a body for `viewer`, looking up their profile.
    ///
    /// A profile that cannot be found renders as the free tier.
    pub async fn render_for(&self, message: &Message, prefer_translated: bool, viewer: &User) -> String {
        let profile = match self.directory.profile(viewer).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!("No profile for {}, rendering as free tier: {}", viewer, e);
                None
            }
        };
        self.renderer.render(message, prefer_translated, profile.as_ref())
    }

    /// Messages in one folder of `user`'s mailbox, newest first
    pub async fn list(&self, folder: Folder, user: &User) -> PostboxResult<Vec<Message>> {
        self.repository.find(&folder.query_for(user)).await
    }

    /// Undeleted rows of one thread in `user`'s mailbox, newest first
    pub async fn conversation(&self, user: &User, thread: &ThreadId) -> PostboxResult<Vec<Message>> {
        let query = MessageQuery::new().owner(user).thread(thread).deleted(false);
        self.repository.find(&query).await
    }

    /// Fetch a message from `user`'s mailbox and mark it read
    pub async fn open(&self, user: &User, id: Uuid) -> PostboxResult<Message> {
        let mut message = self.owned_message(user, id).await?;
        if message.unread {
            message.mark_read();
            self.repository.save(&message).await?;
            debug!("Message {} read by {}", message.id, user);
        }
        Ok(message)
    }

    pub async fn mark_unread(&self, user: &User, id: Uuid) -> PostboxResult<Message> {
        let mut message = self.owned_message(user, id).await?;
        message.mark_unread();
        self.repository.save(&message).await?;
        Ok(message)
    }

    /// Move a message of `user` to the trash
    pub async fn trash(&self, user: &User, id: Uuid) -> PostboxResult<Message> {
        let mut message = self.owned_message(user, id).await?;
        if message.deleted {
            return Err(PostboxError::invalid_state(format!("Message {} is already in the trash", id)));
        }
        message.move_to_trash();
        self.repository.save(&message).await?;
        info!("Message {} moved to trash by {}", id, user);
        Ok(message)
    }

    /// Take a message of `user` back out of the trash
    pub async fn restore(&self, user: &User, id: Uuid) -> PostboxResult<Message> {
        let mut message = self.owned_message(user, id).await?;
        if !message.deleted {
            return Err(PostboxError::invalid_state(format!("Message {} is not in the trash", id)));
        }
        message.undelete();
        self.repository.save(&message).await?;
        info!("Message {} restored by {}", id, user);
        Ok(message)
    }

    /// Parse a comma separated username list into users.
    ///
    /// Duplicates keep their first position. Unknown names and names refused
    /// by the recipient filter are reported together.
    pub async fn resolve_recipients(&self, usernames: &str) -> PostboxResult<Vec<User>> {
        let mut users: Vec<User> = Vec::new();
        let mut invalid: Vec<&str> = Vec::new();

        for name in usernames.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match self.directory.find_by_username(name).await? {
                Some(user) if self.accepts(&user) => {
                    if !users.iter().any(|u| u.id == user.id) {
                        users.push(user);
                    }
                }
                _ => {
                    if !invalid.contains(&name) {
                        invalid.push(name);
                    }
                }
            }
        }

        if !invalid.is_empty() {
            return Err(PostboxError::validation(format!(
                "The following usernames are incorrect: {}",
                invalid.join(", ")
            )));
        }
        if users.is_empty() {
            return Err(PostboxError::validation("At least one recipient is required"));
        }
        Ok(users)
    }

    fn accepts(&self, user: &User) -> bool {
        self.recipient_filter
            .as_ref()
            .map_or(true, |filter| filter(user))
    }

    /// Check a send before any row is built. Every recipient must be a
    /// directory user accepted by the recipient filter.
    async fn validate(&self, recipients: &[User], subject: &str, body: &str) -> PostboxResult<()> {
        if recipients.is_empty() {
            return Err(PostboxError::validation("At least one recipient is required"));
        }

        let mut invalid: Vec<&str> = Vec::new();
        for (i, recipient) in recipients.iter().enumerate() {
            if recipients[..i].iter().any(|r| r.id == recipient.id) {
                return Err(PostboxError::validation(format!("Duplicate recipient: {}", recipient)));
            }
            let known = match self.directory.find_by_username(&recipient.username).await? {
                Some(user) => user.id == recipient.id,
                None => false,
            };
            if !known || !self.accepts(recipient) {
                invalid.push(recipient.username.as_str());
            }
        }
        if !invalid.is_empty() {
            return Err(PostboxError::validation(format!(
                "The following usernames are incorrect: {}",
                invalid.join(", ")
            )));
        }

        if subject.trim().is_empty() {
            return Err(PostboxError::validation("Message subject cannot be empty"));
        }
        if body.trim().is_empty() {
            return Err(PostboxError::validation("Message body cannot be empty"));
        }
        Ok(())
    }

    fn canonical_record(
        &self,
        sender: &User,
        recipients: &[User],
        subject: String,
        body: String,
        thread: ThreadId,
    ) -> Message {
        let mut sent = Message::new(
            sender.clone(),
            sender.clone(),
            recipients[0].clone(),
            subject,
            body,
            thread,
        );
        sent.to = recipients
            .iter()
            .map(|r| r.username.as_str())
            .collect::<Vec<_>>()
            .join(",");
        sent.sent_at = Some(OffsetDateTime::now_utc());
        // The sender's own copy starts read
        sent.unread = false;
        sent
    }

    async fn translate_for_primary(&self, message: &mut Message, primary: &User) {
        let Some(translator) = self.translator.as_ref().filter(|_| self.translation_enabled) else {
            return;
        };
        if message.language.is_none() {
            return;
        }

        let profile = match self.directory.profile(primary).await {
            Ok(profile) => profile,
            Err(e) => {
                debug!("No profile for {}, skipping translation: {}", primary, e);
                return;
            }
        };
        let outcome = fill_translation(message, profile.as_ref(), &**translator, self.translation_timeout).await;
        debug!("Translation for {}: {:?}", primary, outcome);
    }

    /// The message in `owner`'s mailbox that a reply from `replier` answers
    async fn resolve_parent(&self, owner: &User, replier: &User, thread: &ThreadId) -> Option<Uuid> {
        let query = MessageQuery::new()
            .owner(owner)
            .sender(owner)
            .recipient(replier)
            .thread(thread)
            .deleted(false);
        match self.repository.find_one(&query).await {
            Ok(Some(message)) => Some(message.id),
            Ok(None) => {
                debug!("No single message of {} to link reply from {} to", owner, replier);
                None
            }
            Err(e) => {
                warn!("Failed to resolve parent for {}: {}", owner, e);
                None
            }
        }
    }

    async fn owned_message(&self, user: &User, id: Uuid) -> PostboxResult<Message> {
        match self.repository.get(id).await? {
            Some(message) if message.owner.id == user.id => Ok(message),
            _ => Err(PostboxError::not_found(format!("Message {} in mailbox of {}", id, user))),
        }
    }

    async fn commit(&self, outcome: &SendOutcome, parent: Option<&Message>) -> PostboxResult<()> {
        let mut rows = Vec::with_capacity(outcome.copies.len() + 1);
        rows.push(outcome.sent.clone());
        rows.extend(outcome.copies.iter().cloned());
        self.repository.save_all(&rows).await?;

        info!(
            thread = %outcome.sent.thread,
            copies = outcome.copies.len(),
            "Message {} sent by {} to {}",
            outcome.sent.id,
            outcome.sent.sender,
            outcome.sent.to
        );

        if !self.notifications_enabled {
            return Ok(());
        }
        for copy in &outcome.copies {
            let notice = match parent {
                Some(parent) => Notice::reply_received(copy, parent),
                None => Notice::received(copy),
            };
            if let Err(e) = self.notifier.notify(&notice).await {
                warn!("Failed to notify {} of message {}: {}", copy.owner, copy.id, e);
            }
        }
        Ok(())
    }
}
