//! In-memory message store

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::error::PostboxResult;
use crate::mailbox::MessageQuery;
use crate::message::Message;
use crate::storage::MessageRepository;

/// Message store kept entirely in memory, in insertion order
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<IndexMap<Uuid, Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows, deleted ones included
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Snapshot of every stored row in insertion order
    pub fn all(&self) -> Vec<Message> {
        self.messages.read().values().cloned().collect()
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn save(&self, message: &Message) -> PostboxResult<Uuid> {
        self.messages.write().insert(message.id, message.clone());
        Ok(message.id)
    }

    async fn save_all(&self, messages: &[Message]) -> PostboxResult<()> {
        let mut stored = self.messages.write();
        for message in messages {
            stored.insert(message.id, message.clone());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PostboxResult<Option<Message>> {
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn find(&self, query: &MessageQuery) -> PostboxResult<Vec<Message>> {
        let mut found: Vec<Message> = self
            .messages
            .read()
            .values()
            .rev()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        found.sort_by_key(|m| Reverse(m.sent_at));
        Ok(found)
    }

    async fn count(&self, query: &MessageQuery) -> PostboxResult<u64> {
        let count = self
            .messages
            .read()
            .values()
            .filter(|m| query.matches(m))
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ThreadId, User};

    #[tokio::test]
    async fn test_save_replaces_existing_row() {
        let store = MemoryStore::new();
        let alice = User::new("alice");
        let bob = User::new("bob");
        let mut message = Message::new(bob.clone(), alice, bob.clone(), "Hi", "Body", ThreadId::new());

        store.save(&message).await.unwrap();
        message.mark_read();
        store.save(&message).await.unwrap();

        assert_eq!(store.len(), 1);
        let stored = store.get(message.id).await.unwrap().unwrap();
        assert!(!stored.unread);
    }

    #[tokio::test]
    async fn test_find_one_requires_single_match() {
        let store = MemoryStore::new();
        let alice = User::new("alice");
        let bob = User::new("bob");
        let thread = ThreadId::new();

        let query = MessageQuery::new().owner(&bob).thread(&thread);
        assert!(store.find_one(&query).await.unwrap().is_none());

        let first = Message::new(bob.clone(), alice.clone(), bob.clone(), "Hi", "One", thread.clone());
        store.save(&first).await.unwrap();
        assert_eq!(store.find_one(&query).await.unwrap().map(|m| m.id), Some(first.id));

        let second = Message::new(bob.clone(), alice, bob.clone(), "Hi", "Two", thread);
        store.save(&second).await.unwrap();
        assert!(store.find_one(&query).await.unwrap().is_none());
        assert_eq!(store.count(&query).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_save_all_stores_every_row() {
        let store = MemoryStore::new();
        let alice = User::new("alice");
        let bob = User::new("bob");
        let carol = User::new("carol");
        let sent = Message::new(alice.clone(), alice, bob.clone(), "Hi", "Body", ThreadId::new());

        store
            .save_all(&[sent.clone(), sent.clone_for(&bob), sent.clone_for(&carol)])
            .await
            .unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.count(&MessageQuery::new().thread(&sent.thread)).await.unwrap(), 3);
    }
}
