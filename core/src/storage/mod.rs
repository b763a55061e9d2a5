//! Storage layer for Postbox

pub mod database;
pub mod memory;

pub use database::Database;
pub use memory::MemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PostboxResult;
use crate::mailbox::MessageQuery;
use crate::message::Message;

/// Persistence of message rows
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert or replace a message, returning its ID
    async fn save(&self, message: &Message) -> PostboxResult<Uuid>;

    /// Insert or replace several messages at once. Either every row is
    /// stored or none is.
    async fn save_all(&self, messages: &[Message]) -> PostboxResult<()>;

    /// Get a message by ID
    async fn get(&self, id: Uuid) -> PostboxResult<Option<Message>>;

    /// All messages matching `query`, newest first
    async fn find(&self, query: &MessageQuery) -> PostboxResult<Vec<Message>>;

    /// Number of messages matching `query`
    async fn count(&self, query: &MessageQuery) -> PostboxResult<u64>;

    /// The single message matching `query`.
    ///
    /// Returns `None` when nothing or more than one row matches.
    async fn find_one(&self, query: &MessageQuery) -> PostboxResult<Option<Message>> {
        let mut matches = self.find(query).await?;
        if matches.len() == 1 {
            Ok(matches.pop())
        } else {
            if matches.len() > 1 {
                tracing::debug!("Lookup matched {} messages, expected one", matches.len());
            }
            Ok(None)
        }
    }
}
