//! SQLite message storage for Postbox

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{PostboxError, PostboxResult};
use crate::mailbox::MessageQuery;
use crate::message::{Message, ThreadId, User};
use crate::storage::MessageRepository;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    owner_username TEXT NOT NULL,
    to_list TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    sender_username TEXT NOT NULL,
    recipient_id TEXT NOT NULL,
    recipient_username TEXT NOT NULL,
    thread TEXT NOT NULL,
    parent_id TEXT,
    sent_at INTEGER,
    unread INTEGER NOT NULL DEFAULT 1,
    read_at INTEGER,
    replied_at INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    language TEXT,
    language_translated TEXT,
    body_translated TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_inbox ON messages (owner_id, unread, deleted);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages (thread);
";

const COLUMNS: &str = "id, owner_id, owner_username, to_list, subject, body, sender_id, sender_username, \
    recipient_id, recipient_username, thread, parent_id, sent_at, unread, read_at, replied_at, \
    deleted, deleted_at, language, language_translated, body_translated";

/// Database connection wrapper
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file
    pub async fn new(database_path: PathBuf) -> PostboxResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = Connection::open(&database_path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;",
        )?;
        tracing::debug!("Opened message database at {}", database_path.display());

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> PostboxResult<Self> {
        let connection = Connection::open_in_memory()?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Create the messages table and its indexes if missing
    pub async fn initialize(&self) -> PostboxResult<()> {
        let conn = self.connection.lock().await;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn row_to_message(row: &Row) -> SqliteResult<Message> {
        Ok(Message {
            id: uuid_column(row, 0)?,
            owner: User::with_id(uuid_column(row, 1)?, row.get::<_, String>(2)?),
            to: row.get(3)?,
            subject: row.get(4)?,
            body: row.get(5)?,
            sender: User::with_id(uuid_column(row, 6)?, row.get::<_, String>(7)?),
            recipient: User::with_id(uuid_column(row, 8)?, row.get::<_, String>(9)?),
            thread: ThreadId::from_raw(row.get::<_, String>(10)?),
            parent: optional_uuid_column(row, 11)?,
            sent_at: timestamp_column(row, 12)?,
            unread: row.get(13)?,
            read_at: timestamp_column(row, 14)?,
            replied_at: timestamp_column(row, 15)?,
            deleted: row.get(16)?,
            deleted_at: timestamp_column(row, 17)?,
            language: row.get(18)?,
            language_translated: row.get(19)?,
            body_translated: row.get(20)?,
        })
    }
}

#[async_trait]
impl MessageRepository for Database {
    async fn save(&self, message: &Message) -> PostboxResult<Uuid> {
        let conn = self.connection.lock().await;
        insert_message(&conn, message)?;
        Ok(message.id)
    }

    async fn save_all(&self, messages: &[Message]) -> PostboxResult<()> {
        let mut conn = self.connection.lock().await;

        let tx = conn.transaction()?;
        for message in messages {
            insert_message(&tx, message)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> PostboxResult<Option<Message>> {
        let conn = self.connection.lock().await;

        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM messages WHERE id = ?"))?;
        let result = stmt.query_row([id.to_string()], Self::row_to_message);

        match result {
            Ok(message) => Ok(Some(message)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find(&self, query: &MessageQuery) -> PostboxResult<Vec<Message>> {
        let conn = self.connection.lock().await;

        let (clause, values) = where_clause(query);
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messages{clause} ORDER BY sent_at DESC, rowid DESC"
        ))?;
        let message_iter =
            stmt.query_map(rusqlite::params_from_iter(values.iter()), Self::row_to_message)?;

        let mut messages = Vec::new();
        for message in message_iter {
            messages.push(message?);
        }
        Ok(messages)
    }

    async fn count(&self, query: &MessageQuery) -> PostboxResult<u64> {
        let conn = self.connection.lock().await;

        let (clause, values) = where_clause(query);
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM messages{clause}"),
            rusqlite::params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Insert or replace one message row
fn insert_message(conn: &Connection, message: &Message) -> PostboxResult<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO messages ({COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        params![
            message.id.to_string(),
            message.owner.id.to_string(),
            message.owner.username,
            message.to,
            message.subject,
            message.body,
            message.sender.id.to_string(),
            message.sender.username,
            message.recipient.id.to_string(),
            message.recipient.username,
            message.thread.as_str(),
            message.parent.map(|id| id.to_string()),
            to_nanos(message.sent_at)?,
            message.unread,
            to_nanos(message.read_at)?,
            to_nanos(message.replied_at)?,
            message.deleted,
            to_nanos(message.deleted_at)?,
            message.language,
            message.language_translated,
            message.body_translated,
        ],
    )?;
    Ok(())
}

/// Translate a query into a WHERE clause and its positional parameters
fn where_clause(query: &MessageQuery) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    let ids = [
        ("owner_id", query.owner),
        ("sender_id", query.sender),
        ("recipient_id", query.recipient),
    ];
    for (column, id) in ids {
        if let Some(id) = id {
            conditions.push(format!("{column} = ?"));
            values.push(Value::Text(id.to_string()));
        }
    }
    if let Some(thread) = &query.thread {
        conditions.push("thread = ?".to_string());
        values.push(Value::Text(thread.as_str().to_string()));
    }
    let flags = [("unread", query.unread), ("deleted", query.deleted)];
    for (column, flag) in flags {
        if let Some(flag) = flag {
            conditions.push(format!("{column} = ?"));
            values.push(Value::Integer(flag as i64));
        }
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), values)
    }
}

fn to_nanos(timestamp: Option<OffsetDateTime>) -> PostboxResult<Option<i64>> {
    timestamp
        .map(|dt| {
            i64::try_from(dt.unix_timestamp_nanos())
                .map_err(|_| PostboxError::corrupt(format!("Timestamp out of range: {}", dt)))
        })
        .transpose()
}

fn uuid_column(row: &Row, idx: usize) -> SqliteResult<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_uuid_column(row: &Row, idx: usize) -> SqliteResult<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        Uuid::parse_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn timestamp_column(row: &Row, idx: usize) -> SqliteResult<Option<OffsetDateTime>> {
    let raw: Option<i64> = row.get(idx)?;
    raw.map(|nanos| {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e))
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");
        let database = Database::new(db_path.clone()).await.unwrap();
        database.initialize().await.unwrap();
        // Schema creation is repeatable
        database.initialize().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_message_operations() {
        let database = Database::open_in_memory().await.unwrap();
        database.initialize().await.unwrap();

        let alice = User::new("alice");
        let bob = User::new("bob");
        let mut message = Message::new(bob.clone(), alice.clone(), bob.clone(), "Hello", "Line one\nLine two", ThreadId::new());
        message.to = "bob,carol".to_string();
        message.sent_at = Some(OffsetDateTime::now_utc());
        message.language = Some("en".to_string());
        message.parent = Some(Uuid::new_v4());

        // Create
        let id = database.save(&message).await.unwrap();
        assert_eq!(id, message.id);

        // Get
        let stored = database.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored, message);

        // Update
        message.mark_read();
        database.save(&message).await.unwrap();
        let stored = database.get(message.id).await.unwrap().unwrap();
        assert!(!stored.unread);
        assert_eq!(stored.read_at, message.read_at);

        // Missing
        assert!(database.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_and_count() {
        let database = Database::open_in_memory().await.unwrap();
        database.initialize().await.unwrap();

        let alice = User::new("alice");
        let bob = User::new("bob");
        let thread = ThreadId::new();

        let mut older = Message::new(bob.clone(), alice.clone(), bob.clone(), "First", "Body", thread.clone());
        older.sent_at = Some(OffsetDateTime::now_utc() - time::Duration::minutes(5));
        let mut newer = Message::new(bob.clone(), alice.clone(), bob.clone(), "Second", "Body", thread.clone());
        newer.sent_at = Some(OffsetDateTime::now_utc());
        let mut sent = Message::new(alice.clone(), alice.clone(), bob.clone(), "First", "Body", thread.clone());
        sent.unread = false;

        for message in [&older, &newer, &sent] {
            database.save(message).await.unwrap();
        }

        let inbox = MessageQuery::new().owner(&bob).recipient(&bob).deleted(false);
        let found = database.find(&inbox).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, newer.id);
        assert_eq!(found[1].id, older.id);

        let unread = inbox.clone().unread(true);
        assert_eq!(database.count(&unread).await.unwrap(), 2);
        assert_eq!(database.count(&MessageQuery::new().thread(&thread)).await.unwrap(), 3);

        let own_copy = MessageQuery::new().owner(&alice).sender(&alice).recipient(&bob).thread(&thread);
        assert_eq!(database.find_one(&own_copy).await.unwrap().map(|m| m.id), Some(sent.id));
    }

    #[tokio::test]
    async fn test_save_all_is_atomic() {
        let database = Database::open_in_memory().await.unwrap();
        database.initialize().await.unwrap();

        let alice = User::new("alice");
        let bob = User::new("bob");
        let carol = User::new("carol");
        let thread = ThreadId::new();

        let mut sent = Message::new(alice.clone(), alice.clone(), bob.clone(), "Hi", "Body", thread.clone());
        sent.sent_at = Some(OffsetDateTime::now_utc());
        let bobs_copy = sent.clone_for(&bob);
        let mut carols_copy = sent.clone_for(&carol);
        // Past the range of i64 unix nanos, so this row cannot be written
        carols_copy.sent_at = Some(OffsetDateTime::from_unix_timestamp(10_413_792_000).unwrap());

        let result = database.save_all(&[sent.clone(), bobs_copy.clone(), carols_copy]).await;
        assert!(result.is_err());
        assert_eq!(database.count(&MessageQuery::new().thread(&thread)).await.unwrap(), 0);

        database.save_all(&[sent, bobs_copy]).await.unwrap();
        assert_eq!(database.count(&MessageQuery::new().thread(&thread)).await.unwrap(), 2);
    }
}
