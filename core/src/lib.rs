//! Postbox Core Library
//!
//! This crate contains the private messaging logic for Postbox, including:
//! - Domain models (Message, User, ThreadId)
//! - Fan-out and threading of composed messages and replies
//! - Optional machine translation of message bodies
//! - Display rules (free member truncation, translated rendering)
//! - Storage layer (SQLite and in-memory repositories)

pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod notify;
pub mod profile;
pub mod quote;
pub mod render;
pub mod service;
pub mod storage;
pub mod translate;

// Re-export commonly used types
pub use config::Config;
pub use error::{PostboxError, PostboxResult};
pub use mailbox::{Folder, MessageQuery};
pub use message::{Message, ThreadId, User};
pub use notify::{LogNotifier, NoopNotifier, Notice, NoticeKind, Notifier};
pub use profile::{MemoryDirectory, SubscriptionTier, UserDirectory, UserProfile};
pub use render::MessageRenderer;
pub use service::{ComposeRequest, MessageThreadService, ReplyRequest, SendOutcome};
pub use storage::{Database, MemoryStore, MessageRepository};
pub use translate::{TranslationOutcome, Translator};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Postbox";

/// Default data directory name
pub const DATA_DIR_NAME: &str = "postbox";

/// Default database filename
pub const DB_FILENAME: &str = "postbox.db";

/// Words shown to free members before a message body is cut
pub const DEFAULT_TRUNCATE_WORDS: usize = 100;

/// Get the default data directory
pub fn default_data_dir() -> std::path::PathBuf {
    std::env::var("POSTBOX_DATA_DIR")
        .map(std::path::PathBuf::from)
        .or_else(|_| {
            directories::ProjectDirs::from("", "", DATA_DIR_NAME)
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or(std::env::VarError::NotPresent)
        })
        .unwrap_or_else(|_| std::path::PathBuf::from("~/.local/share/postbox"))
}
