//! Postbox - Main application entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use postbox_core::{Config, Database, LogNotifier, MemoryDirectory, MessageThreadService};

mod commands;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database file, overrides the configured one
    #[arg(long)]
    database: Option<PathBuf>,

    /// User directory file with `[[users]]` entries
    #[arg(long, default_value = "users.toml")]
    users: PathBuf,

    /// Username to act as
    #[arg(short, long = "as")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a new conversation
    Compose {
        /// Comma separated recipient usernames
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        /// Language the body is written in
        #[arg(long)]
        language: Option<String>,
        /// Build the messages without storing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Reply to a message in your mailbox
    Reply {
        id: uuid::Uuid,
        /// Comma separated recipient usernames, defaults to the parent's sender
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        /// Defaults to the quoted parent body
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        language: Option<String>,
    },
    /// List a folder: inbox, outbox or trash
    List {
        #[arg(default_value = "inbox")]
        folder: String,
    },
    /// Show the number of unread messages
    Count,
    /// Open a message and mark it read
    Show {
        id: uuid::Uuid,
        /// Show the translated body when there is one
        #[arg(long)]
        translated: bool,
    },
    /// Show every message of a thread in your mailbox
    Thread { id: uuid::Uuid },
    /// Move a message to the trash
    Trash { id: uuid::Uuid },
    /// Take a message out of the trash
    Restore { id: uuid::Uuid },
    /// Mark a message unread again
    Unread { id: uuid::Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(database) = &args.database {
        config.storage.database_path = Some(database.clone());
    }
    config.validate()?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.app.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("Starting {} v{}", postbox_core::APP_NAME, postbox_core::VERSION);

    let directory = Arc::new(
        MemoryDirectory::load(&args.users)
            .with_context(|| format!("Failed to load users from {}", args.users.display()))?,
    );

    let database_path = config.database_file_path();
    let database = Database::new(database_path.clone()).await?;
    database.initialize().await?;
    info!("Using database {}", database_path.display());

    // No translation provider ships with the CLI
    if config.translation.enabled {
        debug!("No translation provider configured, sending bodies as written");
    }
    let service = MessageThreadService::from_config(&config, Arc::new(database), directory.clone())
        .with_notifier(Arc::new(LogNotifier));

    let user = commands::current_user(directory.as_ref(), &args.user).await?;
    commands::run(&service, &user, args.command).await
}
