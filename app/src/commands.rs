//! Subcommand handlers

use anyhow::{bail, Context};
use time::format_description::well_known::Rfc3339;

use postbox_core::{
    ComposeRequest, Folder, Message, MessageThreadService, ReplyRequest, User, UserDirectory,
};

use crate::Command;

/// Resolve the acting user
pub async fn current_user(directory: &dyn UserDirectory, username: &str) -> anyhow::Result<User> {
    match directory.find_by_username(username).await? {
        Some(user) => Ok(user),
        None => bail!("Unknown user: {}", username),
    }
}

pub async fn run(service: &MessageThreadService, user: &User, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Compose {
            to,
            subject,
            body,
            language,
            dry_run,
        } => {
            let recipients = service.resolve_recipients(&to).await?;
            let request = ComposeRequest {
                recipients,
                subject,
                body,
                language,
            };
            let outcome = service.compose(user, request, !dry_run).await?;
            let delivered: Vec<&str> = outcome
                .delivered_to()
                .into_iter()
                .map(|u| u.username.as_str())
                .collect();
            if dry_run {
                println!("Would deliver to: {}", delivered.join(", "));
            } else {
                println!("Message {} sent to: {}", outcome.sent.id, delivered.join(", "));
            }
            println!("Thread: {}", outcome.thread());
        }
        Command::Reply {
            id,
            to,
            subject,
            body,
            language,
        } => {
            let parent = service
                .open(user, id)
                .await
                .with_context(|| format!("Cannot reply to {}", id))?;
            let recipients = match to {
                Some(names) => Some(service.resolve_recipients(&names).await?),
                None => None,
            };
            let request = ReplyRequest {
                recipients,
                subject,
                body,
                language,
            };
            let outcome = service.reply(user, &parent, request, true).await?;
            println!("Reply {} sent in thread {}", outcome.sent.id, outcome.thread());
        }
        Command::List { folder } => {
            let folder: Folder = folder.parse()?;
            let messages = service.list(folder, user).await?;
            if messages.is_empty() {
                println!("{} is empty", folder);
            }
            for message in &messages {
                print_summary(message);
            }
        }
        Command::Count => match service.inbox_count(Some(user)).await {
            Some(count) => println!("{}", count),
            None => println!(),
        },
        Command::Show { id, translated } => {
            let message = service.open(user, id).await?;
            print_summary(&message);
            println!("To: {}", message.to);
            println!();
            println!("{}", service.render_for(&message, translated, user).await);
        }
        Command::Thread { id } => {
            let message = service.open(user, id).await?;
            for entry in service.conversation(user, &message.thread).await? {
                print_summary(&entry);
            }
        }
        Command::Trash { id } => {
            service.trash(user, id).await?;
            println!("Moved {} to trash", id);
        }
        Command::Restore { id } => {
            service.restore(user, id).await?;
            println!("Restored {}", id);
        }
        Command::Unread { id } => {
            service.mark_unread(user, id).await?;
            println!("Marked {} unread", id);
        }
    }
    Ok(())
}

fn print_summary(message: &Message) {
    let sent_at = message
        .sent_at
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".to_string());
    let flag = if message.unread { "*" } else { " " };
    println!(
        "{} {}  {:<12} {:<30} {}",
        flag, message.id, message.sender.username, message.subject, sent_at
    );
}
