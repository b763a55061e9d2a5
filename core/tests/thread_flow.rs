//! End to end compose / reply flow against a SQLite database

use std::sync::Arc;

use postbox_core::{
    ComposeRequest, Database, Folder, MemoryDirectory, MessageRepository, MessageThreadService,
    ReplyRequest, SubscriptionTier, UserProfile,
};
use tempfile::TempDir;

async fn open_database(dir: &TempDir) -> Arc<Database> {
    let database = Database::new(dir.path().join("postbox.db")).await.unwrap();
    database.initialize().await.unwrap();
    Arc::new(database)
}

#[tokio::test]
async fn test_alice_bob_carol_thread() {
    let temp_dir = TempDir::new().unwrap();
    let database = open_database(&temp_dir).await;

    let directory = Arc::new(MemoryDirectory::new());
    let alice = directory.add("alice", None);
    let bob = directory.add(
        "bob",
        Some(UserProfile {
            preferred_language: None,
            subscription: Some(SubscriptionTier::Paid),
        }),
    );
    let carol = directory.add("carol", None);

    let service = MessageThreadService::new(database.clone(), directory.clone());

    // alice writes to bob and carol: three rows, one thread
    let recipients = service.resolve_recipients("bob, carol").await.unwrap();
    let original = service
        .compose(&alice, ComposeRequest::new(recipients, "Lunch", "Noon at the usual place?"), true)
        .await
        .unwrap();
    let thread = original.thread().clone();

    for user in [&alice, &bob, &carol] {
        let rows = service.conversation(user, &thread).await.unwrap();
        assert_eq!(rows.len(), 1, "{} should hold one row", user);
    }
    assert_eq!(service.inbox_count(Some(&bob)).await, Some(1));
    assert_eq!(service.inbox_count(Some(&carol)).await, Some(1));
    assert_eq!(service.inbox_count(Some(&alice)).await, Some(0));

    // bob reads and replies
    let inbox = service.list(Folder::Inbox, &bob).await.unwrap();
    let bobs_copy = service.open(&bob, inbox[0].id).await.unwrap();
    assert_eq!(service.inbox_count(Some(&bob)).await, Some(0));

    let reply = service
        .reply(&bob, &bobs_copy, ReplyRequest::with_body("Sounds good"), true)
        .await
        .unwrap();
    assert_eq!(reply.sent.thread, thread);
    assert_eq!(reply.copies.len(), 1);

    let alices_copy = database.get(reply.copies[0].id).await.unwrap().unwrap();
    assert_eq!(alices_copy.owner, alice);
    assert_eq!(alices_copy.thread, thread);
    assert_eq!(alices_copy.subject, "Re: Lunch");
    assert_eq!(alices_copy.parent, Some(original.sent.id));
    assert_eq!(alices_copy.replied_at, reply.sent.replied_at);
    assert_eq!(service.inbox_count(Some(&alice)).await, Some(1));

    let alice_thread = service.conversation(&alice, &thread).await.unwrap();
    assert_eq!(alice_thread.len(), 2);

    // carol trashes her copy; the row stays stored
    let carols_copy = service.list(Folder::Inbox, &carol).await.unwrap().remove(0);
    service.trash(&carol, carols_copy.id).await.unwrap();
    assert_eq!(service.inbox_count(Some(&carol)).await, Some(0));
    assert_eq!(service.list(Folder::Trash, &carol).await.unwrap().len(), 1);
    assert!(database.get(carols_copy.id).await.unwrap().unwrap().deleted);
}

#[tokio::test]
async fn test_rows_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let directory = Arc::new(MemoryDirectory::new());
    let alice = directory.add("alice", None);
    let bob = directory.add("bob", None);

    let sent = {
        let database = open_database(&temp_dir).await;
        let service = MessageThreadService::new(database, directory.clone());
        service
            .compose(
                &alice,
                ComposeRequest::new(vec![bob.clone()], "Minutes", "Line one\nLine two").language("en"),
                true,
            )
            .await
            .unwrap()
    };

    let database = open_database(&temp_dir).await;
    let service = MessageThreadService::new(database.clone(), directory);

    let stored = database.get(sent.sent.id).await.unwrap().unwrap();
    assert_eq!(stored, sent.sent);

    let inbox = service.list(Folder::Inbox, &bob).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].language.as_deref(), Some("en"));
    assert_eq!(
        service.render_for(&inbox[0], true, &bob).await,
        "Line one<br />Line two"
    );
}
