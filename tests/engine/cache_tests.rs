//! Fast-cache repair, outages and durable-store failures

use std::time::Duration;

use pretty_assertions::assert_eq;

use chat_core::domain::Dispatched;
use chat_core::infrastructure::cache::{keys, message_codec, FastCache};
use chat_core::shared::error::AppError;

use crate::common::{TestApp, ALICE, BOB, CAROL};

#[tokio::test]
async fn test_state_is_rebuilt_after_flush() {
    let app = TestApp::new();
    let chat = app.chat();
    let first = app.room_with("first", &[ALICE, BOB]).await;
    let second = app.room_with("second", &[ALICE]).await;
    chat.send_message(first.id, ALICE, "one", "TALK").await.unwrap();
    chat.send_message(first.id, BOB, "two", "TALK").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    chat.send_message(second.id, ALICE, "three", "TALK").await.unwrap();
    chat.get_messages(first.id, 0, 10, BOB).await.unwrap();

    let room = chat.get_room(first.id).await.unwrap();
    let page = chat.page(first.id, 0, 10).await.unwrap();
    let rooms = chat.list_rooms_for_user(ALICE).await.unwrap();
    let read_count = chat.get_read_count(first.id).await.unwrap();

    chat.flush_cache().await.unwrap();
    assert_eq!(app.cache.scard(&keys::user_rooms(ALICE)).await.unwrap(), 0);

    assert_eq!(chat.get_room(first.id).await.unwrap(), room);
    assert_eq!(chat.page(first.id, 0, 10).await.unwrap(), page);
    assert_eq!(chat.list_rooms_for_user(ALICE).await.unwrap(), rooms);
    assert_eq!(chat.get_read_count(first.id).await.unwrap(), read_count);

    // The next append restores the whole log, not just the new entry
    chat.send_message(first.id, ALICE, "four", "TALK").await.unwrap();
    let cached = app
        .cache
        .zrange(&keys::room_messages(first.id), 0, -1)
        .await
        .unwrap();
    assert_eq!(cached.len(), 3);
}

#[tokio::test]
async fn test_cache_outage_falls_back_to_durable_store() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE, BOB]).await;

    app.cache.set_unavailable(true);

    chat.send_message(room.id, ALICE, "during outage", "TALK")
        .await
        .unwrap();
    let fetched = chat.get_messages(room.id, 0, 10, BOB).await.unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].read_by_count, 1);
    assert_eq!(chat.get_room(room.id).await.unwrap(), room);
    assert_eq!(chat.list_rooms_for_user(BOB).await.unwrap().len(), 1);
    assert_eq!(chat.get_read_count(room.id).await.unwrap(), 1);

    app.cache.set_unavailable(false);

    chat.send_message(room.id, BOB, "after outage", "TALK")
        .await
        .unwrap();
    let cached = app
        .cache
        .zrange(&keys::room_messages(room.id), 0, -1)
        .await
        .unwrap();
    assert_eq!(cached.len(), 2);

    let page = chat.page(room.id, 0, 10).await.unwrap();
    let contents: Vec<&str> = page.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["during outage", "after outage"]);
    assert_eq!(page[0].read_by_count, 1);
}

#[tokio::test]
async fn test_durable_outage_is_retryable() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE]).await;

    app.store.set_unavailable(true);

    let err = chat.create_room("another").await.unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(err.is_retryable());

    let err = chat
        .send_message(room.id, ALICE, "lost", "TALK")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Storage(_)));
    assert!(err.is_retryable());

    // Nothing reaches the cache without a durable id
    assert!(app
        .cache
        .zrange(&keys::room_messages(room.id), 0, -1)
        .await
        .unwrap()
        .is_empty());

    app.store.set_unavailable(false);
    chat.send_message(room.id, ALICE, "kept", "TALK").await.unwrap();
    assert_eq!(chat.page(room.id, 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_corrupt_log_entry_is_skipped_and_rebuilt() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE]).await;
    chat.send_message(room.id, ALICE, "fine", "TALK").await.unwrap();
    let key = keys::room_messages(room.id);
    app.cache.zadd(&key, "{not json", 0.0).await.unwrap();

    let page = chat.page(room.id, 0, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].content, "fine");

    assert_eq!(chat.rebuild_room_cache(room.id).await.unwrap(), 1);
    let cached = app.cache.zrange(&key, 0, -1).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert!(message_codec::decode(&cached[0]).is_ok());
}

#[tokio::test]
async fn test_rebuild_requires_room() {
    let app = TestApp::new();
    assert!(matches!(
        app.chat().rebuild_room_cache(12).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_read_users_are_repaired() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    chat.send_message(room.id, ALICE, "hi", "TALK").await.unwrap();
    chat.get_messages(room.id, 0, 10, BOB).await.unwrap();

    let key = keys::room_read_users(room.id);
    app.cache.delete(&[key.clone()]).await.unwrap();

    assert_eq!(chat.get_read_count(room.id).await.unwrap(), 1);
    assert_eq!(app.cache.smembers(&key).await.unwrap(), vec![BOB]);
}

#[tokio::test]
async fn test_latest_snippet_is_repaired() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE]).await;
    chat.send_message(room.id, ALICE, "latest", "TALK").await.unwrap();

    let key = keys::room_latest_message(room.id);
    app.cache.delete(&[key.clone()]).await.unwrap();

    let rooms = chat.list_rooms_for_user(ALICE).await.unwrap();
    assert_eq!(rooms[0].latest_message.as_deref(), Some("latest"));
    assert_eq!(app.cache.get(&key).await.unwrap().as_deref(), Some("latest"));
}

#[tokio::test]
async fn test_stale_duplicate_collapses() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    let Dispatched::Persisted(original) =
        chat.send_message(room.id, ALICE, "hi", "TALK").await.unwrap()
    else {
        panic!("TALK must persist");
    };
    chat.mark_read(room.id, original.id, BOB).await.unwrap();

    // An unread copy left behind by a racing writer
    let stale = message_codec::encode(&original).unwrap();
    app.cache
        .zadd(&keys::room_messages(room.id), &stale, original.score())
        .await
        .unwrap();

    let page = chat.page(room.id, 0, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, original.id);
    assert_eq!(page[0].read_by_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sends_after_flush_are_all_logged() {
    let app = TestApp::with_cache_latency(Duration::from_millis(2));
    let room = app.room_with("busy", &[ALICE, BOB, CAROL]).await;
    app.chat()
        .send_message(room.id, ALICE, "before flush", "TALK")
        .await
        .unwrap();
    app.chat().flush_cache().await.unwrap();

    let mut sends = Vec::new();
    for (sender, content) in [(ALICE, "a"), (BOB, "b"), (CAROL, "c")] {
        let chat = app.state.chat.clone();
        let room_id = room.id;
        sends.push(tokio::spawn(async move {
            chat.send_message(room_id, sender, content, "TALK").await
        }));
    }
    for send in sends {
        send.await.unwrap().unwrap();
    }

    let cached = app
        .cache
        .zrange(&keys::room_messages(room.id), 0, -1)
        .await
        .unwrap();
    assert_eq!(cached.len(), 4);
    let mut contents: Vec<String> = cached
        .iter()
        .map(|member| message_codec::decode(member).unwrap().content)
        .collect();
    contents.sort_unstable();
    assert_eq!(contents, vec!["a", "b", "before flush", "c"]);
}

#[tokio::test]
async fn test_rebuild_keeps_entries_it_did_not_read() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    let Dispatched::Persisted(first) =
        chat.send_message(room.id, ALICE, "first", "TALK").await.unwrap()
    else {
        panic!("TALK must persist");
    };

    // An append whose durable row landed after the rebuild's snapshot
    let mut late = first.clone();
    late.id = first.id + 100;
    late.content = "late".to_string();
    late.sent_at = first.sent_at + chrono::Duration::milliseconds(10);
    let key = keys::room_messages(room.id);
    app.cache
        .zadd(&key, &message_codec::encode(&late).unwrap(), late.score())
        .await
        .unwrap();

    assert_eq!(chat.rebuild_room_cache(room.id).await.unwrap(), 1);

    let cached = app.cache.zrange(&key, 0, -1).await.unwrap();
    assert_eq!(cached.len(), 2);
    assert_eq!(message_codec::decode(&cached[1]).unwrap().content, "late");
}

#[tokio::test]
async fn test_rebuild_replaces_copies_behind_durable_reads() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    chat.send_message(room.id, ALICE, "hi", "TALK").await.unwrap();
    let key = keys::room_messages(room.id);
    let unread = app.cache.zrange(&key, 0, -1).await.unwrap();

    chat.get_messages(room.id, 0, 10, BOB).await.unwrap();
    // Put the unread copy back in place of the read one
    let read = app.cache.zrange(&key, 0, -1).await.unwrap();
    app.cache.zrem(&key, &read).await.unwrap();
    let score = message_codec::decode(&unread[0]).unwrap().score();
    app.cache.zadd(&key, &unread[0], score).await.unwrap();

    chat.rebuild_room_cache(room.id).await.unwrap();

    let cached = app.cache.zrange(&key, 0, -1).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(message_codec::decode(&cached[0]).unwrap().read_by_count, 1);
}
