//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{token_for, TestApp, ALICE, BOB, CAROL};

#[tokio::test]
async fn test_send_message_status_reflects_persistence() {
    let app = TestApp::new();
    let token = token_for(ALICE);
    let room = app.room_with("general", &[ALICE]).await;
    let uri = format!("/api/v1/rooms/{}/messages", room.id);

    let (status, talk) = app.post(&uri, &token, json!({ "content": "hi" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(talk["type"], "TALK");
    assert_eq!(talk["sender_id"], ALICE);
    assert!(talk["id"].as_i64().unwrap() > 0);

    let (status, notice) = app.post(&uri, &token, json!({ "type": "MATCH" })).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(notice["content"], "Match complete!");
    assert_eq!(notice["sender_id"], serde_json::Value::Null);

    let (status, body) = app
        .post(&uri, &token, json!({ "type": "WAVE", "content": "o/" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["retryable"], false);

    let (status, _) = app
        .post(&uri, &token, json!({ "content": "x".repeat(2001) }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_talk_from_non_member_is_rejected() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    let (status, _) = app
        .post(
            &format!("/api/v1/rooms/{}/messages", room.id),
            &token_for(BOB),
            json!({ "content": "let me in" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fetching_messages_marks_them_read() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    for content in ["one", "two", "three"] {
        app.chat()
            .send_message(room.id, ALICE, content, "TALK")
            .await
            .unwrap();
    }

    let (status, page) = app
        .get(
            &format!("/api/v1/rooms/{}/messages?page=0&size=2", room.id),
            &token_for(BOB),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = page.as_array().unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["content"], "one");
    assert_eq!(page[0]["read_by_count"], 1);

    let (status, count) = app
        .get(
            &format!("/api/v1/rooms/{}/read-count", room.id),
            &token_for(ALICE),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count, json!({ "room_id": room.id, "read_count": 1 }));

    // The third message was not on the page
    let unread = app.chat().page(room.id, 2, 1).await.unwrap();
    assert_eq!(unread[0].read_by_count, 0);
}

#[tokio::test]
async fn test_message_page_validation() {
    let app = TestApp::new();
    let token = token_for(ALICE);
    let room = app.room_with("general", &[ALICE]).await;

    for query in [
        "size=500",
        "size=0",
        "page=-1",
        "page=abc",
        "page=922337203685477580&size=100",
    ] {
        let (status, _) = app
            .get(
                &format!("/api/v1/rooms/{}/messages?{}", room.id, query),
                &token,
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "query {}", query);
    }

    let (status, _) = app.get("/api/v1/rooms/999/messages", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_endpoints() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    let first = app
        .chat()
        .send_message(room.id, ALICE, "first", "TALK")
        .await
        .unwrap();
    app.chat()
        .send_message(room.id, ALICE, "second", "TALK")
        .await
        .unwrap();
    let first_id = first.message().unwrap().id;
    let bob = token_for(BOB);

    let (status, read) = app
        .post(
            &format!("/api/v1/rooms/{}/messages/{}/read", room.id, first_id),
            &bob,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["read_by_count"], 1);

    let (status, _) = app
        .post(
            &format!("/api/v1/rooms/{}/messages/9999/read", room.id),
            &bob,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, all) = app
        .post(&format!("/api/v1/rooms/{}/read", room.id), &bob, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        all,
        json!({ "room_id": room.id, "user_id": BOB, "read_count": 1 })
    );

    let counts: Vec<i32> = app
        .chat()
        .page(room.id, 0, 10)
        .await
        .unwrap()
        .iter()
        .map(|m| m.read_by_count)
        .collect();
    assert_eq!(counts, vec![1, 1]);
}

#[tokio::test]
async fn test_read_endpoints_require_membership() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    app.chat()
        .send_message(room.id, ALICE, "members only", "TALK")
        .await
        .unwrap();
    let carol = token_for(CAROL);

    let (status, _) = app
        .get(&format!("/api/v1/rooms/{}/messages", room.id), &carol)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(&format!("/api/v1/rooms/{}/read", room.id), &carol, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, count) = app
        .get(&format!("/api/v1/rooms/{}/read-count", room.id), &token_for(ALICE))
        .await;
    assert_eq!(count["read_count"], 0);
}
