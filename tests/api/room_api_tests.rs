//! Room API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

use crate::common::{expired_token, token_for, TestApp, ALICE, BOB, CAROL};

#[test_case("GET", "/api/v1/users/@me/rooms" ; "room list")]
#[test_case("POST", "/api/v1/rooms" ; "create room")]
#[test_case("GET", "/api/v1/rooms/1/messages" ; "messages")]
#[test_case("DELETE", "/api/v1/admin/cache" ; "flush cache")]
#[tokio::test]
async fn test_requires_bearer_token(method: &str, uri: &str) {
    let app = TestApp::new();

    let (status, body) = app.request(method, uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["retryable"], false);

    let (status, _) = app
        .request(method, uri, Some(&expired_token(ALICE)), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(method, uri, Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_room_lifecycle() {
    let app = TestApp::new();
    let token = token_for(ALICE);

    let (status, room) = app
        .post("/api/v1/rooms", &token, json!({ "name": "general" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(room["name"], "general");
    let room_id = room["id"].as_i64().unwrap();

    let (status, fetched) = app.get(&format!("/api/v1/rooms/{}", room_id), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, room);

    let (status, _) = app
        .delete(&format!("/api/v1/rooms/{}", room_id), &token)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/v1/rooms/{}", room_id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["retryable"], false);

    let (status, _) = app
        .delete(&format!("/api/v1/rooms/{}", room_id), &token)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test_case(json!({ "name": "" }) ; "empty name")]
#[test_case(json!({ "name": "x".repeat(101) }) ; "long name")]
#[test_case(json!({ "title": "general" }) ; "missing name")]
#[tokio::test]
async fn test_create_room_validation(body: serde_json::Value) {
    let app = TestApp::new();

    let (status, _) = app.post("/api/v1/rooms", &token_for(ALICE), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_changes_report_whether_anything_changed() {
    let app = TestApp::new();
    let token = token_for(ALICE);
    let room = app.room_with("general", &[ALICE]).await;
    let members_uri = format!("/api/v1/rooms/{}/members", room.id);

    let (status, added) = app.post(&members_uri, &token, json!({ "user_id": BOB })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added, json!({ "room_id": room.id, "user_id": BOB, "changed": true }));

    let (_, again) = app.post(&members_uri, &token, json!({ "user_id": BOB })).await;
    assert_eq!(again["changed"], false);

    let (status, members) = app.get(&members_uri, &token).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = members
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["name"].as_str())
        .collect();
    assert_eq!(names, vec!["alice", "bob"]);

    let (status, removed) = app
        .delete(&format!("{}/{}", members_uri, BOB), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["changed"], true);

    let (_, missing) = app
        .delete(&format!("{}/{}", members_uri, CAROL), &token)
        .await;
    assert_eq!(missing["changed"], false);

    let (status, _) = app.post(&members_uri, &token, json!({ "user_id": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_my_rooms_lists_caller_rooms() {
    let app = TestApp::new();
    let mine = app.room_with("mine", &[ALICE, BOB]).await;
    app.room_with("theirs", &[BOB]).await;
    app.chat()
        .send_message(mine.id, BOB, "hello", "TALK")
        .await
        .unwrap();

    let (status, rooms) = app.get("/api/v1/users/@me/rooms", &token_for(ALICE)).await;

    assert_eq!(status, StatusCode::OK);
    let rooms = rooms.as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["room"]["id"], mine.id);
    assert_eq!(rooms[0]["latest_message"], "hello");
    assert_eq!(rooms[0]["members"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_cache_maintenance() {
    let app = TestApp::new();
    let token = token_for(ALICE);
    let room = app.room_with("general", &[ALICE]).await;
    app.chat()
        .send_message(room.id, ALICE, "kept", "TALK")
        .await
        .unwrap();

    let (status, _) = app.delete("/api/v1/admin/cache", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, rebuilt) = app
        .post(
            &format!("/api/v1/admin/rooms/{}/cache", room.id),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rebuilt, json!({ "room_id": room.id, "messages": 1 }));

    let (status, _) = app
        .post("/api/v1/admin/rooms/999/cache", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
