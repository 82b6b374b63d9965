//! Per-type event dispatch and fan-out

use pretty_assertions::assert_eq;

use chat_core::domain::{Dispatched, InboundEvent, MessageType, Topic};
use chat_core::shared::error::AppError;

use crate::common::{expired_token, token_for, TestApp, ALICE, BOB, CAROL};

fn inbound(room_id: i64, token: String, message_type: &str, content: &str) -> InboundEvent {
    InboundEvent {
        room_id,
        sender_token: token,
        message_type: message_type.to_string(),
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_enter_is_attributed_to_invitee() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE]).await;

    let dispatched = chat.send_message(room.id, ALICE, "2", "ENTER").await.unwrap();

    let Dispatched::Persisted(message) = dispatched else {
        panic!("ENTER must persist");
    };
    assert_eq!(message.message_type, MessageType::Enter);
    assert_eq!(message.sender_id, BOB);
    assert_eq!(message.sender_name, "bob");
    assert_eq!(message.content, "bob entered the room.");
    assert_eq!(chat.page(room.id, 0, 10).await.unwrap(), vec![message]);
}

#[tokio::test]
async fn test_enter_requires_numeric_invitee() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    assert!(matches!(
        app.chat().send_message(room.id, ALICE, "abc", "ENTER").await,
        Err(AppError::InvalidArgument(_))
    ));
    assert!(app.chat().page(room.id, 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_talk_requires_membership() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    assert!(matches!(
        app.chat().send_message(room.id, CAROL, "hello?", "TALK").await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(app.chat().page(room.id, 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_exit_persists_notice() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    let dispatched = app
        .chat()
        .send_message(room.id, ALICE, "", "EXIT")
        .await
        .unwrap();

    assert_eq!(dispatched.content(), "alice left the room.");
    let message = dispatched.message().unwrap();
    assert_eq!(message.message_type, MessageType::Exit);
    assert_eq!(message.sender_id, ALICE);
}

#[tokio::test]
async fn test_match_request_is_broadcast_only() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    let mut subscriber = app.subscriber(BOB, &[Topic::Room(room.id)]);

    let dispatched = app
        .chat()
        .send_message(room.id, ALICE, "", "MATCH_REQUEST")
        .await
        .unwrap();

    let Dispatched::Broadcast(notice) = dispatched else {
        panic!("MATCH_REQUEST must not persist");
    };
    assert_eq!(notice.message_type, MessageType::MatchRequest);
    assert_eq!(notice.sender_id, Some(ALICE));
    assert_eq!(notice.content, "alice requested a match.");
    assert!(app.chat().page(room.id, 0, 10).await.unwrap().is_empty());

    let frames = subscriber.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["payload"]["event"], "SYSTEM_NOTICE");
    assert_eq!(frames[0]["payload"]["data"]["content"], "alice requested a match.");
}

#[tokio::test]
async fn test_match_is_system_notice() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    let dispatched = app
        .chat()
        .send_message(room.id, ALICE, "", "MATCH")
        .await
        .unwrap();

    let Dispatched::Broadcast(notice) = dispatched else {
        panic!("MATCH must not persist");
    };
    assert_eq!(notice.sender_id, None);
    assert_eq!(notice.sender_name, "System");
    assert_eq!(notice.content, "Match complete!");
    assert!(app.chat().page(room.id, 0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_type_is_rejected() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE]).await;

    assert!(matches!(
        app.chat().send_message(room.id, ALICE, "hi", "WAVE").await,
        Err(AppError::UnsupportedMessageType(_))
    ));
}

#[tokio::test]
async fn test_send_to_missing_room() {
    let app = TestApp::new();

    assert!(matches!(
        app.chat().send_message(404, ALICE, "hi", "TALK").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_handle_event_verifies_token() {
    let app = TestApp::new();
    let chat = app.chat();
    let room = app.room_with("general", &[ALICE]).await;

    let sent = chat
        .handle_event(inbound(room.id, token_for(ALICE), "TALK", "hi"))
        .await
        .unwrap();
    assert_eq!(sent.message().unwrap().sender_id, ALICE);

    assert!(matches!(
        chat.handle_event(inbound(room.id, "not-a-token".into(), "TALK", "hi"))
            .await,
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        chat.handle_event(inbound(room.id, expired_token(ALICE), "TALK", "hi"))
            .await,
        Err(AppError::Unauthorized(_))
    ));
    assert_eq!(chat.page(room.id, 0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_talk_fans_out_to_room_and_room_list() {
    let app = TestApp::new();
    let room = app.room_with("general", &[ALICE, BOB]).await;
    let other = app.room_with("other", &[BOB]).await;
    let mut in_room = app.subscriber(BOB, &[Topic::Room(room.id)]);
    let mut elsewhere = app.subscriber(BOB, &[Topic::Room(other.id)]);
    let mut room_list = app.subscriber(CAROL, &[Topic::Rooms]);

    app.chat()
        .send_message(room.id, ALICE, "hi", "TALK")
        .await
        .unwrap();

    let frames = in_room.drain();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["topic"], format!("room/{}", room.id));
    assert_eq!(frames[0]["payload"]["event"], "MESSAGE_CREATED");
    assert_eq!(frames[0]["payload"]["data"]["content"], "hi");

    assert!(elsewhere.drain().is_empty());
    assert_eq!(room_list.event_names(), vec!["ROOM_UPDATED"]);
}
