//! Event Dispatcher
//!
//! Handles inbound client events. Each message type is handled on its own,
//! with no conversation state kept between events.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::message_log::MessageLog;
use super::room_directory::RoomDirectory;
use crate::domain::{
    ChatEvent, Dispatched, EventPublisher, IdentityService, InboundEvent, Message, MessageType,
    Room, ServerEvent, SystemNotice, Topic, SYSTEM_SENDER,
};
use crate::shared::error::AppError;
use crate::shared::validation::require_id;

pub struct EventDispatcher {
    directory: Arc<RoomDirectory>,
    log: Arc<MessageLog>,
    identity: Arc<dyn IdentityService>,
    publisher: Arc<dyn EventPublisher>,
}

impl EventDispatcher {
    pub fn new(
        directory: Arc<RoomDirectory>,
        log: Arc<MessageLog>,
        identity: Arc<dyn IdentityService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            directory,
            log,
            identity,
            publisher,
        }
    }

    /// Authenticate and dispatch a raw inbound event.
    #[instrument(skip(self, event), fields(room_id = event.room_id, kind = %event.message_type))]
    pub async fn handle(&self, event: InboundEvent) -> Result<Dispatched, AppError> {
        let sender_id = self.identity.verify_token(&event.sender_token).await?;
        let parsed = ChatEvent::parse(&event.message_type, &event.content)?;
        self.dispatch(event.room_id, sender_id, parsed).await
    }

    /// Dispatch a parsed event sent by an authenticated user.
    pub async fn dispatch(
        &self,
        room_id: i64,
        sender_id: i64,
        event: ChatEvent,
    ) -> Result<Dispatched, AppError> {
        require_id(room_id, "room id")?;
        require_id(sender_id, "sender id")?;
        let room = self.directory.get(room_id).await?;

        let dispatched = match event {
            ChatEvent::Enter { invitee } => self.on_enter(room.id, invitee).await?,
            ChatEvent::Talk { content } => {
                let dispatched = self.on_talk(room.id, sender_id, &content).await?;
                self.publish_room_update(room).await;
                dispatched
            }
            ChatEvent::Exit => self.on_exit(room.id, sender_id).await?,
            ChatEvent::MatchRequest => {
                let name = self.identity.get_user_name(sender_id).await?;
                self.broadcast(SystemNotice::new(
                    MessageType::MatchRequest,
                    room.id,
                    Some(sender_id),
                    name.clone(),
                    format!("{} requested a match.", name),
                ))
            }
            ChatEvent::Match => self.broadcast(SystemNotice::new(
                MessageType::Match,
                room.id,
                None,
                SYSTEM_SENDER,
                "Match complete!",
            )),
        };

        debug!(room_id = room_id, sender_id = sender_id, "Event dispatched");
        Ok(dispatched)
    }

    /// The persisted notice is attributed to the invitee.
    async fn on_enter(&self, room_id: i64, invitee: i64) -> Result<Dispatched, AppError> {
        require_id(invitee, "invitee id")?;
        let name = self.identity.get_user_name(invitee).await?;
        let message = self
            .log
            .append(room_id, invitee, &format!("{} entered the room.", name), MessageType::Enter)
            .await?;
        Ok(self.publish_message(message))
    }

    async fn on_talk(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
    ) -> Result<Dispatched, AppError> {
        if !self.directory.is_member(room_id, sender_id).await? {
            return Err(AppError::Unauthorized(format!(
                "User {} is not a member of room {}",
                sender_id, room_id
            )));
        }
        let message = self
            .log
            .append(room_id, sender_id, content, MessageType::Talk)
            .await?;
        Ok(self.publish_message(message))
    }

    async fn on_exit(&self, room_id: i64, sender_id: i64) -> Result<Dispatched, AppError> {
        let name = self.identity.get_user_name(sender_id).await?;
        let message = self
            .log
            .append(room_id, sender_id, &format!("{} left the room.", name), MessageType::Exit)
            .await?;
        Ok(self.publish_message(message))
    }

    fn publish_message(&self, message: Message) -> Dispatched {
        self.publisher.publish(
            &Topic::Room(message.room_id),
            ServerEvent::MessageCreated(message.clone()),
        );
        Dispatched::Persisted(message)
    }

    fn broadcast(&self, notice: SystemNotice) -> Dispatched {
        self.publisher.publish(
            &Topic::Room(notice.room_id),
            ServerEvent::SystemNotice(notice.clone()),
        );
        Dispatched::Broadcast(notice)
    }

    /// Room-list hint after a new message. Failures drop the hint only.
    async fn publish_room_update(&self, room: Room) {
        let room_id = room.id;
        match self.directory.summarize(room).await {
            Ok(summary) => self
                .publisher
                .publish(&Topic::Rooms, ServerEvent::RoomUpdated(summary)),
            Err(e) => warn!(room_id = room_id, error = %e, "Room list update not published"),
        }
    }
}
