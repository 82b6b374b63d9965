//! Chat Service
//!
//! The operations the engine exposes to the HTTP and WebSocket layers.
//! Wires the room directory, message log, read tracker and event dispatcher
//! together over one durable store, one fast cache and one publisher.

use std::sync::Arc;

use tracing::{info, instrument};

use super::event_dispatcher::EventDispatcher;
use super::message_log::MessageLog;
use super::read_tracker::ReadTracker;
use super::room_directory::RoomDirectory;
use crate::domain::{
    ChatEvent, Dispatched, EventPublisher, IdentityService, InboundEvent, MembershipRepository,
    Message, MessageRepository, ReadStatus, Room, RoomRepository, RoomSummary, ServerEvent,
    Topic, UserProfile,
};
use crate::infrastructure::cache::FastCache;
use crate::shared::error::AppError;
use crate::shared::validation::require_id;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Durable store handles, one per repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub rooms: Arc<dyn RoomRepository>,
    pub memberships: Arc<dyn MembershipRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

pub struct ChatService {
    directory: Arc<RoomDirectory>,
    log: Arc<MessageLog>,
    reads: ReadTracker,
    dispatcher: EventDispatcher,
    cache: Arc<dyn FastCache>,
    publisher: Arc<dyn EventPublisher>,
}

impl ChatService {
    pub fn new(
        repositories: Repositories,
        cache: Arc<dyn FastCache>,
        identity: Arc<dyn IdentityService>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let log = Arc::new(MessageLog::new(
            repositories.messages.clone(),
            cache.clone(),
            identity.clone(),
        ));
        let directory = Arc::new(RoomDirectory::new(
            repositories.rooms,
            repositories.memberships,
            repositories.messages.clone(),
            log.clone(),
            cache.clone(),
            identity.clone(),
        ));
        let reads = ReadTracker::new(repositories.messages, log.clone(), cache.clone());
        let dispatcher =
            EventDispatcher::new(directory.clone(), log.clone(), identity, publisher.clone());

        Self {
            directory,
            log,
            reads,
            dispatcher,
            cache,
            publisher,
        }
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, AppError> {
        self.directory.create(name).await
    }

    pub async fn get_room(&self, room_id: i64) -> Result<Room, AppError> {
        self.directory.get(room_id).await
    }

    /// Delete a room and tell room-list subscribers.
    pub async fn delete_room(&self, room_id: i64) -> Result<(), AppError> {
        self.directory.delete(room_id).await?;
        self.publisher
            .publish(&Topic::Rooms, ServerEvent::RoomDeleted { room_id });
        Ok(())
    }

    pub async fn add_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.directory.add_member(room_id, user_id).await
    }

    pub async fn remove_member(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.directory.remove_member(room_id, user_id).await
    }

    pub async fn list_members(&self, room_id: i64) -> Result<Vec<UserProfile>, AppError> {
        self.directory.list_members(room_id).await
    }

    /// Send a message of any supported type on behalf of an authenticated user.
    pub async fn send_message(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        message_type: &str,
    ) -> Result<Dispatched, AppError> {
        let event = ChatEvent::parse(message_type, content)?;
        self.dispatcher.dispatch(room_id, sender_id, event).await
    }

    /// Handle a raw event from the connection layer.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<Dispatched, AppError> {
        self.dispatcher.handle(event).await
    }

    /// Raw page of a room's log, without read side effects.
    pub async fn page(&self, room_id: i64, offset: i64, limit: i64) -> Result<Vec<Message>, AppError> {
        self.log.page(room_id, offset, limit).await
    }

    /// Page `page` of size `page_size`, marking each returned message read
    /// by the caller.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_messages(
        &self,
        room_id: i64,
        page: i64,
        page_size: i64,
        caller_id: i64,
    ) -> Result<Vec<Message>, AppError> {
        require_id(caller_id, "user id")?;
        if page < 0 {
            return Err(AppError::InvalidArgument("page must not be negative".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(AppError::InvalidArgument(format!(
                "page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        let offset = page
            .checked_mul(page_size)
            .ok_or_else(|| AppError::InvalidArgument("page is out of range".into()))?;
        self.directory.get(room_id).await?;
        self.require_member(room_id, caller_id).await?;

        let messages = self.log.page(room_id, offset, page_size).await?;
        self.reads
            .mark_messages_read(room_id, messages, caller_id)
            .await
    }

    /// Mark one message read. Only members may mark messages of a room.
    pub async fn mark_read(
        &self,
        room_id: i64,
        message_id: i64,
        user_id: i64,
    ) -> Result<Message, AppError> {
        require_id(user_id, "user id")?;
        self.directory.get(room_id).await?;
        self.require_member(room_id, user_id).await?;
        self.reads.mark_read(room_id, message_id, user_id).await
    }

    /// Mark the whole room read and publish the new read status.
    pub async fn mark_all_read(&self, room_id: i64, user_id: i64) -> Result<ReadStatus, AppError> {
        require_id(user_id, "user id")?;
        self.directory.get(room_id).await?;
        self.require_member(room_id, user_id).await?;
        let read_count = self.reads.mark_all_read(room_id, user_id).await?;

        let status = ReadStatus {
            room_id,
            user_id,
            read_count,
        };
        self.publisher
            .publish(&Topic::RoomRead(room_id), ServerEvent::ReadStatus(status));
        Ok(status)
    }

    pub async fn get_read_count(&self, room_id: i64) -> Result<i64, AppError> {
        self.reads.read_count(room_id).await
    }

    pub async fn list_rooms_for_user(&self, user_id: i64) -> Result<Vec<RoomSummary>, AppError> {
        self.directory.list_rooms_for_user(user_id).await
    }

    /// Merge the durable store's messages of a room into its cache-side log.
    pub async fn rebuild_room_cache(&self, room_id: i64) -> Result<usize, AppError> {
        self.directory.get(room_id).await?;
        self.log.rebuild(room_id).await
    }

    async fn require_member(&self, room_id: i64, user_id: i64) -> Result<(), AppError> {
        if self.directory.is_member(room_id, user_id).await? {
            return Ok(());
        }
        Err(AppError::Unauthorized(format!(
            "User {} is not a member of room {}",
            user_id, room_id
        )))
    }

    /// Drop all fast-cache state. Reads repair it from the durable store.
    pub async fn flush_cache(&self) -> Result<(), AppError> {
        self.cache.flush().await?;
        info!("Fast cache flushed");
        Ok(())
    }
}
