//! In-process durable store.
//!
//! Implements the room, membership and message repositories over a single
//! lock-protected state, with the same ordering and idempotence rules as the
//! PostgreSQL repositories. Used by the `memory` storage backend and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    Membership, MembershipRepository, Message, MessageRepository, NewMessage, Room,
    RoomRepository,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
struct State {
    last_room_id: i64,
    last_message_id: i64,
    rooms: BTreeMap<i64, Room>,
    memberships: BTreeMap<(i64, i64), Membership>,
    messages: BTreeMap<i64, Message>,
}

impl State {
    /// Messages of a room in log order (`sent_at`, then id).
    fn room_messages(&self, room_id: i64) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| m.room_id == room_id)
            .collect();
        messages.sort_by_key(|m| (m.sent_at, m.id));
        messages
    }
}

/// Process-local durable store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every operation fails with `AppError::Storage`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Storage("durable store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create(&self, name: &str) -> Result<Room, AppError> {
        self.check()?;
        let mut state = self.state.write();
        state.last_room_id += 1;
        let now = Utc::now();
        let room = Room {
            id: state.last_room_id,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        state.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        self.check()?;
        Ok(self.state.read().rooms.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self.state.write().rooms.remove(&id).is_some())
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn add(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.check()?;
        let mut state = self.state.write();
        if state.memberships.contains_key(&(room_id, user_id)) {
            return Ok(false);
        }
        state
            .memberships
            .insert((room_id, user_id), Membership::new(room_id, user_id));
        Ok(true)
    }

    async fn remove(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .state
            .write()
            .memberships
            .remove(&(room_id, user_id))
            .is_some())
    }

    async fn exists(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .memberships
            .contains_key(&(room_id, user_id)))
    }

    async fn find_room_ids_by_user(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .memberships
            .keys()
            .filter(|(_, user)| *user == user_id)
            .map(|(room, _)| *room)
            .collect())
    }

    async fn find_user_ids_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        self.check()?;
        Ok(self
            .state
            .read()
            .memberships
            .range((room_id, i64::MIN)..=(room_id, i64::MAX))
            .map(|((_, user), _)| *user)
            .collect())
    }

    async fn delete_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        self.check()?;
        let mut state = self.state.write();
        let users: Vec<i64> = state
            .memberships
            .range((room_id, i64::MIN)..=(room_id, i64::MAX))
            .map(|((_, user), _)| *user)
            .collect();
        for user in &users {
            state.memberships.remove(&(room_id, *user));
        }
        Ok(users)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        self.check()?;
        let mut state = self.state.write();
        state.last_message_id += 1;
        let message = Message::from_new(state.last_message_id, message.clone());
        state.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        self.check()?;
        Ok(self.state.read().messages.get(&id).cloned())
    }

    async fn find_page(
        &self,
        room_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        self.check()?;
        let state = self.state.read();
        Ok(state
            .room_messages(room_id)
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find_latest(&self, room_id: i64) -> Result<Option<Message>, AppError> {
        self.check()?;
        let state = self.state.read();
        Ok(state.room_messages(room_id).last().map(|m| (*m).clone()))
    }

    async fn find_all_by_room(&self, room_id: i64) -> Result<Vec<Message>, AppError> {
        self.check()?;
        let state = self.state.read();
        Ok(state.room_messages(room_id).into_iter().cloned().collect())
    }

    async fn last_activity(
        &self,
        room_ids: &[i64],
    ) -> Result<Vec<(i64, DateTime<Utc>)>, AppError> {
        self.check()?;
        let wanted: BTreeSet<i64> = room_ids.iter().copied().collect();
        let mut latest: BTreeMap<i64, DateTime<Utc>> = BTreeMap::new();
        for message in self.state.read().messages.values() {
            if !wanted.contains(&message.room_id) {
                continue;
            }
            let entry = latest.entry(message.room_id).or_insert(message.sent_at);
            if message.sent_at > *entry {
                *entry = message.sent_at;
            }
        }
        Ok(latest.into_iter().collect())
    }

    async fn delete_by_room(&self, room_id: i64) -> Result<u64, AppError> {
        self.check()?;
        let mut state = self.state.write();
        let before = state.messages.len();
        state.messages.retain(|_, m| m.room_id != room_id);
        Ok((before - state.messages.len()) as u64)
    }

    async fn mark_read(&self, message_id: i64, user_id: i64) -> Result<bool, AppError> {
        self.check()?;
        Ok(self
            .state
            .write()
            .messages
            .get_mut(&message_id)
            .is_some_and(|m| m.record_read(user_id)))
    }

    async fn mark_all_read(&self, room_id: i64, user_id: i64) -> Result<Vec<i64>, AppError> {
        self.check()?;
        let mut state = self.state.write();
        let mut marked: Vec<i64> = state
            .messages
            .values_mut()
            .filter(|m| m.room_id == room_id)
            .filter_map(|m| m.record_read(user_id).then_some(m.id))
            .collect();
        marked.sort_unstable();
        Ok(marked)
    }

    async fn find_readers(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        self.check()?;
        let readers: BTreeSet<i64> = self
            .state
            .read()
            .messages
            .values()
            .filter(|m| m.room_id == room_id)
            .flat_map(|m| m.read_by.iter().copied())
            .collect();
        Ok(readers.into_iter().collect())
    }
}
