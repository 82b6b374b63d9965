//! WebSocket Gateway
//!
//! Subscription registry for live connections. A connection is registered
//! when its socket opens and unregistered when it closes; in between it may
//! subscribe to any number of topics.
//!
//! Every connection owns a bounded outbound queue. Publishing never waits on
//! a subscriber: a full queue drops the event for that subscriber only.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::messages::ServerFrame;
use crate::domain::{EventPublisher, ServerEvent, Topic};
use crate::infrastructure::metrics;

/// A live connection
struct Connection {
    user_id: i64,
    sender: mpsc::Sender<String>,
    topics: Mutex<HashSet<Topic>>,
}

pub struct Gateway {
    /// Active connections by id
    connections: DashMap<Uuid, Arc<Connection>>,
    /// Topic to subscribed connection ids, in subscription order
    topics: DashMap<Topic, Vec<Uuid>>,
    queue_capacity: usize,
}

impl Gateway {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: DashMap::new(),
            topics: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Capacity of each connection's outbound queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Register a connection and return its id.
    pub fn register(&self, user_id: i64, sender: mpsc::Sender<String>) -> Uuid {
        let connection_id = Uuid::new_v4();
        self.connections.insert(
            connection_id,
            Arc::new(Connection {
                user_id,
                sender,
                topics: Mutex::new(HashSet::new()),
            }),
        );
        metrics::set_websocket_connections(self.connections.len());

        info!(user_id = user_id, connection_id = %connection_id, "Connection registered");
        connection_id
    }

    /// Drop a connection and all of its subscriptions.
    pub fn unregister(&self, connection_id: Uuid) {
        let Some((_, connection)) = self.connections.remove(&connection_id) else {
            return;
        };

        let topics: Vec<Topic> = connection.topics.lock().drain().collect();
        for topic in &topics {
            self.detach(topic, connection_id);
        }
        metrics::set_websocket_connections(self.connections.len());

        info!(
            user_id = connection.user_id,
            connection_id = %connection_id,
            "Connection unregistered"
        );
    }

    /// Subscribe a connection to a topic. Returns false if the connection is
    /// unknown or already subscribed.
    pub fn subscribe(&self, connection_id: Uuid, topic: Topic) -> bool {
        let Some(connection) = self.connection(connection_id) else {
            return false;
        };
        if !connection.topics.lock().insert(topic) {
            return false;
        }

        self.topics.entry(topic).or_default().push(connection_id);
        // An unregister that ran between the lookup and the push missed this id
        if !self.connections.contains_key(&connection_id) {
            self.detach(&topic, connection_id);
            return false;
        }
        debug!(connection_id = %connection_id, topic = %topic, "Subscribed");
        true
    }

    /// Remove one subscription. Returns false if there was none.
    pub fn unsubscribe(&self, connection_id: Uuid, topic: &Topic) -> bool {
        let Some(connection) = self.connection(connection_id) else {
            return false;
        };
        if !connection.topics.lock().remove(topic) {
            return false;
        }

        self.detach(topic, connection_id);
        debug!(connection_id = %connection_id, topic = %topic, "Unsubscribed");
        true
    }

    /// Queue a frame on every subscriber of `topic`.
    pub fn publish_frame(&self, topic: &Topic, frame: &ServerFrame) {
        let text = match frame.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(topic = %topic, error = %e, "Failed to encode event");
                return;
            }
        };

        let subscribers: Vec<Uuid> = self
            .topics
            .get(topic)
            .map(|ids| ids.value().clone())
            .unwrap_or_default();

        let mut delivered = 0;
        let mut dropped = 0;
        let mut closed = Vec::new();

        for connection_id in subscribers {
            let Some(connection) = self.connection(connection_id) else {
                self.detach(topic, connection_id);
                continue;
            };
            match connection.sender.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    warn!(
                        topic = %topic,
                        user_id = connection.user_id,
                        connection_id = %connection_id,
                        "Subscriber queue full, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(connection_id),
            }
        }

        metrics::record_broadcast("delivered", delivered);
        metrics::record_broadcast("dropped", dropped);
        metrics::record_broadcast("closed", closed.len() as u64);

        for connection_id in closed {
            self.unregister(connection_id);
        }
    }

    /// Queue a frame on one connection. Returns false if it was not queued.
    pub fn send_to(&self, connection_id: Uuid, frame: &ServerFrame) -> bool {
        let Some(connection) = self.connection(connection_id) else {
            return false;
        };
        match frame.to_text() {
            Ok(text) => connection.sender.try_send(text).is_ok(),
            Err(_) => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map(|ids| ids.len()).unwrap_or(0)
    }

    fn connection(&self, connection_id: Uuid) -> Option<Arc<Connection>> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.value().clone())
    }

    fn detach(&self, topic: &Topic, connection_id: Uuid) {
        if let Some(mut ids) = self.topics.get_mut(topic) {
            ids.retain(|id| *id != connection_id);
        }
        self.topics.remove_if(topic, |_, ids| ids.is_empty());
    }
}

impl EventPublisher for Gateway {
    fn publish(&self, topic: &Topic, event: ServerEvent) {
        self.publish_frame(
            topic,
            &ServerFrame::Event {
                topic: *topic,
                payload: event,
            },
        );
    }
}
