use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::{Connection, ConnectionId};
use super::publisher::PublishLanes;
use super::TopicId;
use crate::config::HubConfig;

/// A registered connection together with the token that tears it down
#[derive(Clone)]
pub struct Subscriber {
    pub connection: Arc<dyn Connection>,
    pub cancel: CancellationToken,
}

struct Entry {
    subscriber: Subscriber,
    // Distinguishes a re-registration of the same connection from the original one
    generation: u64,
}

#[derive(Default)]
struct Registry {
    topics: HashMap<TopicId, HashMap<ConnectionId, Entry>>,
    next_generation: u64,
}

/// Process-wide registry of live subscribers, keyed by topic.
///
/// Every read and write goes through one mutex. Critical sections are map
/// operations and snapshot copies only, the lock is never held across a send.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<Mutex<Registry>>,
    pub(super) lanes: Arc<Mutex<PublishLanes>>,
    pub(super) send_timeout: Duration,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            lanes: Arc::new(Mutex::new(PublishLanes::new())),
            send_timeout: config.send_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Critical sections never panic midway, so a poisoned map is still consistent
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection under a topic and returns its fresh cancellation token
    pub fn register(&self, topic: TopicId, connection: Arc<dyn Connection>) -> CancellationToken {
        self.register_entry(topic, connection).0
    }

    pub(super) fn register_entry(
        &self,
        topic: TopicId,
        connection: Arc<dyn Connection>,
    ) -> (CancellationToken, u64) {
        let connection_id = connection.id();
        let cancel = CancellationToken::new();

        let mut registry = self.lock();
        let generation = registry.next_generation;
        registry.next_generation += 1;

        let previous = registry.topics.entry(topic).or_default().insert(
            connection_id,
            Entry {
                subscriber: Subscriber {
                    connection,
                    cancel: cancel.clone(),
                },
                generation,
            },
        );
        drop(registry);

        if let Some(previous) = previous {
            debug!(
                room_id = %topic,
                connection_id = %connection_id,
                "Connection re-registered, cancelling previous subscription"
            );
            previous.subscriber.cancel.cancel();
        }

        info!(room_id = %topic, connection_id = %connection_id, "Subscriber registered");
        (cancel, generation)
    }

    /// Removes a connection from a topic and cancels its token, so the owning
    /// lifecycle task winds down too. Removing an absent entry is a no-op.
    pub fn deregister(&self, topic: TopicId, connection_id: ConnectionId) -> bool {
        self.remove_where(topic, connection_id, |_| true)
    }

    /// Removes the entry only if it still belongs to the given registration
    pub(super) fn deregister_generation(
        &self,
        topic: TopicId,
        connection_id: ConnectionId,
        generation: u64,
    ) -> bool {
        self.remove_where(topic, connection_id, |entry| entry.generation == generation)
    }

    fn remove_where(
        &self,
        topic: TopicId,
        connection_id: ConnectionId,
        matches: impl FnOnce(&Entry) -> bool,
    ) -> bool {
        let mut registry = self.lock();
        let Some(subscribers) = registry.topics.get_mut(&topic) else {
            debug!(room_id = %topic, connection_id = %connection_id, "Deregister on unknown topic ignored");
            return false;
        };

        let removed = match subscribers.get(&connection_id) {
            Some(entry) if matches(entry) => subscribers.remove(&connection_id),
            _ => None,
        };

        if subscribers.is_empty() {
            registry.topics.remove(&topic);
        }
        drop(registry);

        match removed {
            Some(entry) => {
                entry.subscriber.cancel.cancel();
                info!(room_id = %topic, connection_id = %connection_id, "Subscriber deregistered");
                true
            }
            None => {
                debug!(room_id = %topic, connection_id = %connection_id, "Subscriber already gone");
                false
            }
        }
    }

    /// Point-in-time copy of a topic's subscribers
    pub fn snapshot_subscribers(&self, topic: TopicId) -> Vec<Subscriber> {
        self.lock()
            .topics
            .get(&topic)
            .map(|subscribers| {
                subscribers
                    .values()
                    .map(|entry| entry.subscriber.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, topic: TopicId) -> usize {
        self.lock().topics.get(&topic).map_or(0, HashMap::len)
    }

    /// Number of topics that currently have at least one subscriber
    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    pub fn is_subscribed(&self, topic: TopicId, connection_id: ConnectionId) -> bool {
        self.lock()
            .topics
            .get(&topic)
            .is_some_and(|subscribers| subscribers.contains_key(&connection_id))
    }
}
