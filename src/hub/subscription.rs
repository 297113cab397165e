use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::{Connection, ConnectionId};
use super::registry::Hub;
use super::TopicId;

/// Errors surfaced to whoever asked for a subscription
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Topic not found: {0}")]
    TopicNotFound(TopicId),

    #[error("Topic lookup failed: {0}")]
    Store(String),
}

/// Existence check the hub runs before admitting a subscriber
#[async_trait]
pub trait TopicStore: Send + Sync {
    async fn topic_exists(&self, topic: TopicId) -> Result<bool, HubError>;
}

/// Phases a single subscription moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Registering,
    Active,
    Terminating,
    Terminated,
}

/// What woke an active subscription up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The subscription token fired, e.g. after a failed delivery
    Cancelled,
    /// The transport reported the peer gone
    ConnectionClosed,
    /// The caller's own cancellation source fired
    CallerCancelled,
}

/// A topic that passed validation and may now be subscribed to
#[must_use]
pub struct Admission {
    hub: Hub,
    topic: TopicId,
}

/// Scoped registry entry. Dropping it cancels the token and deregisters,
/// which also covers task abort and panics.
struct Registration {
    hub: Hub,
    topic: TopicId,
    connection_id: ConnectionId,
    generation: u64,
    cancel: CancellationToken,
}

impl Registration {
    fn new(hub: &Hub, topic: TopicId, connection: Arc<dyn Connection>) -> Self {
        let connection_id = connection.id();
        let (cancel, generation) = hub.register_entry(topic, connection);
        Self {
            hub: hub.clone(),
            topic,
            connection_id,
            generation,
            cancel,
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        debug!(
            room_id = %self.topic,
            connection_id = %self.connection_id,
            state = ?SubscriptionState::Terminating,
            "Releasing subscription"
        );
        self.cancel.cancel();
        self.hub
            .deregister_generation(self.topic, self.connection_id, self.generation);
    }
}

impl Hub {
    /// Validates that a topic exists. Nothing is registered on failure.
    pub async fn admit<S>(&self, store: &S, topic: TopicId) -> Result<Admission, HubError>
    where
        S: TopicStore + ?Sized,
    {
        debug!(room_id = %topic, state = ?SubscriptionState::Registering, "Validating topic");

        if !store.topic_exists(topic).await? {
            warn!(room_id = %topic, "Subscription rejected, topic does not exist");
            return Err(HubError::TopicNotFound(topic));
        }

        Ok(Admission {
            hub: self.clone(),
            topic,
        })
    }

    /// Runs a full subscription: validate, register, wait, deregister.
    ///
    /// Blocks until the subscription token, the connection's closed signal or
    /// `caller` fires. Only the admission error is returned to the caller.
    pub async fn subscribe<S>(
        &self,
        store: &S,
        topic: TopicId,
        connection: Arc<dyn Connection>,
        caller: CancellationToken,
    ) -> Result<TerminationCause, HubError>
    where
        S: TopicStore + ?Sized,
    {
        let admission = self.admit(store, topic).await?;
        Ok(admission.run(connection, caller).await)
    }
}

impl Admission {
    pub fn topic(&self) -> TopicId {
        self.topic
    }

    /// Registers the connection and suspends until the subscription ends
    #[instrument(name = "subscription", skip_all, fields(room_id = %self.topic))]
    pub async fn run(
        self,
        connection: Arc<dyn Connection>,
        caller: CancellationToken,
    ) -> TerminationCause {
        let registration = Registration::new(&self.hub, self.topic, Arc::clone(&connection));

        info!(
            connection_id = %registration.connection_id,
            state = ?SubscriptionState::Active,
            "Subscription active"
        );

        let cause = tokio::select! {
            _ = registration.cancel.cancelled() => TerminationCause::Cancelled,
            _ = connection.closed() => TerminationCause::ConnectionClosed,
            _ = caller.cancelled() => TerminationCause::CallerCancelled,
        };

        let connection_id = registration.connection_id;
        drop(registration);
        drop(connection);

        info!(
            connection_id = %connection_id,
            cause = ?cause,
            state = ?SubscriptionState::Terminated,
            "Subscription ended"
        );
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::{RecordingConnection, StaticTopicStore};
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use uuid::Uuid;

    async fn wait_until_subscribed(hub: &Hub, topic: TopicId, connection_id: ConnectionId) {
        timeout(Duration::from_secs(1), async {
            while !hub.is_subscribed(topic, connection_id) {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber should register");
    }

    #[tokio::test]
    async fn test_unknown_topic_is_rejected_without_registering() {
        let hub = Hub::default();
        let store = StaticTopicStore::empty();
        let topic = Uuid::new_v4();
        let c1 = RecordingConnection::new();

        let result = hub
            .subscribe(&store, topic, c1.clone(), CancellationToken::new())
            .await;

        assert!(matches!(result, Err(HubError::TopicNotFound(t)) if t == topic));
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let hub = Hub::default();
        let store = StaticTopicStore::failing();

        let result = hub.admit(&store, Uuid::new_v4()).await;

        assert!(matches!(result, Err(HubError::Store(_))));
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_token_cancel_deregisters() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let c1 = RecordingConnection::new();

        let task = {
            let hub = hub.clone();
            let c1 = c1.clone();
            tokio::spawn(async move {
                hub.subscribe(&store, topic, c1, CancellationToken::new())
                    .await
            })
        };
        wait_until_subscribed(&hub, topic, c1.id()).await;

        for subscriber in hub.snapshot_subscribers(topic) {
            subscriber.cancel.cancel();
        }

        let cause = task.await.unwrap().unwrap();
        assert_eq!(cause, TerminationCause::Cancelled);
        assert_eq!(hub.subscriber_count(topic), 0);
    }

    #[tokio::test]
    async fn test_external_deregister_ends_subscription() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let c1 = RecordingConnection::new();

        let task = {
            let hub = hub.clone();
            let c1 = c1.clone();
            tokio::spawn(async move {
                hub.subscribe(&store, topic, c1, CancellationToken::new())
                    .await
            })
        };
        wait_until_subscribed(&hub, topic, c1.id()).await;

        assert!(hub.deregister(topic, c1.id()));

        let cause = timeout(Duration::from_secs(1), task)
            .await
            .expect("subscription should end after deregister")
            .unwrap()
            .unwrap();
        assert_eq!(cause, TerminationCause::Cancelled);
        assert_eq!(hub.topic_count(), 0);

        hub.publish(topic, "after".into()).await;
        assert_eq!(c1.send_attempts(), 0);
    }

    #[tokio::test]
    async fn test_connection_close_deregisters() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let c1 = RecordingConnection::new();

        let task = {
            let hub = hub.clone();
            let c1 = c1.clone();
            tokio::spawn(async move {
                hub.subscribe(&store, topic, c1, CancellationToken::new())
                    .await
            })
        };
        wait_until_subscribed(&hub, topic, c1.id()).await;

        c1.close();

        let cause = task.await.unwrap().unwrap();
        assert_eq!(cause, TerminationCause::ConnectionClosed);
        assert!(!hub.is_subscribed(topic, c1.id()));
    }

    #[tokio::test]
    async fn test_caller_cancel_deregisters() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let c1 = RecordingConnection::new();
        let caller = CancellationToken::new();

        let task = {
            let hub = hub.clone();
            let c1 = c1.clone();
            let caller = caller.clone();
            tokio::spawn(async move { hub.subscribe(&store, topic, c1, caller).await })
        };
        wait_until_subscribed(&hub, topic, c1.id()).await;

        caller.cancel();

        let cause = task.await.unwrap().unwrap();
        assert_eq!(cause, TerminationCause::CallerCancelled);
        assert_eq!(hub.subscriber_count(topic), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_caller_still_cleans_up() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let caller = CancellationToken::new();
        caller.cancel();

        let cause = hub
            .subscribe(&store, topic, RecordingConnection::new(), caller)
            .await
            .unwrap();

        assert_eq!(cause, TerminationCause::CallerCancelled);
        assert_eq!(hub.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_aborted_task_still_deregisters() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let c1 = RecordingConnection::new();

        let task = {
            let hub = hub.clone();
            let c1 = c1.clone();
            tokio::spawn(async move {
                hub.subscribe(&store, topic, c1, CancellationToken::new())
                    .await
            })
        };
        wait_until_subscribed(&hub, topic, c1.id()).await;

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(hub.subscriber_count(topic), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_leads_to_eviction() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = StaticTopicStore::with_topics([topic]);
        let broken = RecordingConnection::failing();

        let task = {
            let hub = hub.clone();
            let broken = broken.clone();
            tokio::spawn(async move {
                hub.subscribe(&store, topic, broken, CancellationToken::new())
                    .await
            })
        };
        wait_until_subscribed(&hub, topic, broken.id()).await;

        hub.publish(topic, "event".into()).await;

        let cause = timeout(Duration::from_secs(1), task)
            .await
            .expect("subscription should end")
            .unwrap()
            .unwrap();
        assert_eq!(cause, TerminationCause::Cancelled);
        assert_eq!(hub.subscriber_count(topic), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_subscribe_cycles_leave_registry_empty() {
        let hub = Hub::default();
        let topic = Uuid::new_v4();
        let store = Arc::new(StaticTopicStore::with_topics([topic]));

        let mut tasks = Vec::new();
        for i in 0..64 {
            let hub = hub.clone();
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let caller = CancellationToken::new();
                let subscription = {
                    let hub = hub.clone();
                    let caller = caller.clone();
                    tokio::spawn(async move {
                        hub.subscribe(store.as_ref(), topic, RecordingConnection::new(), caller)
                            .await
                    })
                };
                hub.publish(topic, format!("event-{i}").into()).await;
                sleep(Duration::from_millis(i % 7)).await;
                caller.cancel();
                subscription.await.unwrap().unwrap();
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(hub.subscriber_count(topic), 0);
        assert_eq!(hub.topic_count(), 0);
    }
}
