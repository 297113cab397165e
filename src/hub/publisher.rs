use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::connection::{DeliveryError, Payload};
use super::registry::{Hub, Subscriber};
use super::TopicId;

/// One detached publish: the subscribers captured at call time and the payload
pub(super) struct Dispatch {
    subscribers: Vec<Subscriber>,
    payload: Payload,
    done: oneshot::Sender<()>,
}

/// Per-topic queues that deliver detached publishes in call order
pub(super) type PublishLanes = HashMap<TopicId, mpsc::UnboundedSender<Dispatch>>;

impl Hub {
    /// Delivers one payload to every current subscriber of a topic.
    ///
    /// Sends run concurrently and outside the registry lock. A subscriber whose
    /// send fails or times out gets its token cancelled; its lifecycle task
    /// performs the actual deregistration. Failures never reach the caller.
    pub async fn publish(&self, topic: TopicId, payload: Payload) {
        let subscribers = self.snapshot_subscribers(topic);
        self.deliver_all(topic, subscribers, payload).await;
    }

    /// Detached variant of [`Hub::publish`] for request handlers.
    ///
    /// Subscribers are captured before this returns. Deliveries for one topic
    /// run in the order of the calls. The receiver resolves once this payload
    /// has been handed to every captured subscriber; dropping it is fine.
    pub fn spawn_publish(&self, topic: TopicId, payload: Payload) -> oneshot::Receiver<()> {
        let subscribers = self.snapshot_subscribers(topic);
        let (done, delivered) = oneshot::channel();
        if subscribers.is_empty() {
            debug!(room_id = %topic, "No subscribers, nothing to publish");
            let _ = done.send(());
            return delivered;
        }

        let dispatch = Dispatch {
            subscribers,
            payload,
            done,
        };

        let mut lanes = self.lanes();
        let dispatch = match lanes.get(&topic) {
            Some(lane) => match lane.send(dispatch) {
                Ok(()) => return delivered,
                // Worker is gone (runtime shutting down), start a fresh lane
                Err(mpsc::error::SendError(dispatch)) => dispatch,
            },
            None => dispatch,
        };

        let (lane, jobs) = mpsc::unbounded_channel();
        let _ = lane.send(dispatch);
        lanes.insert(topic, lane);
        drop(lanes);

        tokio::spawn(self.clone().drain_lane(topic, jobs));
        delivered
    }

    fn lanes(&self) -> MutexGuard<'_, PublishLanes> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain_lane(self, topic: TopicId, mut jobs: mpsc::UnboundedReceiver<Dispatch>) {
        loop {
            // Checked under the lanes lock so no publish lands in a lane nobody drains
            let dispatch = {
                let mut lanes = self.lanes();
                match jobs.try_recv() {
                    Ok(dispatch) => dispatch,
                    Err(_) => {
                        lanes.remove(&topic);
                        return;
                    }
                }
            };

            self.deliver_all(topic, dispatch.subscribers, dispatch.payload)
                .await;
            let _ = dispatch.done.send(());
        }
    }

    async fn deliver_all(&self, topic: TopicId, subscribers: Vec<Subscriber>, payload: Payload) {
        if subscribers.is_empty() {
            debug!(room_id = %topic, "No subscribers, nothing to publish");
            return;
        }

        let deliveries = subscribers
            .into_iter()
            .filter(|subscriber| !subscriber.cancel.is_cancelled())
            .map(|subscriber| self.deliver(topic, subscriber, payload.clone()));

        let outcomes = join_all(deliveries).await;
        let delivered = outcomes.iter().filter(|delivered| **delivered).count();

        debug!(
            room_id = %topic,
            delivered = delivered,
            failed = outcomes.len() - delivered,
            "Event published"
        );
    }

    async fn deliver(&self, topic: TopicId, subscriber: Subscriber, payload: Payload) -> bool {
        let connection_id = subscriber.connection.id();

        let result = match timeout(self.send_timeout, subscriber.connection.send(payload)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(DeliveryError::Timeout),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    room_id = %topic,
                    connection_id = %connection_id,
                    error = %e,
                    "Failed to deliver event, cancelling subscriber"
                );
                subscriber.cancel.cancel();
                false
            }
        }
    }
}
