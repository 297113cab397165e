use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use roomhub::{
    hub::{CancellationToken, Connection, ConnectionId, Hub, HubError, TerminationCause},
    InMemoryRoomRepository, RoomModel, RoomRepository,
};

use super::mocks::MockConnection;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub type SubscriptionHandle = JoinHandle<Result<TerminationCause, HubError>>;

pub struct HubTestSetup {
    pub hub: Hub,
    pub store: Arc<InMemoryRoomRepository>,
    pub room_id: Uuid,
}

impl HubTestSetup {
    /// A hub plus a store holding one room
    pub async fn with_room() -> Self {
        let store = Arc::new(InMemoryRoomRepository::new());
        let room = RoomModel::new("test-room".to_string());
        store.create_room(&room).await.unwrap();

        Self {
            hub: Hub::default(),
            store,
            room_id: room.id,
        }
    }

    /// Spawns a subscription task and waits until it is registered
    pub async fn subscribe(
        &self,
        connection: &Arc<MockConnection>,
        caller: CancellationToken,
    ) -> SubscriptionHandle {
        let hub = self.hub.clone();
        let store = Arc::clone(&self.store);
        let room_id = self.room_id;
        let conn: Arc<dyn Connection> = connection.clone();

        let handle =
            tokio::spawn(async move { hub.subscribe(store.as_ref(), room_id, conn, caller).await });

        self.wait_until(connection.id(), true).await;
        handle
    }

    pub async fn wait_until(&self, connection_id: ConnectionId, subscribed: bool) {
        timeout(Duration::from_secs(2), async {
            while self.hub.is_subscribed(self.room_id, connection_id) != subscribed {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("registry should reach the expected state");
    }

    pub fn subscriber_ids(&self) -> Vec<ConnectionId> {
        self.hub
            .snapshot_subscribers(self.room_id)
            .iter()
            .map(|s| s.connection.id())
            .collect()
    }
}

/// Waits for a subscription task to finish
pub async fn finished(handle: SubscriptionHandle) -> TerminationCause {
    timeout(Duration::from_secs(2), handle)
        .await
        .expect("subscription should end")
        .expect("subscription task should not panic")
        .expect("subscription should have been admitted")
}
