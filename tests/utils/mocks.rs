use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use roomhub::hub::{CancellationToken, Connection, ConnectionId, DeliveryError, Payload};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Connection that records payloads; sends can be made to fail at any time
pub struct MockConnection {
    id: ConnectionId,
    received: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
    closed: CancellationToken,
}

impl MockConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            received: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.closed.cancel();
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("broken pipe".to_string()));
        }
        self.received.lock().unwrap().push(payload.to_string());
        Ok(())
    }

    async fn closed(&self) {
        self.closed.cancelled().await
    }
}
