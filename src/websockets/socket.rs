use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::hub::{Connection, ConnectionId, DeliveryError, Payload};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // Pings are answered by axum, binary frames carry nothing for us
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Hub-facing side of a WebSocket: queues payloads for the pump
pub struct SocketConnection {
    id: ConnectionId,
    outbound: mpsc::Sender<Payload>,
    closed: CancellationToken,
}

#[async_trait]
impl Connection for SocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.outbound.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backpressure,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// Socket-facing side: owns the socket and moves queued payloads onto it
pub struct SocketPump {
    id: ConnectionId,
    socket: Box<dyn SocketWrapper>,
    outbound: mpsc::Receiver<Payload>,
    closed: CancellationToken,
}

/// Splits a socket into the hub connection and the pump driving it.
/// `buffer` bounds how many payloads may wait for a slow client.
pub fn socket_channel(socket: Box<dyn SocketWrapper>, buffer: usize) -> (SocketConnection, SocketPump) {
    let id = ConnectionId::new();
    let (sender, receiver) = mpsc::channel(buffer.max(1));
    let closed = CancellationToken::new();

    let connection = SocketConnection {
        id,
        outbound: sender,
        closed: closed.clone(),
    };
    let pump = SocketPump {
        id,
        socket,
        outbound: receiver,
        closed,
    };
    (connection, pump)
}

impl SocketPump {
    /// Runs until the client goes away, every connection handle is dropped,
    /// or `release` fires. Always fires the closed signal and closes the socket.
    pub async fn run(mut self, release: CancellationToken) -> Result<(), SocketError> {
        let result = self.pump(&release).await;

        self.closed.cancel();
        match timeout(CLOSE_TIMEOUT, self.socket.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(connection_id = %self.id, error = %e, "Socket close failed"),
            Err(_elapsed) => debug!(connection_id = %self.id, "Socket close timed out"),
        }

        if let Err(e) = &result {
            warn!(connection_id = %self.id, error = %e, "Socket ended with error");
        }
        result
    }

    async fn pump(&mut self, release: &CancellationToken) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound: hub -> client
                msg = self.outbound.recv() => {
                    let Some(payload) = msg else {
                        return Ok(());
                    };
                    tokio::select! {
                        sent = self.socket.send_message(payload.to_string()) => sent?,
                        _ = release.cancelled() => return Ok(()),
                    }
                }

                // Inbound: only close frames matter
                msg = self.socket.receive_message() => {
                    match msg? {
                        Some(text) => {
                            debug!(connection_id = %self.id, len = text.len(), "Ignoring inbound message");
                        }
                        None => {
                            debug!(connection_id = %self.id, "Client disconnected");
                            return Ok(());
                        }
                    }
                }

                _ = release.cancelled() => return Ok(()),
            }
        }
    }
}
