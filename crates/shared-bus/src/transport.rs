//! # Frame Transport
//!
//! The socket seam under [`crate::EventBus`]. [`ZmqConnector`] talks to a
//! real ZeroMQ publisher; [`MemoryConnector`] is an in-process feed used by
//! tests and by harness dry runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use zeromq::{Socket, SocketRecv};

use crate::events::BusMessage;
use crate::TransportError;

/// A connected socket delivering multipart frames.
#[async_trait]
pub trait FrameSocket: Send {
    /// Register interest in `topic` (prefix match on the first field).
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Wait for the next multipart frame.
    ///
    /// Must be cancel safe: dropping the future loses no frame.
    async fn recv(&mut self) -> Result<Vec<Vec<u8>>, TransportError>;
}

/// Opens [`FrameSocket`]s to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Socket type produced by this connector.
    type Socket: FrameSocket;

    /// Connect to `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<Self::Socket, TransportError>;
}

// =============================================================================
// ZEROMQ
// =============================================================================

/// Connector for a ZeroMQ PUB endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZmqConnector;

/// SUB socket connected to a ZeroMQ publisher.
pub struct ZmqFrameSocket {
    socket: zeromq::SubSocket,
}

#[async_trait]
impl Connector for ZmqConnector {
    type Socket = ZmqFrameSocket;

    async fn connect(&self, endpoint: &str) -> Result<Self::Socket, TransportError> {
        let mut socket = zeromq::SubSocket::new();
        socket
            .connect(endpoint)
            .await
            .map_err(|e| TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
        Ok(ZmqFrameSocket { socket })
    }
}

#[async_trait]
impl FrameSocket for ZmqFrameSocket {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.socket
            .subscribe(topic)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let message = self
            .socket
            .recv()
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        Ok(message.iter().map(|frame| frame.to_vec()).collect())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

type FeedItem = Result<Vec<Vec<u8>>, TransportError>;

struct MemoryShared {
    frames: Mutex<mpsc::UnboundedReceiver<FeedItem>>,
    refuse_remaining: AtomicU32,
    connects: AtomicU32,
    subscribe_log: StdMutex<Vec<String>>,
}

/// Publishing side of an in-memory transport.
#[derive(Clone)]
pub struct MemoryFeed {
    tx: mpsc::UnboundedSender<FeedItem>,
}

impl MemoryFeed {
    /// Publish a message. Returns `false` when every socket is gone.
    pub fn publish(&self, message: &BusMessage) -> bool {
        self.publish_frames(message.to_frames())
    }

    /// Publish raw frames.
    pub fn publish_frames(&self, frames: Vec<Vec<u8>>) -> bool {
        self.tx.send(Ok(frames)).is_ok()
    }

    /// Make the next receive fail as if the link dropped.
    pub fn fail(&self, reason: &str) -> bool {
        self.tx
            .send(Err(TransportError::Receive(reason.to_string())))
            .is_ok()
    }
}

/// In-process connector. All sockets it opens read from one shared feed.
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<MemoryShared>,
}

impl MemoryConnector {
    /// Create a connector and the feed that drives it.
    pub fn new() -> (Self, MemoryFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(MemoryShared {
                frames: Mutex::new(rx),
                refuse_remaining: AtomicU32::new(0),
                connects: AtomicU32::new(0),
                subscribe_log: StdMutex::new(Vec::new()),
            }),
        };
        (connector, MemoryFeed { tx })
    }

    /// Refuse the next `n` connect attempts.
    pub fn refuse_next(&self, n: u32) {
        self.shared.refuse_remaining.store(n, Ordering::SeqCst);
    }

    /// Successful connects so far.
    pub fn connect_count(&self) -> u32 {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Every topic subscription issued on any socket, in order.
    pub fn subscribe_log(&self) -> Vec<String> {
        self.shared
            .subscribe_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

/// Socket produced by [`MemoryConnector`].
pub struct MemorySocket {
    shared: Arc<MemoryShared>,
    topics: Vec<String>,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Socket = MemorySocket;

    async fn connect(&self, endpoint: &str) -> Result<Self::Socket, TransportError> {
        let refused = self
            .shared
            .refuse_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect {
                endpoint: endpoint.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySocket {
            shared: Arc::clone(&self.shared),
            topics: Vec::new(),
        })
    }
}

#[async_trait]
impl FrameSocket for MemorySocket {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if let Ok(mut log) = self.shared.subscribe_log.lock() {
            log.push(topic.to_string());
        }
        self.topics.push(topic.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut frames = self.shared.frames.lock().await;
        loop {
            match frames.recv().await {
                Some(Ok(item)) => {
                    let wanted = item
                        .first()
                        .is_some_and(|t| self.topics.iter().any(|s| t.starts_with(s.as_bytes())));
                    if wanted {
                        return Ok(item);
                    }
                    debug!("Memory socket filtered unsubscribed frame");
                }
                Some(Err(e)) => return Err(e),
                None => return Err(TransportError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_socket_filters_by_prefix() {
        let (connector, feed) = MemoryConnector::new();
        let mut socket = connector.connect("mem").await.unwrap();
        socket.subscribe("hashblock").await.unwrap();

        feed.publish_frames(vec![b"hashtx".to_vec(), vec![1]]);
        feed.publish_frames(vec![b"hashblock".to_vec(), vec![2]]);

        let frames = socket.recv().await.unwrap();
        assert_eq!(frames[1], vec![2]);
        assert_eq!(connector.subscribe_log(), vec!["hashblock".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_connector_refusals() {
        let (connector, _feed) = MemoryConnector::new();
        connector.refuse_next(2);
        assert!(connector.connect("mem").await.is_err());
        assert!(connector.connect("mem").await.is_err());
        assert!(connector.connect("mem").await.is_ok());
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_surfaces() {
        let (connector, feed) = MemoryConnector::new();
        let mut socket = connector.connect("mem").await.unwrap();
        feed.fail("link down");
        assert_eq!(
            socket.recv().await,
            Err(TransportError::Receive("link down".to_string()))
        );
    }
}
