//! # Event Bus Dispatch Loop
//!
//! Owns the socket, the subscription registry and the reconnect state
//! machine:
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected
//!                                     │ receive error
//!                                     ▼
//!                  Connected ◀── Reconnecting
//! ```
//!
//! The initial connect gives up after a bounded number of attempts. Once a
//! link has worked, losing it is retried forever.

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::BusConfig;
use crate::events::BusMessage;
use crate::subscriber::{Applied, BusHandle, Registry, SubscriptionRequest};
use crate::transport::{Connector, FrameSocket};
use crate::{BusError, Result, TransportError};

/// Link state of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// First connection in progress.
    Connecting,
    /// Receiving frames.
    Connected,
    /// Re-establishing a lost link.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

enum Step {
    Cancelled,
    Request(SubscriptionRequest),
    Received(std::result::Result<Vec<Vec<u8>>, TransportError>),
}

/// Reconnecting subscriber to a publish endpoint.
pub struct EventBus<C: Connector> {
    connector: C,
    config: BusConfig,
    socket: Option<C::Socket>,
    registry: Registry,
    requests: mpsc::Receiver<SubscriptionRequest>,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> EventBus<C> {
    /// Connect to the configured endpoint.
    ///
    /// # Errors
    ///
    /// `BusError::ConnectExhausted` once `initial_connect_attempts` fail.
    pub async fn connect(connector: C, config: BusConfig) -> Result<(Self, BusHandle)> {
        config.validate()?;

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (request_tx, request_rx) = mpsc::channel(config.request_queue_capacity);

        let mut bus = Self {
            connector,
            config,
            socket: None,
            registry: Registry::default(),
            requests: request_rx,
            state: state_tx,
        };
        bus.connect_initial().await?;

        Ok((bus, BusHandle::new(request_tx, state_rx)))
    }

    /// Current link state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    async fn connect_initial(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let attempts = self.config.initial_connect_attempts;
        let mut last = TransportError::Closed;

        for attempt in 1..=attempts {
            match self.connector.connect(&self.config.endpoint).await {
                Ok(socket) => {
                    info!(endpoint = %self.config.endpoint, attempt, "Event bus connected");
                    self.socket = Some(socket);
                    self.set_state(ConnectionState::Connected);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.config.endpoint,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Event bus connect failed"
                    );
                    last = e;
                    if attempt < attempts {
                        tokio::time::sleep(self.config.connect_retry_interval).await;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Err(BusError::ConnectExhausted {
            endpoint: self.config.endpoint.clone(),
            attempts,
            last,
        })
    }

    /// Run the dispatch loop until `cancel` fires.
    ///
    /// Each iteration applies pending subscription requests, then waits for
    /// a frame or a new request. Delivery awaits every subscriber in
    /// registration order; a full subscriber channel stalls the loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(endpoint = %self.config.endpoint, "Event bus dispatch loop started");

        loop {
            self.drain_requests().await;

            let Some(socket) = self.socket.as_mut() else {
                if !self.reconnect(&cancel).await {
                    break;
                }
                continue;
            };

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                Some(request) = self.requests.recv() => Step::Request(request),
                received = socket.recv() => Step::Received(received),
            };

            match step {
                Step::Cancelled => break,
                Step::Request(request) => self.apply(request).await,
                Step::Received(Ok(frames)) => {
                    if !dispatch(&self.registry, &frames, &cancel).await {
                        break;
                    }
                }
                Step::Received(Err(e)) => {
                    error!(endpoint = %self.config.endpoint, error = %e, "Event bus receive failed");
                    self.socket = None;
                    self.set_state(ConnectionState::Disconnected);
                    if !sleep_or_cancel(self.config.reconnect_delay, &cancel).await {
                        break;
                    }
                }
            }
        }

        self.socket = None;
        self.set_state(ConnectionState::Disconnected);
        info!("Event bus dispatch loop stopped");
        Ok(())
    }

    async fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            self.apply(request).await;
        }
    }

    async fn apply(&mut self, request: SubscriptionRequest) {
        if let Applied::NewTopic(topic) = self.registry.apply(request) {
            if let Some(socket) = self.socket.as_mut() {
                if let Err(e) = socket.subscribe(&topic).await {
                    warn!(topic = %topic, error = %e, "Socket subscribe failed; retried on reconnect");
                }
            }
        }
    }

    /// Returns `false` if cancelled before a link came back.
    async fn reconnect(&mut self, cancel: &CancellationToken) -> bool {
        self.set_state(ConnectionState::Reconnecting);
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => return false,
                connected = self.connector.connect(&self.config.endpoint) => connected,
            };

            match connected {
                Ok(mut socket) => {
                    for topic in self.registry.topics() {
                        if let Err(e) = socket.subscribe(topic).await {
                            warn!(topic = %topic, error = %e, "Resubscribe failed");
                        }
                    }
                    self.socket = Some(socket);
                    self.set_state(ConnectionState::Connected);
                    info!(endpoint = %self.config.endpoint, attempt, "Event bus reconnected");
                    return true;
                }
                Err(e) => {
                    warn!(endpoint = %self.config.endpoint, attempt, error = %e, "Reconnect failed");
                    if !sleep_or_cancel(self.config.connect_retry_interval, cancel).await {
                        return false;
                    }
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Event bus state changed");
        }
    }
}

/// Deliver one frame to its topic's subscribers, in registration order.
///
/// Returns `false` if cancelled mid-delivery.
async fn dispatch(registry: &Registry, frames: &[Vec<u8>], cancel: &CancellationToken) -> bool {
    let message = match BusMessage::from_frames(frames) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Dropping malformed frame");
            return true;
        }
    };

    let subscribers = registry.subscribers(&message.topic);
    if subscribers.is_empty() {
        trace!(topic = %message.topic, "No subscribers for topic");
        return true;
    }

    for channel in subscribers {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = channel.send(message.clone()) => {
                if sent.is_err() {
                    debug!(topic = %message.topic, "Subscriber channel closed, message not delivered");
                }
            }
        }
    }
    true
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{topics, Sequence};
    use crate::transport::{MemoryConnector, MemoryFeed};
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::task::JoinHandle;

    const HASH: &str = "0000000000000000000000000000000000000000000000000000000000000abc";

    fn block(seq: u32) -> BusMessage {
        BusMessage {
            topic: topics::HASH_BLOCK.to_string(),
            payload_hex: HASH.to_string(),
            sequence: Sequence(Some(seq)),
        }
    }

    fn tx_marker() -> BusMessage {
        BusMessage {
            topic: topics::HASH_TX.to_string(),
            payload_hex: "ff".to_string(),
            sequence: Sequence(None),
        }
    }

    async fn start() -> (BusHandle, MemoryConnector, MemoryFeed, CancellationToken, JoinHandle<Result<()>>) {
        let (connector, feed) = MemoryConnector::new();
        let (bus, handle) = EventBus::connect(connector.clone(), BusConfig::default())
            .await
            .unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(bus.run(cancel.clone()));
        (handle, connector, feed, cancel, task)
    }

    #[tokio::test]
    async fn test_hashblock_reaches_only_its_subscribers() {
        let (handle, _connector, feed, cancel, task) = start().await;
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        let (t_tx, mut t_rx) = mpsc::channel(8);
        handle.subscribe(topics::HASH_BLOCK, a_tx).await.unwrap();
        handle.subscribe(topics::HASH_BLOCK, b_tx).await.unwrap();
        handle.subscribe(topics::HASH_TX, t_tx).await.unwrap();

        feed.publish(&block(9));
        feed.publish(&tx_marker());

        for rx in [&mut a_rx, &mut b_rx] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.payload_hex, HASH);
            assert_eq!(msg.sequence.value(), Some(9));
        }
        assert_eq!(t_rx.recv().await.unwrap().topic, topics::HASH_TX);

        cancel.cancel();
        assert!(task.await.unwrap().is_ok());
        assert!(matches!(a_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test]
    async fn test_delivery_in_arrival_order_exactly_once() {
        let (handle, _connector, feed, cancel, task) = start().await;
        let (tx, mut rx) = mpsc::channel(16);
        handle.subscribe(topics::HASH_BLOCK, tx).await.unwrap();

        for seq in 0..5 {
            feed.publish(&block(seq));
        }
        for seq in 0..5 {
            assert_eq!(rx.recv().await.unwrap().sequence.value(), Some(seq));
        }

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test]
    async fn test_unsubscribed_channel_gets_nothing_more() {
        let (handle, _connector, feed, cancel, task) = start().await;
        let (a_tx, mut a_rx) = mpsc::channel(8);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        handle.subscribe(topics::HASH_BLOCK, a_tx.clone()).await.unwrap();
        handle.subscribe(topics::HASH_BLOCK, b_tx).await.unwrap();

        feed.publish(&block(1));
        assert_eq!(a_rx.recv().await.unwrap().sequence.value(), Some(1));
        assert_eq!(b_rx.recv().await.unwrap().sequence.value(), Some(1));

        handle.unsubscribe(topics::HASH_BLOCK, a_tx.clone()).await.unwrap();
        feed.publish(&block(2));
        assert_eq!(b_rx.recv().await.unwrap().sequence.value(), Some(2));

        drop(a_tx);
        assert!(matches!(a_rx.try_recv(), Err(TryRecvError::Disconnected)));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let (handle, _connector, feed, cancel, task) = start().await;
        let (tx, mut rx) = mpsc::channel(8);
        handle.subscribe(topics::HASH_BLOCK, tx).await.unwrap();

        feed.publish_frames(vec![topics::HASH_BLOCK.as_bytes().to_vec()]);
        feed.publish(&block(3));

        assert_eq!(rx.recv().await.unwrap().sequence.value(), Some(3));
        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_and_reapplies_topics() {
        let (mut handle, connector, feed, cancel, task) = start().await;
        let (tx, mut rx) = mpsc::channel(8);
        handle.subscribe(topics::HASH_BLOCK, tx).await.unwrap();

        feed.publish(&block(1));
        assert_eq!(rx.recv().await.unwrap().sequence.value(), Some(1));

        connector.refuse_next(2);
        feed.fail("link reset");
        feed.publish(&block(2));

        assert_eq!(rx.recv().await.unwrap().sequence.value(), Some(2));
        handle.wait_for_state(ConnectionState::Connected).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(
            connector.subscribe_log(),
            vec![topics::HASH_BLOCK.to_string(), topics::HASH_BLOCK.to_string()]
        );

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_is_bounded() {
        let (connector, _feed) = MemoryConnector::new();
        connector.refuse_next(5);

        let result = EventBus::connect(connector.clone(), BusConfig::default()).await;
        match result {
            Err(BusError::ConnectExhausted { attempts, .. }) => assert_eq!(attempts, 5),
            other => panic!("expected ConnectExhausted, got {:?}", other.err()),
        }
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_connect_retries_then_succeeds() {
        let (connector, _feed) = MemoryConnector::new();
        connector.refuse_next(3);

        let (bus, handle) = EventBus::connect(connector.clone(), BusConfig::default())
            .await
            .unwrap();
        assert_eq!(bus.state(), ConnectionState::Connected);
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_cancel_stops_loop_and_closes_handle() {
        let (handle, _connector, _feed, cancel, task) = start().await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(
            handle.subscribe(topics::HASH_BLOCK, tx).await,
            Err(BusError::Closed)
        );
    }
}
