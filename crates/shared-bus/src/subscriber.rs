//! # Subscriptions
//!
//! Callers never touch the registry. They enqueue [`SubscriptionRequest`]s
//! through a [`BusHandle`]; the dispatch loop applies them between receives.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::bus::ConnectionState;
use crate::events::BusMessage;
use crate::{BusError, Result};

/// A registry mutation.
#[derive(Debug)]
pub enum SubscriptionRequest {
    /// Append `channel` to the subscribers of `topic`.
    Add {
        topic: String,
        channel: mpsc::Sender<BusMessage>,
    },
    /// Remove the first registration of `channel` under `topic`.
    Remove {
        topic: String,
        channel: mpsc::Sender<BusMessage>,
    },
}

/// Cloneable handle for changing subscriptions at runtime.
#[derive(Clone)]
pub struct BusHandle {
    requests: mpsc::Sender<SubscriptionRequest>,
    state: watch::Receiver<ConnectionState>,
}

impl BusHandle {
    pub(crate) fn new(
        requests: mpsc::Sender<SubscriptionRequest>,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self { requests, state }
    }

    /// Deliver every future message on `topic` to `channel`.
    ///
    /// # Errors
    ///
    /// `BusError::Closed` if the dispatch loop has exited.
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        channel: mpsc::Sender<BusMessage>,
    ) -> Result<()> {
        self.requests
            .send(SubscriptionRequest::Add {
                topic: topic.into(),
                channel,
            })
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Stop delivering `topic` to `channel`.
    ///
    /// Identity is channel identity: any clone of the subscribed sender
    /// matches.
    pub async fn unsubscribe(
        &self,
        topic: impl Into<String>,
        channel: mpsc::Sender<BusMessage>,
    ) -> Result<()> {
        self.requests
            .send(SubscriptionRequest::Remove {
                topic: topic.into(),
                channel,
            })
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Current connection state of the bus.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the bus reaches `target`.
    pub async fn wait_for_state(&mut self, target: ConnectionState) -> Result<()> {
        self.state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| BusError::Closed)
    }
}

/// Outcome of applying a request, used to keep the socket in step.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    /// First subscriber for a topic; the socket must subscribe to it.
    NewTopic(String),
    /// Registry changed, socket untouched.
    Updated,
    /// Nothing matched.
    Unchanged,
}

/// Topic → ordered subscriber channels. Owned by the dispatch loop.
#[derive(Default)]
pub(crate) struct Registry {
    topics: HashMap<String, Vec<mpsc::Sender<BusMessage>>>,
}

impl Registry {
    pub(crate) fn apply(&mut self, request: SubscriptionRequest) -> Applied {
        match request {
            SubscriptionRequest::Add { topic, channel } => {
                let is_new = !self.topics.contains_key(&topic);
                self.topics.entry(topic.clone()).or_default().push(channel);
                debug!(topic = %topic, "Subscriber added");
                if is_new {
                    Applied::NewTopic(topic)
                } else {
                    Applied::Updated
                }
            }
            SubscriptionRequest::Remove { topic, channel } => {
                let Some(channels) = self.topics.get_mut(&topic) else {
                    return Applied::Unchanged;
                };
                match channels.iter().position(|c| c.same_channel(&channel)) {
                    Some(index) => {
                        channels.remove(index);
                        debug!(topic = %topic, "Subscriber removed");
                        Applied::Updated
                    }
                    None => Applied::Unchanged,
                }
            }
        }
    }

    pub(crate) fn subscribers(&self, topic: &str) -> &[mpsc::Sender<BusMessage>] {
        self.topics.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Topics ever subscribed; reapplied to fresh sockets.
    pub(crate) fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }
}
