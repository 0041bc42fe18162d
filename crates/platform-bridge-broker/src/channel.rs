//! Message channel shared by the two sides of the bridge
//!
//! A `LocalChannel` behaves like a shared window: every endpoint on the same
//! bus receives every posted message, its own included, provided the target
//! matches the endpoint's origin. Delivery always happens on the receiving
//! task, never inside `post`. Each subscriber has its own unbounded queue, so
//! a burst of posts is never dropped locally.

use platform_bridge_core::Result;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

/// Target accepted by every endpoint
pub const TARGET_ANY: &str = "*";

/// A posted message together with its delivery metadata
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Origin the message is addressed to, or `"*"`
    pub target: String,
    /// Opaque message body
    pub data: Value,
    /// Set when the message was relayed in from a remote peer
    pub relayed: bool,
}

impl Envelope {
    pub fn accepts(&self, origin: &str) -> bool {
        self.target == TARGET_ANY || self.target == origin
    }
}

/// Duplex, unordered-delivery transport between two execution contexts
pub trait MessageChannel: Send + Sync {
    /// Origin name this endpoint receives as
    fn origin(&self) -> &str;

    /// Post a message for later delivery to every endpoint matching `target`
    fn post(&self, data: Value, target: &str) -> Result<()>;

    /// Receive every message delivered to this endpoint from now on
    fn subscribe(&self) -> ChannelReceiver;
}

/// Receiving half handed out by `MessageChannel::subscribe`
pub struct ChannelReceiver {
    origin: String,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl ChannelReceiver {
    /// Next envelope addressed to this endpoint, or `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Envelope> {
        while let Some(envelope) = self.rx.recv().await {
            if envelope.accepts(&self.origin) {
                return Some(envelope);
            }
            debug!(
                "Skipping message for target {} at {}",
                envelope.target, self.origin
            );
        }
        None
    }
}

type Subscribers = Mutex<Vec<mpsc::UnboundedSender<Envelope>>>;

/// In-process channel endpoint
#[derive(Clone)]
pub struct LocalChannel {
    origin: String,
    bus: Arc<Subscribers>,
}

impl LocalChannel {
    /// Create a new bus with a first endpoint named `origin`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            bus: Arc::default(),
        }
    }

    /// Another endpoint on the same bus
    pub fn endpoint(&self, origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            bus: self.bus.clone(),
        }
    }

    /// Number of live subscriptions on the bus
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    pub(crate) fn post_envelope(&self, envelope: Envelope) {
        let mut subscribers = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        // Dropped receivers are pruned here
        subscribers.retain(|tx| tx.send(envelope.clone()).is_ok());
        if subscribers.is_empty() {
            debug!("Posted message at {} with no receivers", self.origin);
        }
    }
}

impl MessageChannel for LocalChannel {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn post(&self, data: Value, target: &str) -> Result<()> {
        self.post_envelope(Envelope {
            target: target.to_string(),
            data,
            relayed: false,
        });
        Ok(())
    }

    fn subscribe(&self) -> ChannelReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.bus
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        ChannelReceiver {
            origin: self.origin.clone(),
            rx,
        }
    }
}
