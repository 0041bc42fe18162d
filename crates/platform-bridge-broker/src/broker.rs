//! Message broker: listener fan-out and correlation-id requests
//!
//! The broker owns the dispatch task for one side of the channel. That task:
//! - Decodes incoming messages, dropping malformed ones
//! - Ignores messages this side originated (self-echo)
//! - Resolves the pending request keyed by `(type, action, id)`, at most once
//! - Fans the message out to a snapshot of the registered listeners
//!
//! `request` imposes no timeout. A response that never arrives leaves the
//! call pending forever; use `request_with_timeout` or wrap the call in your
//! own deadline.

use crate::channel::{ChannelReceiver, MessageChannel, TARGET_ANY};
use crate::protocol::{Action, Message, Module, SideTag, decode, encode};
use platform_bridge_core::{BridgeError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Callback invoked for every message from the other side
pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Logical listener channel. Only one exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Message,
}

/// Handle returned by `add_listener`, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CorrelationKey {
    module: Module,
    action: Action,
    id: String,
}

struct PendingRequest {
    created_at: Instant,
    resolve: oneshot::Sender<Message>,
}

#[derive(Default)]
struct Shared {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    pending: Mutex<HashMap<CorrelationKey, PendingRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn resolve_pending(&self, msg: &Message) {
        let Some(id) = msg.id.clone() else {
            return;
        };
        let key = CorrelationKey {
            module: msg.module,
            action: msg.action,
            id,
        };
        let pending = lock(&self.pending).remove(&key);
        match pending {
            Some(request) => {
                debug!(
                    "Resolved {}/{} id={} after {:?}",
                    key.module,
                    key.action,
                    key.id,
                    request.created_at.elapsed()
                );
                // The caller may have gone away; a late response is simply discarded
                let _ = request.resolve.send(msg.clone());
            }
            None => {
                debug!(
                    "No pending request for {}/{} id={}, ignoring",
                    key.module, key.action, key.id
                );
            }
        }
    }

    fn notify(&self, msg: &Message) {
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(msg))).is_err() {
                error!("Listener panicked on {}/{}", msg.module, msg.action);
            }
        }
    }
}

/// Removes a pending request when the caller stops waiting for it
struct PendingGuard {
    shared: Arc<Shared>,
    key: CorrelationKey,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.shared.pending).remove(&self.key);
    }
}

/// Sending half of a broker, cheap to clone into listeners
#[derive(Clone)]
pub struct MessageSender {
    side: SideTag,
    channel: Arc<dyn MessageChannel>,
}

impl MessageSender {
    /// Post `msg` to `target` (`"*"` for everyone), stamping `source` if unset
    pub fn send(&self, mut msg: Message, target: &str) -> Result<()> {
        if msg.source.is_none() {
            msg.source = Some(self.side.clone());
        }
        let data = encode(&msg)?;

        let json_preview: String = data.to_string().chars().take(200).collect();
        debug!("[{}→{}] {}", self.side, target, json_preview);

        self.channel.post(data, target)
    }

    pub fn side(&self) -> &SideTag {
        &self.side
    }
}

struct Inner {
    sender: MessageSender,
    shared: Arc<Shared>,
    next_listener: AtomicU64,
    dispatch: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispatch.abort();
    }
}

/// Broker for one side of a message channel
///
/// Must be created inside a tokio runtime: construction spawns the dispatch task.
#[derive(Clone)]
pub struct MessageBroker {
    inner: Arc<Inner>,
}

impl MessageBroker {
    /// Attach a broker tagged `side` to `channel`
    pub fn new(channel: impl MessageChannel + 'static, side: SideTag) -> Self {
        let channel: Arc<dyn MessageChannel> = Arc::new(channel);
        // Subscribe before returning so nothing posted after construction is missed
        let rx = channel.subscribe();
        let shared = Arc::new(Shared::default());
        let dispatch = tokio::spawn(dispatch_task(rx, side.clone(), shared.clone()));

        Self {
            inner: Arc::new(Inner {
                sender: MessageSender { side, channel },
                shared,
                next_listener: AtomicU64::new(1),
                dispatch,
            }),
        }
    }

    pub fn side(&self) -> &SideTag {
        self.inner.sender.side()
    }

    /// A sending handle that does not keep the broker alive
    pub fn sender(&self) -> MessageSender {
        self.inner.sender.clone()
    }

    /// Enqueue `msg` for asynchronous delivery to `target`
    pub fn send(&self, msg: Message, target: &str) -> Result<()> {
        self.inner.sender.send(msg, target)
    }

    /// Register a listener for messages originated by other sides
    pub fn add_listener<F>(&self, channel: Channel, callback: F) -> ListenerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let Channel::Message = channel;
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        let listener: Listener = Arc::new(callback);
        lock(&self.inner.shared.listeners).push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, channel: Channel, id: ListenerId) -> bool {
        let Channel::Message = channel;
        let mut listeners = lock(&self.inner.shared.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Send a request and wait for the matching response from the other side.
    ///
    /// Never times out on its own. Dropping the returned future cancels the
    /// request; a response arriving afterwards is ignored.
    pub async fn request(
        &self,
        module: Module,
        action: Action,
        payload: Map<String, Value>,
    ) -> Result<Message> {
        if action.module() != module {
            return Err(BridgeError::ProtocolMismatch(format!(
                "action {} is not part of module {}",
                action, module
            )));
        }

        let id = Uuid::new_v4().to_string();
        let key = CorrelationKey {
            module,
            action,
            id: id.clone(),
        };
        let (resolve, response_rx) = oneshot::channel();

        // Register before sending so an immediate response cannot be missed
        lock(&self.inner.shared.pending).insert(
            key.clone(),
            PendingRequest {
                created_at: Instant::now(),
                resolve,
            },
        );
        let _guard = PendingGuard {
            shared: self.inner.shared.clone(),
            key,
        };

        let msg = Message {
            module,
            action,
            id: Some(id),
            source: Some(self.side().clone()),
            sender: None,
            payload,
        };
        self.send(msg, TARGET_ANY)?;

        response_rx
            .await
            .map_err(|_| BridgeError::Transport("Broker dispatch stopped".into()))
    }

    /// `request` bounded by `timeout`, failing with `Unresponsive` on expiry
    pub async fn request_with_timeout(
        &self,
        module: Module,
        action: Action,
        payload: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Message> {
        tokio::time::timeout(timeout, self.request(module, action, payload))
            .await
            .map_err(|_| {
                warn!("{}/{} got no response within {:?}", module, action, timeout);
                BridgeError::Unresponsive(format!("{}/{} after {:?}", module, action, timeout))
            })?
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.shared.pending).len()
    }
}

async fn dispatch_task(mut rx: ChannelReceiver, side: SideTag, shared: Arc<Shared>) {
    while let Some(envelope) = rx.recv().await {
        let msg = match decode(envelope.data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping malformed message at {}: {}", side, e);
                continue;
            }
        };

        if msg.is_from(&side) {
            continue;
        }

        shared.resolve_pending(&msg);
        shared.notify(&msg);
    }
    debug!("Channel closed, dispatch for {} exiting", side);
}
