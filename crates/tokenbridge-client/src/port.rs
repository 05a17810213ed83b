//! Cross-context messaging primitive.
//!
//! The only contract with the host is "post an envelope, receive envelopes
//! asynchronously". [`HostPort`] captures that; [`LocalPort`] implements it in
//! process and [`crate::WsPort`] over a WebSocket.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokenbridge_core::{Envelope, EnvelopeError, ExecutionMode, Origin, TargetOrigin};

/// A message received from another context.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sender origin as reported by the transport, if known.
    pub origin: Option<Origin>,
    /// Raw payload. Not yet validated as an envelope.
    pub data: serde_json::Value,
}

/// Callback invoked for every inbound message.
pub type Listener = Arc<dyn Fn(InboundMessage) + Send + Sync>;

/// A two-way channel to the (possible) host context.
pub trait HostPort: Send + Sync {
    /// Whether there is an enclosing host to talk to.
    fn mode(&self) -> ExecutionMode;

    /// Register an inbound listener. Dropping the subscription removes it.
    fn subscribe(&self, listener: Listener) -> Result<Subscription, PortError>;

    /// Send an envelope to the enclosing context.
    fn post(&self, envelope: &Envelope, target: &TargetOrigin) -> Result<(), PortError>;
}

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("listener registration refused: {0}")]
    Register(String),
    #[error("no parent context to post to")]
    NoParent,
    #[error("port is closed")]
    Closed,
    #[error("outbound queue is full")]
    Backlogged,
    #[error("invalid host url: {0}")]
    BadUrl(String),
    #[error("connection to host failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] EnvelopeError),
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Listener registry shared by port implementations.
#[derive(Clone, Default)]
pub struct ListenerSet {
    registry: Arc<Mutex<Registry>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Listener) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, listener);
        tracing::trace!(id, "listener registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `message` to every listener registered at call time.
    ///
    /// Listeners run outside the registry lock, so a listener may dispose
    /// itself (or others) while being called.
    pub fn dispatch(&self, message: InboundMessage) -> usize {
        let listeners: Vec<Listener> = lock(&self.registry).listeners.values().cloned().collect();
        for listener in &listeners {
            listener(message.clone());
        }
        listeners.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer for a registered listener.
///
/// Deregisters on drop; [`Subscription::dispose`] does the same explicitly.
#[must_use = "dropping a subscription deregisters the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.remove(&self.id);
            tracing::trace!(id = self.id, "listener removed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

type Responder = Box<dyn Fn(&Envelope) -> Option<serde_json::Value> + Send + Sync>;

/// In-process port.
///
/// Standalone ports have no parent. Embedded ports simulate one: tests (or a
/// hosting process in the same address space) push messages in with
/// [`LocalPort::deliver`], and an optional responder answers posts
/// synchronously, like a host replying before `post` even returns.
pub struct LocalPort {
    mode: ExecutionMode,
    parent_origin: Option<Origin>,
    listeners: ListenerSet,
    outbox: Mutex<Vec<(Envelope, TargetOrigin)>>,
    responder: Option<Responder>,
    refuse_registration: bool,
}

impl LocalPort {
    /// A top-level context with no host.
    pub fn standalone() -> Self {
        Self::new(ExecutionMode::Standalone, None)
    }

    /// A context nested in a parent at `parent_origin`.
    pub fn embedded(parent_origin: Option<Origin>) -> Self {
        Self::new(ExecutionMode::Embedded, parent_origin)
    }

    fn new(mode: ExecutionMode, parent_origin: Option<Origin>) -> Self {
        Self {
            mode,
            parent_origin,
            listeners: ListenerSet::new(),
            outbox: Mutex::new(Vec::new()),
            responder: None,
            refuse_registration: false,
        }
    }

    /// Answer every post with the returned payload, if any, from the parent.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&Envelope) -> Option<serde_json::Value> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Fail every `subscribe` call.
    pub fn refusing_registration(mut self) -> Self {
        self.refuse_registration = true;
        self
    }

    /// Push a message from an arbitrary sender. Returns the number of listeners reached.
    pub fn deliver(&self, origin: Option<Origin>, data: serde_json::Value) -> usize {
        self.listeners.dispatch(InboundMessage { origin, data })
    }

    /// Push a message from the parent context.
    pub fn deliver_from_parent(&self, data: serde_json::Value) -> usize {
        self.deliver(self.parent_origin.clone(), data)
    }

    /// Envelopes posted so far, with their targets.
    pub fn posted(&self) -> Vec<(Envelope, TargetOrigin)> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl HostPort for LocalPort {
    fn mode(&self) -> ExecutionMode {
        self.mode
    }

    fn subscribe(&self, listener: Listener) -> Result<Subscription, PortError> {
        if self.refuse_registration {
            return Err(PortError::Register("local port configured to refuse".into()));
        }
        Ok(self.listeners.register(listener))
    }

    fn post(&self, envelope: &Envelope, target: &TargetOrigin) -> Result<(), PortError> {
        if self.mode == ExecutionMode::Standalone {
            return Err(PortError::NoParent);
        }
        // Same check a browser applies: a mismatched target silently drops the message.
        if let (TargetOrigin::Exact(want), Some(parent)) = (target, &self.parent_origin) {
            if want != parent {
                tracing::debug!(target_origin = %target, "post target does not match parent; dropped");
                return Ok(());
            }
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((envelope.clone(), target.clone()));

        if let Some(reply) = self.responder.as_ref().and_then(|respond| respond(envelope)) {
            self.deliver_from_parent(reply);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = counter.clone();
        Arc::new(move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn dispatch_reaches_registered_listeners() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let _a = set.register(counting(&hits));
        let _b = set.register(counting(&hits));

        let reached = set.dispatch(InboundMessage {
            origin: None,
            data: json!({}),
        });
        assert_eq!(reached, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let set = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = set.register(counting(&hits));
        assert_eq!(set.len(), 1);
        sub.dispose();
        assert!(set.is_empty());

        set.dispatch(InboundMessage {
            origin: None,
            data: json!({}),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let set = ListenerSet::new();
        let sub = set.register(Arc::new(|_| {}));
        drop(set);
        drop(sub);
    }

    #[test]
    fn standalone_port_cannot_post() {
        let port = LocalPort::standalone();
        let err = port
            .post(&Envelope::RequestToken, &TargetOrigin::Any)
            .unwrap_err();
        assert!(matches!(err, PortError::NoParent));
    }

    #[test]
    fn mismatched_target_is_not_delivered() {
        let parent: Origin = "https://host.example".parse().unwrap();
        let other: Origin = "https://other.example".parse().unwrap();
        let port = LocalPort::embedded(Some(parent));
        port.post(&Envelope::RequestToken, &TargetOrigin::Exact(other))
            .unwrap();
        assert!(port.posted().is_empty());
    }

    #[test]
    fn refusing_port_fails_subscribe() {
        let port = LocalPort::embedded(None).refusing_registration();
        assert!(matches!(
            port.subscribe(Arc::new(|_| {})),
            Err(PortError::Register(_))
        ));
    }
}
