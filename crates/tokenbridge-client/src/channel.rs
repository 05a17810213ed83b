//! Handshake channel: obtains the credential from the host.
//!
//! Mount sequence:
//! 1. Register the inbound listener (before anything is sent, so a host that
//!    replies immediately is not missed).
//! 2. Embedded: post `REQUEST_TOKEN` to the parent.
//!    Standalone: install a placeholder credential after a fixed delay.
//! 3. On unmount, deregister the listener and cancel timers.
//!
//! Inbound envelopes are filtered by origin, then by discriminant. Only
//! `AUTH_TOKEN` writes to the store; every delivery overwrites the previous
//! one.

use crate::config::HandshakeConfig;
use crate::port::{HostPort, InboundMessage, Listener, PortError, Subscription};
use crate::store::StoreHandle;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokenbridge_core::{Credential, Envelope, ExecutionMode, Origin, OriginPolicy, Trust};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// A credential was installed.
    Accepted,
    /// Valid envelope with nothing to do (e.g. unknown discriminant).
    Ignored { kind: &'static str },
    /// Dropped without touching the store.
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Sender did not match the expected host.
    UntrustedOrigin(Option<Origin>),
    /// Not a usable envelope.
    Malformed(String),
    /// Arrived after unmount.
    Unmounted,
    /// The store's owner is gone.
    StoreDetached,
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("failed to register host listener: {0}")]
    Register(#[source] PortError),
    #[error("failed to request a credential from the host: {0}")]
    Request(#[source] PortError),
    #[error("handshake timers require a tokio runtime")]
    NoRuntime,
}

/// Inbound side, shared between the listener closure and timers.
///
/// Every store write happens under a read guard on `active`; unmount takes
/// the write guard, so no write can land after `Mounted::drop` returns.
struct Inbound {
    store: StoreHandle,
    policy: OriginPolicy,
    active: RwLock<bool>,
}

impl Inbound {
    fn live(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let guard = self.active.read().unwrap_or_else(PoisonError::into_inner);
        if *guard { Some(guard) } else { None }
    }

    fn deactivate(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = false;
    }

    fn install_placeholder(&self, placeholder: Credential) -> bool {
        let Some(_active) = self.live() else {
            return false;
        };
        self.store.set_credential(placeholder)
    }

    fn time_out(&self) -> bool {
        let Some(_active) = self.live() else {
            return false;
        };
        self.store.mark_timed_out()
    }

    fn handle(&self, message: InboundMessage) -> Disposition {
        let Some(_active) = self.live() else {
            tracing::debug!("message after unmount ignored");
            return Disposition::Rejected(RejectReason::Unmounted);
        };

        let data = match self.policy.classify(message.origin.as_ref(), message.data) {
            Trust::Trusted(data) => data,
            Trust::Untrusted { origin } => {
                let sender = origin.as_ref().map(ToString::to_string);
                tracing::warn!(origin = ?sender, "discarding envelope from untrusted origin");
                return Disposition::Rejected(RejectReason::UntrustedOrigin(origin));
            }
        };

        let envelope = match Envelope::decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("discarding malformed envelope: {}", e);
                return Disposition::Rejected(RejectReason::Malformed(e.to_string()));
            }
        };

        match envelope {
            Envelope::AuthToken { token } => {
                if self.store.set_credential(Credential::new(token)) {
                    tracing::info!("credential received from host");
                    Disposition::Accepted
                } else {
                    Disposition::Rejected(RejectReason::StoreDetached)
                }
            }
            other => {
                tracing::debug!(kind = other.kind(), "ignoring envelope");
                Disposition::Ignored { kind: other.kind() }
            }
        }
    }
}

/// Binds a [`HostPort`] to a configuration.
pub struct HandshakeChannel {
    port: Arc<dyn HostPort>,
    config: HandshakeConfig,
}

impl HandshakeChannel {
    pub fn new(port: Arc<dyn HostPort>, config: HandshakeConfig) -> Self {
        Self { port, config }
    }

    /// Run the startup sequence against `store`.
    ///
    /// On error nothing stays registered and the store is left `Pending`.
    pub fn mount(&self, store: StoreHandle) -> Result<Mounted, HandshakeError> {
        let mode = self.port.mode();
        let policy = self.config.origin_policy();
        let inbound = Arc::new(Inbound {
            store,
            policy: policy.clone(),
            active: RwLock::new(true),
        });

        let listener: Listener = {
            let inbound = inbound.clone();
            Arc::new(move |message| {
                inbound.handle(message);
            })
        };
        let subscription = self.port.subscribe(listener).map_err(|e| {
            tracing::error!("handshake listener registration failed: {}", e);
            HandshakeError::Register(e)
        })?;

        // From here on, dropping `mounted` is the disposer for every exit path.
        let mut mounted = Mounted {
            inbound,
            subscription: Some(subscription),
            timer: None,
            mode,
        };

        match mode {
            ExecutionMode::Embedded => {
                if policy.is_unrestricted() {
                    tracing::warn!(
                        "no expected host origin configured: requesting with target `*` and accepting credentials from any sender"
                    );
                }
                // Timers need a runtime; find out before anything is sent.
                let timeout = match self.config.reply_timeout_ms {
                    Some(ms) => Some((runtime()?, ms)),
                    None => None,
                };
                let target = policy.target();
                tracing::info!(target_origin = %target, "requesting credential from host");
                self.port
                    .post(&Envelope::RequestToken, &target)
                    .map_err(|e| {
                        tracing::error!("credential request failed: {}", e);
                        HandshakeError::Request(e)
                    })?;

                if let Some((runtime, timeout_ms)) = timeout {
                    let timer = spawn_reply_timeout(&runtime, &mounted.inbound, timeout_ms);
                    mounted.timer = Some(timer);
                }
            }
            ExecutionMode::Standalone => {
                tracing::info!(
                    delay_ms = self.config.fallback_delay_ms,
                    "no host context; a development credential will be installed"
                );
                mounted.timer = Some(spawn_fallback(
                    &runtime()?,
                    &mounted.inbound,
                    self.config.fallback_delay(),
                    Credential::new(self.config.placeholder.clone()),
                ));
            }
        }

        Ok(mounted)
    }
}

fn runtime() -> Result<Handle, HandshakeError> {
    Handle::try_current().map_err(|_| HandshakeError::NoRuntime)
}

fn spawn_fallback(
    runtime: &Handle,
    inbound: &Arc<Inbound>,
    delay: Duration,
    placeholder: Credential,
) -> JoinHandle<()> {
    let deadline = Instant::now() + delay;
    let inbound = inbound.clone();
    runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if inbound.install_placeholder(placeholder) {
            tracing::info!("development credential installed");
        }
    })
}

fn spawn_reply_timeout(
    runtime: &Handle,
    inbound: &Arc<Inbound>,
    timeout_ms: u64,
) -> JoinHandle<()> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    let inbound = inbound.clone();
    runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        if inbound.time_out() {
            tracing::warn!(timeout_ms, "host never answered the credential request");
        }
    })
}

/// A mounted handshake. Dropping it unmounts.
#[must_use = "dropping a mounted handshake unmounts it immediately"]
pub struct Mounted {
    inbound: Arc<Inbound>,
    subscription: Option<Subscription>,
    timer: Option<JoinHandle<()>>,
    mode: ExecutionMode,
}

impl Mounted {
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Run one message through the same path the listener uses.
    pub fn handle_inbound(&self, message: InboundMessage) -> Disposition {
        self.inbound.handle(message)
    }

    /// Deregister the listener and cancel pending timers.
    pub fn unmount(self) {}
}

impl Drop for Mounted {
    fn drop(&mut self) {
        self.inbound.deactivate();
        if let Some(subscription) = self.subscription.take() {
            subscription.dispose();
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        tracing::debug!("handshake unmounted");
    }
}
