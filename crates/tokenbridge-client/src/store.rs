//! Credential state store.
//!
//! [`CredentialStore`] owns the state for the lifetime of the mini app.
//! Consumers get [`StoreHandle`]s injected; handles do not keep the store
//! alive. Once the owner is gone, reads fail with [`StoreError::Detached`] and
//! writes are silently dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokenbridge_core::{Credential, HandshakeState, Snapshot};
use tokio::sync::watch;

struct Shared {
    state: watch::Sender<HandshakeState>,
    closed: AtomicBool,
}

/// Owner of the handshake state.
pub struct CredentialStore {
    shared: Arc<Shared>,
}

impl CredentialStore {
    /// Create a store in the `Pending` state.
    pub fn new() -> Self {
        let (state, _) = watch::channel(HandshakeState::Pending);
        Self {
            shared: Arc::new(Shared {
                state,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A handle for injection into consumers and the handshake channel.
    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.shared.state.borrow().snapshot()
    }

    pub fn state(&self) -> HandshakeState {
        self.shared.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<HandshakeState> {
        self.shared.state.subscribe()
    }

    /// Tear the store down. Equivalent to dropping it.
    pub fn close(self) {}
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CredentialStore {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        tracing::debug!("credential store closed");
    }
}

/// Error reading from a store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("credential store used outside its owner's lifetime")]
    Detached,
}

/// Injected access to a [`CredentialStore`].
#[derive(Clone)]
pub struct StoreHandle {
    shared: Weak<Shared>,
}

impl StoreHandle {
    fn live(&self) -> Option<Arc<Shared>> {
        self.shared
            .upgrade()
            .filter(|shared| !shared.closed.load(Ordering::Acquire))
    }

    /// Whether the owning store still exists.
    pub fn is_attached(&self) -> bool {
        self.live().is_some()
    }

    /// Current `{credential, is_loading, has_credential}` view.
    ///
    /// Safe to call at any time while the owner lives, including before the
    /// handshake completes.
    pub fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.state().map(|state| state.snapshot())
    }

    pub fn state(&self) -> Result<HandshakeState, StoreError> {
        let shared = self.live().ok_or(StoreError::Detached)?;
        let state = shared.state.borrow().clone();
        Ok(state)
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<HandshakeState>, StoreError> {
        let shared = self.live().ok_or(StoreError::Detached)?;
        Ok(shared.state.subscribe())
    }

    /// Wait until the handshake leaves `Pending`.
    pub async fn wait_settled(&self) -> Result<Snapshot, StoreError> {
        let mut rx = self.subscribe()?;
        let state = rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| StoreError::Detached)?;
        Ok(state.snapshot())
    }

    /// Install a credential and stop loading. Last write wins.
    ///
    /// Returns `false` if the store is gone.
    pub fn set_credential(&self, credential: Credential) -> bool {
        self.write("set_credential", |state| {
            let next = HandshakeState::Ready(credential);
            if *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    /// Drop the credential without re-entering loading.
    pub fn clear_credential(&self) -> bool {
        self.write("clear_credential", |state| {
            if *state == HandshakeState::Cleared {
                return false;
            }
            *state = HandshakeState::Cleared;
            true
        })
    }

    /// Give up waiting on the host. Only applies while still `Pending`.
    pub fn mark_timed_out(&self) -> bool {
        let mut moved = false;
        let accepted = self.write("mark_timed_out", |state| {
            if !state.is_pending() {
                return false;
            }
            *state = HandshakeState::TimedOut;
            moved = true;
            true
        });
        accepted && moved
    }

    fn write(&self, op: &str, apply: impl FnOnce(&mut HandshakeState) -> bool) -> bool {
        let Some(shared) = self.live() else {
            tracing::debug!(op, "write after store teardown ignored");
            return false;
        };
        if shared.state.send_if_modified(apply) {
            tracing::info!(op, "credential state changed");
        }
        true
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("attached", &self.is_attached())
            .finish()
    }
}
