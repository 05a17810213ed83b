//! App-lifetime context tying the store to its handshake.

use crate::channel::{HandshakeChannel, HandshakeError, Mounted};
use crate::config::HandshakeConfig;
use crate::port::HostPort;
use crate::store::{CredentialStore, StoreHandle};
use std::sync::Arc;
use tokenbridge_core::{ExecutionMode, Snapshot};

/// Created at app start, torn down at app end.
///
/// Consumers receive [`StoreHandle`]s from [`AppContext::handle`]; nothing is
/// global. Teardown unmounts the handshake before closing the store.
pub struct AppContext {
    // Field order is drop order: unmount first, then close the store.
    handshake: Mounted,
    store: CredentialStore,
}

impl AppContext {
    /// Create the store and mount the handshake against `port`.
    pub fn start(port: Arc<dyn HostPort>, config: HandshakeConfig) -> Result<Self, HandshakeError> {
        let store = CredentialStore::new();
        let handshake = HandshakeChannel::new(port, config).mount(store.handle())?;
        tracing::debug!(mode = ?handshake.mode(), "mini app context started");
        Ok(Self { handshake, store })
    }

    pub fn handle(&self) -> StoreHandle {
        self.store.handle()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.handshake.mode()
    }

    /// Log out locally. The handshake stays mounted, so a later delivery
    /// from the host installs a fresh credential.
    pub fn clear_credential(&self) {
        self.store.handle().clear_credential();
    }

    pub fn shutdown(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::LocalPort;
    use crate::store::StoreError;
    use serde_json::json;

    #[test]
    fn teardown_detaches_consumers() {
        let port = Arc::new(LocalPort::embedded(None));
        let app = AppContext::start(port.clone(), HandshakeConfig::default()).unwrap();
        let consumer = app.handle();

        port.deliver_from_parent(json!({"type": "AUTH_TOKEN", "token": "abc"}));
        assert!(consumer.snapshot().unwrap().has_credential());

        app.shutdown();
        assert_eq!(port.listener_count(), 0);
        assert_eq!(consumer.snapshot(), Err(StoreError::Detached));
    }

    #[test]
    fn clear_then_redeliver() {
        let port = Arc::new(LocalPort::embedded(None));
        let app = AppContext::start(port.clone(), HandshakeConfig::default()).unwrap();

        port.deliver_from_parent(json!({"type": "AUTH_TOKEN", "token": "one"}));
        app.clear_credential();
        let snap = app.snapshot();
        assert!(!snap.is_loading);
        assert!(!snap.has_credential());

        port.deliver_from_parent(json!({"type": "AUTH_TOKEN", "token": "two"}));
        assert_eq!(
            app.snapshot().usable_credential().map(|c| c.expose().to_string()),
            Some("two".to_string())
        );
    }

    #[test]
    fn failed_mount_surfaces_error() {
        let port = Arc::new(LocalPort::embedded(None).refusing_registration());
        let result = AppContext::start(port, HandshakeConfig::default());
        assert!(matches!(result, Err(HandshakeError::Register(_))));
    }
}
