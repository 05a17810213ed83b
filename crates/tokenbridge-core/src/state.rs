//! Handshake lifecycle and the read-only view consumers see.

use crate::Credential;
use std::fmt;

/// Handshake lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// Request outstanding, no credential yet.
    #[default]
    Pending,
    /// A credential was delivered. Later deliveries replace it.
    Ready(Credential),
    /// Explicitly logged out. Not loading, no credential.
    Cleared,
    /// The host did not answer within the configured reply timeout.
    TimedOut,
}

impl HandshakeState {
    /// Project the state into a consumer snapshot.
    pub fn snapshot(&self) -> Snapshot {
        match self {
            HandshakeState::Pending => Snapshot {
                credential: None,
                is_loading: true,
            },
            HandshakeState::Ready(credential) => Snapshot {
                credential: Some(credential.clone()),
                is_loading: false,
            },
            HandshakeState::Cleared | HandshakeState::TimedOut => Snapshot {
                credential: None,
                is_loading: false,
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, HandshakeState::Pending)
    }
}

/// What consumers read: `{credential, is_loading, has_credential}`.
///
/// `has_credential` is always derived from `credential`, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub credential: Option<Credential>,
    pub is_loading: bool,
}

impl Snapshot {
    /// A credential is present and non-empty.
    pub fn has_credential(&self) -> bool {
        self.credential.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// The credential, only if it is usable.
    pub fn usable_credential(&self) -> Option<&Credential> {
        self.credential.as_ref().filter(|c| !c.is_empty())
    }

    pub fn status(&self) -> AuthStatus {
        if self.is_loading {
            AuthStatus::Connecting
        } else if self.has_credential() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::AwaitingHost
        }
    }
}

/// Coarse status for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// Still waiting on the handshake.
    Connecting,
    /// A usable credential is installed.
    Authenticated,
    /// Not loading and no credential: the app was probably opened outside its host.
    AwaitingHost,
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthStatus::Connecting => "Connecting to the host application...",
            AuthStatus::Authenticated => "Authenticated",
            AuthStatus::AwaitingHost => {
                "No credential yet. Make sure the mini app is opened from its host application."
            }
        })
    }
}

/// Whether the mini app runs inside a host or on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Nested inside a host context that can answer `REQUEST_TOKEN`.
    Embedded,
    /// Top-level; a placeholder credential is synthesized.
    Standalone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_loading() {
        let snap = HandshakeState::Pending.snapshot();
        assert!(snap.is_loading);
        assert!(!snap.has_credential());
        assert_eq!(snap.status(), AuthStatus::Connecting);
    }

    #[test]
    fn ready_has_credential() {
        let snap = HandshakeState::Ready(Credential::new("abc123")).snapshot();
        assert_eq!(snap.credential, Some(Credential::new("abc123")));
        assert!(!snap.is_loading);
        assert!(snap.has_credential());
        assert_eq!(snap.status(), AuthStatus::Authenticated);
    }

    #[test]
    fn empty_credential_is_not_usable() {
        let snap = HandshakeState::Ready(Credential::new("")).snapshot();
        assert!(!snap.is_loading);
        assert!(!snap.has_credential());
        assert!(snap.usable_credential().is_none());
        assert_eq!(snap.status(), AuthStatus::AwaitingHost);
    }

    #[test]
    fn cleared_and_timed_out_are_settled_without_credential() {
        for state in [HandshakeState::Cleared, HandshakeState::TimedOut] {
            let snap = state.snapshot();
            assert_eq!(
                snap,
                Snapshot {
                    credential: None,
                    is_loading: false
                }
            );
            assert!(!snap.has_credential());
        }
    }
}
