//! Core types for the mini app credential handshake.
//!
//! This crate provides the protocol primitives: the envelopes exchanged with
//! the embedding host, origin trust, and the credential lifecycle. Transports
//! and the runtime store live in `tokenbridge-client`.

mod credential;
mod envelope;
mod origin;
mod state;

pub use credential::{Credential, DEV_PLACEHOLDER};
pub use envelope::{Envelope, EnvelopeError};
pub use origin::{Origin, OriginParseError, OriginPolicy, TargetOrigin, Trust};
pub use state::{AuthStatus, ExecutionMode, HandshakeState, Snapshot};

use serde::{Deserialize, Serialize};

/// Body of a feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub content: String,
}

/// Acknowledgement returned by a feedback endpoint.
///
/// Endpoints may return any JSON; this is the shape the bundled host uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    pub id: u64,
    pub received_at: u64,
}
