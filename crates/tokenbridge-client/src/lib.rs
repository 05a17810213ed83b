//! Client side of the mini app credential handshake.
//!
//! - [`CredentialStore`] holds the credential for the app's lifetime.
//! - [`HandshakeChannel`] requests it from the host over a [`HostPort`].
//! - [`FeedbackClient`] spends it on the feedback endpoint.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tokenbridge_client::{AppContext, ClientConfig, WsPort};
//!
//! let config = ClientConfig::default();
//! let port = Arc::new(WsPort::connect("ws://127.0.0.1:8080/bridge").await?);
//! let app = AppContext::start(port, config.handshake)?;
//! let snapshot = app.handle().wait_settled().await?;
//! println!("{}", snapshot.status());
//! # Ok(())
//! # }
//! ```

mod channel;
mod config;
mod context;
mod feedback;
mod port;
mod store;
mod ws;

pub use channel::{Disposition, HandshakeChannel, HandshakeError, Mounted, RejectReason};
pub use config::{ClientConfig, ConfigError, FeedbackConfig, HandshakeConfig};
pub use context::AppContext;
pub use feedback::{FeedbackClient, SubmitError};
pub use port::{
    HostPort, InboundMessage, Listener, ListenerSet, LocalPort, PortError, Subscription,
};
pub use store::{CredentialStore, StoreError, StoreHandle};
pub use ws::{WsPort, origin_of};

pub use tokenbridge_core as protocol;
