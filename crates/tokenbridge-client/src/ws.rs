//! WebSocket-backed host port.
//!
//! For hosts running in another process: the mini app connects to the host's
//! bridge endpoint, and every text frame is one JSON envelope in either
//! direction. Inbound messages are stamped with the host's origin, derived
//! from the bridge URL (`ws` -> `http`, `wss` -> `https`).

use crate::port::{HostPort, InboundMessage, Listener, ListenerSet, PortError, Subscription};
use futures_util::{SinkExt, StreamExt};
use tokenbridge_core::{Envelope, ExecutionMode, Origin, TargetOrigin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Envelopes queued for the writer task before `post` reports backpressure.
const OUTBOUND_CAPACITY: usize = 32;

/// A connection to a host bridge.
pub struct WsPort {
    origin: Origin,
    listeners: ListenerSet,
    outbound: mpsc::Sender<String>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsPort {
    /// Connect to `url` (e.g. `ws://127.0.0.1:8080/bridge`).
    pub async fn connect(url: &str) -> Result<Self, PortError> {
        let origin = origin_of(url)?;
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = ws.split();
        tracing::info!(%origin, "connected to host bridge");

        let listeners = ListenerSet::new();
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::warn!("host bridge write failed: {}", e);
                    break;
                }
            }
        });

        let reader = {
            let listeners = listeners.clone();
            let origin = origin.clone();
            tokio::spawn(async move {
                while let Some(msg) = stream.next().await {
                    let msg = match msg {
                        Ok(msg) => msg,
                        Err(e) => {
                            tracing::debug!("host bridge error: {}", e);
                            break;
                        }
                    };
                    match msg {
                        Message::Text(text) => match serde_json::from_str(&text) {
                            Ok(data) => {
                                listeners.dispatch(InboundMessage {
                                    origin: Some(origin.clone()),
                                    data,
                                });
                            }
                            Err(e) => tracing::warn!("dropping non-JSON frame from host: {}", e),
                        },
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                tracing::debug!("host bridge closed");
            })
        };

        Ok(Self {
            origin,
            listeners,
            outbound,
            reader,
            writer,
        })
    }

    /// The host's origin.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}

impl HostPort for WsPort {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Embedded
    }

    fn subscribe(&self, listener: Listener) -> Result<Subscription, PortError> {
        if self.reader.is_finished() {
            return Err(PortError::Closed);
        }
        Ok(self.listeners.register(listener))
    }

    fn post(&self, envelope: &Envelope, target: &TargetOrigin) -> Result<(), PortError> {
        if let TargetOrigin::Exact(want) = target {
            if *want != self.origin {
                tracing::debug!(target_origin = %target, "post target does not match host; dropped");
                return Ok(());
            }
        }
        if self.writer.is_finished() {
            return Err(PortError::Closed);
        }
        enqueue(&self.outbound, envelope.to_value()?.to_string())
    }
}

impl Drop for WsPort {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

fn enqueue(outbound: &mpsc::Sender<String>, text: String) -> Result<(), PortError> {
    outbound.try_send(text).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => PortError::Backlogged,
        mpsc::error::TrySendError::Closed(_) => PortError::Closed,
    })
}

/// Page origin for a bridge URL.
pub fn origin_of(url: &str) -> Result<Origin, PortError> {
    let bad = || PortError::BadUrl(url.to_string());
    let mut parsed = Url::parse(url).map_err(|_| bad())?;
    let scheme = match parsed.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => other,
    }
    .to_string();
    parsed.set_scheme(&scheme).map_err(|()| bad())?;
    Origin::from_url(&parsed).map_err(|_| bad())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_from_bridge_url() {
        assert_eq!(
            origin_of("ws://127.0.0.1:8080/bridge").unwrap().to_string(),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            origin_of("wss://Host.Example/bridge?x=1").unwrap().to_string(),
            "https://host.example"
        );
        assert!(matches!(origin_of("127.0.0.1"), Err(PortError::BadUrl(_))));
        assert!(matches!(origin_of("ws://"), Err(PortError::BadUrl(_))));
        assert!(matches!(
            origin_of("wss://user@host.example/bridge"),
            Err(PortError::BadUrl(_))
        ));
    }

    #[test]
    fn default_port_bridge_matches_configured_host() {
        let configured: Origin = "https://host.example".parse().unwrap();
        assert_eq!(origin_of("wss://host.example:443/bridge").unwrap(), configured);
        assert_eq!(
            origin_of("ws://host.example:80/bridge").unwrap(),
            "http://host.example".parse::<Origin>().unwrap()
        );
    }

    #[test]
    fn full_or_closed_queue_is_reported() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(enqueue(&tx, "a".into()).is_ok());
        assert!(matches!(enqueue(&tx, "b".into()), Err(PortError::Backlogged)));
        assert_eq!(rx.try_recv().unwrap(), "a");
        drop(rx);
        assert!(matches!(enqueue(&tx, "c".into()), Err(PortError::Closed)));
    }
}
