//! Handshake over a WebSocket bridge to a host process.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokenbridge_client::protocol::{Credential, Envelope, HandshakeState};
use tokenbridge_client::{AppContext, ClientConfig, HandshakeConfig, WsPort, origin_of};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

/// Minimal host: answers `REQUEST_TOKEN` with noise, then a credential.
async fn spawn_host(token: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut stream) = ws.split();

        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            if Envelope::from_json(&text).ok() != Some(Envelope::RequestToken) {
                continue;
            }
            for frame in [
                "not json".to_string(),
                r#"{"type":"PING"}"#.to_string(),
                format!(r#"{{"type":"AUTH_TOKEN","token":"{token}"}}"#),
            ] {
                sink.send(Message::Text(frame.into())).await.unwrap();
            }
        }
    });

    format!("ws://{addr}/bridge")
}

#[tokio::test]
async fn credential_arrives_over_bridge() {
    let url = spawn_host("ws-token").await;
    let port = Arc::new(WsPort::connect(&url).await.unwrap());
    let config = HandshakeConfig::default().expect_origin(origin_of(&url).unwrap());

    let app = AppContext::start(port, config).unwrap();
    let snap = tokio::time::timeout(Duration::from_secs(5), app.handle().wait_settled())
        .await
        .expect("host should answer")
        .unwrap();

    assert!(snap.has_credential());
    assert_eq!(
        app.handle().state().unwrap(),
        HandshakeState::Ready(Credential::new("ws-token"))
    );
}

#[tokio::test]
async fn expected_origin_matches_bridge_written_differently() {
    let url = spawn_host("ws-token").await;
    let bridge = origin_of(&url).unwrap();
    let text = format!(
        "[handshake]\nexpected_origins = [\"HTTP://127.0.0.1:{}/\"]\n",
        bridge.port()
    );
    let config = ClientConfig::from_toml_str(&text).unwrap().handshake;
    assert_eq!(config.expected_origins, vec![bridge]);

    let port = Arc::new(WsPort::connect(&url).await.unwrap());
    let app = AppContext::start(port, config).unwrap();
    let snap = tokio::time::timeout(Duration::from_secs(5), app.handle().wait_settled())
        .await
        .expect("host should answer")
        .unwrap();

    assert!(snap.has_credential());
}

#[tokio::test]
async fn wrong_expected_origin_keeps_pending() {
    let url = spawn_host("ws-token").await;
    let port = Arc::new(WsPort::connect(&url).await.unwrap());
    // Configured host differs from the bridge: the request is not delivered and
    // nothing from the bridge would be trusted anyway.
    let config =
        HandshakeConfig::default().expect_origin("https://other.example".parse().unwrap());

    let app = AppContext::start(port, config).unwrap();
    let settled =
        tokio::time::timeout(Duration::from_millis(300), app.handle().wait_settled()).await;

    assert!(settled.is_err());
    assert!(app.snapshot().is_loading);
}
