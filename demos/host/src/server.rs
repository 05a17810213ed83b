//! Host server implementation using HTTP and WebSocket (axum).

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::Response,
    routing::get,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokenbridge_core::{DEV_PLACEHOLDER, Envelope, FeedbackReceipt, FeedbackRequest};
use tokio::sync::RwLock;

struct StoredFeedback {
    id: u64,
    content: String,
    received_at: u64,
}

struct ServerState {
    token: String,
    accept_dev_token: bool,
    feedback: Vec<StoredFeedback>,
    next_id: u64,
}

impl ServerState {
    fn new(token: String, accept_dev_token: bool) -> Self {
        Self {
            token,
            accept_dev_token,
            feedback: Vec::new(),
            next_id: 1,
        }
    }

    fn authorizes(&self, header: Option<&str>) -> bool {
        let Some(token) = header.and_then(|h| h.strip_prefix("Bearer ")) else {
            return false;
        };
        token == self.token || (self.accept_dev_token && token == DEV_PLACEHOLDER)
    }
}

type AppState = Arc<RwLock<ServerState>>;

pub async fn run(port: u16, token: String, accept_dev_token: bool) -> anyhow::Result<()> {
    let state = Arc::new(RwLock::new(ServerState::new(token, accept_dev_token)));

    let app = Router::new()
        .route("/bridge", get(bridge))
        .route("/feedback", get(list_feedback).post(submit_feedback))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// GET /bridge - cross-context channel to one mini app
async fn bridge(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_bridge(socket, state).await {
            tracing::warn!("Bridge error: {}", e);
        }
    })
}

async fn handle_bridge(mut socket: WebSocket, state: AppState) -> anyhow::Result<()> {
    tracing::debug!("Mini app connected");

    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!("WebSocket error: {}", e);
                break;
            }
        };
        let Message::Text(text) = msg else {
            continue;
        };

        match Envelope::from_json(text.as_str()) {
            Ok(Envelope::RequestToken) => {
                let token = state.read().await.token.clone();
                let reply = serde_json::to_string(&Envelope::AuthToken { token })?;
                socket.send(Message::Text(reply.into())).await?;
                tracing::info!("Credential sent to mini app");
            }
            Ok(other) => tracing::debug!("Ignoring {} envelope", other.kind()),
            Err(e) => tracing::warn!("Invalid envelope: {}", e),
        }
    }

    tracing::debug!("Mini app disconnected");
    Ok(())
}

/// POST /feedback - accept feedback from an authenticated mini app
async fn submit_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackReceipt>), StatusCode> {
    let mut s = state.write().await;
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if !s.authorizes(header) {
        tracing::warn!("Rejected feedback with missing or unknown credential");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let content = request.content.trim();
    if content.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let receipt = FeedbackReceipt {
        id: s.next_id,
        received_at: now(),
    };
    s.next_id += 1;
    s.feedback.push(StoredFeedback {
        id: receipt.id,
        content: content.to_string(),
        received_at: receipt.received_at,
    });

    tracing::info!("Feedback #{}: {}", receipt.id, content);
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /feedback - everything received so far
async fn list_feedback(State(state): State<AppState>) -> Json<serde_json::Value> {
    let s = state.read().await;
    let items: Vec<_> = s
        .feedback
        .iter()
        .map(|f| {
            serde_json::json!({
                "id": f.id,
                "content": f.content,
                "received_at": f.received_at,
            })
        })
        .collect();
    Json(serde_json::json!({ "feedback": items }))
}
