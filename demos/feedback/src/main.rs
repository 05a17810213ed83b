//! Feedback mini app example.
//!
//! Obtains a credential from its host, then submits one piece of feedback:
//! - With `--host`, connects to the host's bridge and sends `REQUEST_TOKEN`
//! - Without it, runs standalone and gets the development placeholder after 2s
//!
//! Run against the example host:
//!   cargo run -p tokenbridge-example-feedback -- --host ws://127.0.0.1:8080/bridge \
//!     --endpoint http://127.0.0.1:8080/feedback --message "Nice app"
//!
//! Or standalone:
//!   cargo run -p tokenbridge-example-feedback -- --message "Hello"

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokenbridge_client::{
    AppContext, ClientConfig, FeedbackClient, HostPort, LocalPort, WsPort, origin_of,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "feedback-mini-app", about = "Feedback mini app using tokenbridge")]
struct Args {
    /// Host bridge URL. Omit to run standalone.
    #[arg(long, env = "TOKENBRIDGE_HOST")]
    host: Option<String>,

    /// TOML config file.
    #[arg(long, env = "TOKENBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Override the feedback endpoint from the config.
    #[arg(long)]
    endpoint: Option<String>,

    /// Trust the bridge's own origin when the config names none.
    #[arg(long)]
    trust_bridge: bool,

    /// Feedback to submit once authenticated.
    #[arg(long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("feedback_mini_app=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.feedback.endpoint = endpoint;
    }

    let port: Arc<dyn HostPort> = match &args.host {
        Some(url) => {
            if args.trust_bridge && config.handshake.expected_origins.is_empty() {
                config.handshake.expected_origins.push(origin_of(url)?);
            }
            Arc::new(WsPort::connect(url).await?)
        }
        None => Arc::new(LocalPort::standalone()),
    };

    let app = AppContext::start(port, config.handshake)?;
    tracing::info!("{}", app.snapshot().status());

    let handle = app.handle();
    let snapshot = tokio::select! {
        snapshot = handle.wait_settled() => snapshot?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted while waiting for the host");
            return Ok(());
        }
    };
    tracing::info!("{}", snapshot.status());

    if let Some(message) = args.message {
        let client = FeedbackClient::new(config.feedback);
        match client.submit(&snapshot, &message).await {
            Ok(receipt) => tracing::info!("Thank you! Receipt: {}", receipt),
            Err(e) => {
                tracing::debug!("Submission error: {}", e);
                tracing::error!("{}", e.user_message());
            }
        }
    }

    app.shutdown();
    Ok(())
}
