//! Embedding host example.
//!
//! Plays the part of the native app that owns the user's session:
//! - `GET /bridge` - WebSocket bridge; answers `REQUEST_TOKEN` with `AUTH_TOKEN`
//! - `POST /feedback` - accepts feedback bearing the session credential
//! - `GET /feedback` - lists what was received
//!
//! Run:
//!   cargo run -p tokenbridge-example-host -- --port 8080 --token secret-123
//!
//! Then point the mini app at it:
//!   cargo run -p tokenbridge-example-feedback -- --host ws://127.0.0.1:8080/bridge \
//!     --endpoint http://127.0.0.1:8080/feedback --message "Nice app"

mod server;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tokenbridge-host", about = "Example host for tokenbridge mini apps")]
struct Args {
    /// Port to listen on.
    #[arg(long, env = "TOKENBRIDGE_HOST_PORT", default_value_t = 8080)]
    port: u16,

    /// Credential handed to mini apps.
    #[arg(long, env = "TOKENBRIDGE_HOST_TOKEN", default_value = "host-demo-token")]
    token: String,

    /// Also accept the standalone development placeholder on `/feedback`.
    #[arg(long)]
    accept_dev_token: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tokenbridge_host=info".parse()?),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Starting host on port {}", args.port);

    server::run(args.port, args.token, args.accept_dev_token).await
}
