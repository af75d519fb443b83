//! WebSocket upgrade gateway.
//!
//! Run with: cargo run --example gateway_server [addr]
//! Then connect a WebSocket client to ws://127.0.0.1:8080/websocket

use std::error::Error;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wsgate::{Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wsgate=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::default();
    if let Some(addr) = std::env::args().nth(1) {
        config = config.with_bind_addr(addr.parse()?);
    }

    let server = Server::bind(config).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
