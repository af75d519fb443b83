//! Delimiter-framed echo server.
//!
//! Run with: cargo run --example delimiter_server [addr]
//! Then send `$_`-terminated lines, e.g. `printf 'hi$_' | nc 127.0.0.1 8080`

use std::error::Error;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wsgate::DelimiterConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "wsgate=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = DelimiterConfig::default();
    if let Some(addr) = std::env::args().nth(1) {
        config = config.with_bind_addr(addr.parse()?);
    }

    wsgate::delimiter::run(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    Ok(())
}
