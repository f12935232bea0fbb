//! Hextrade multiplayer game server.

use anyhow::Context;
use hextrade_server::config::ServerConfig;
use hextrade_server::server::{self, ServerState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env().context("reading server configuration")?;
    config
        .rules()
        .board
        .validate()
        .context("board layout does not fit its tile pools")?;

    info!(
        addr = %config.addr,
        layout = ?config.layout,
        max_players = config.max_players,
        seeded = config.seed.is_some(),
        "Starting Hextrade server..."
    );

    let state = Arc::new(ServerState::new(config));

    server::run_server(state).await
}
