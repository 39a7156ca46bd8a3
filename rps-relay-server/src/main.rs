//! RPS Relay Server
//!
//! Binds the configured address and relays rooms until Ctrl-C.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rps_relay::{RelayServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("RPS Relay Server v{}", VERSION);

    let config = ServerConfig::from_env();
    info!("Max connections: {}", config.max_connections);
    info!("Outbound buffer: {} messages", config.outbound_buffer);

    let server = RelayServer::new(config);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                let _ = shutdown.send(());
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        }
    });

    server.run().await.context("relay server failed")?;
    Ok(())
}
