//! DMX Bridge service entrypoint.
//!
//! Wires the registry loader, helper process bridge, datagram sender, and
//! dispatcher together, then runs until ctrl-c. Embedders that drive the
//! dispatcher from their own control plane use the library crate directly.

use anyhow::Result;
use dmx_bridge::{config, create_bus, DatagramSender, Dispatcher, HelperBridge, Transports};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dmx_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting DMX Bridge");

    let config = config::load_config()?;
    tracing::info!(?config, "Configuration loaded");

    let shutdown = CancellationToken::new();
    let bus = create_bus();

    let helper = HelperBridge::spawn(&config.helper, shutdown.clone())?;
    let datagram = DatagramSender::bind(config.wireless_port).await?;
    let transports = Arc::new(Transports { helper, datagram });

    let loader = dmx_bridge::RegistryLoader::new(config.registry_path);
    let dispatcher = Dispatcher::new(loader, transports, bus.clone(), shutdown.clone());

    let status = dispatcher.status().await;
    tracing::info!(
        registered_nodes = status.registered_nodes,
        helper = ?status.helper,
        "Dispatcher ready"
    );

    // Log buffer mutations for operators watching the service
    {
        let mut rx = bus.subscribe();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => tracing::debug!(event_type = event.event_type(), "bus event"),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::debug!(missed = n, "bus logger lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    shutdown.cancel();

    Ok(())
}
