//! Machinestream - streaming ingestion client for machine telemetry

use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use machinestream::{Args, ClientConfig, JsonlSink, StreamClient, WsSocket};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("machinestream={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Machinestream - telemetry ingester");
    info!("======================================");
    info!("Stream endpoint: {}", args.stream_url);
    info!("Reconnect delay: {}ms", args.reconnect_delay_ms);
    info!("Sink file: {}", args.sink_path.display());
    info!("======================================");

    // Open the sink file
    let sink = match JsonlSink::create(&args.sink_path) {
        Ok(sink) => {
            info!("Sink opened at {}", sink.path().display());
            Arc::new(sink)
        }
        Err(e) => {
            error!("Failed to open sink at {}: {}", args.sink_path.display(), e);
            std::process::exit(1);
        }
    };

    // Build and start the stream client
    let config = ClientConfig {
        endpoint: args.stream_url.clone(),
        reconnect_delay: args.reconnect_delay(),
    };
    let socket = WsSocket::new(args.stream_url.clone());
    let client = StreamClient::new(config, socket, sink);

    let startup = CancellationToken::new();
    if let Err(e) = client.start(&startup).await {
        error!("Failed to start machine stream client: {}", e);
        std::process::exit(1);
    }

    // Ingest until the process is asked to shut down
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    let shutdown = CancellationToken::new();
    if let Err(e) = client.stop(&shutdown).await {
        warn!("Error while stopping machine stream client: {}", e);
    }
    client.shutdown().await;

    Ok(())
}
