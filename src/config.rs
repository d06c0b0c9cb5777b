//! Configuration for machinestream.
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Machinestream - streaming ingestion client for machine telemetry
#[derive(Parser, Debug, Clone)]
#[command(name = "machinestream")]
#[command(about = "Ingests machine telemetry from a streaming WebSocket endpoint")]
pub struct Args {
    /// WebSocket endpoint of the machine telemetry stream
    #[arg(
        long,
        env = "STREAM_URL",
        default_value = "ws://machinestream.herokuapp.com/ws"
    )]
    pub stream_url: String,

    /// Fixed delay before each reconnect attempt, in milliseconds
    #[arg(long, env = "RECONNECT_DELAY_MS", default_value = "1500")]
    pub reconnect_delay_ms: u64,

    /// Path of the JSONL file delivered payloads are appended to
    #[arg(long, env = "SINK_PATH", default_value = "machine-data.jsonl")]
    pub sink_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.stream_url.trim().is_empty() {
            return Err("STREAM_URL must not be empty".to_string());
        }
        if !self.stream_url.starts_with("ws://") && !self.stream_url.starts_with("wss://") {
            return Err("STREAM_URL must use the ws:// or wss:// scheme".to_string());
        }
        if self.reconnect_delay_ms == 0 {
            return Err("RECONNECT_DELAY_MS must be greater than zero".to_string());
        }
        Ok(())
    }
}
