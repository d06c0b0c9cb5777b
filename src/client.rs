//! Supervising client for the machine telemetry stream.
//!
//! Owns the socket, runs the ingest loop as a background task, and exposes
//! the start/stop lifecycle a host process drives. The loop dispatches each
//! classified [`ReadOutcome`]: delivered payloads go to the sink, a lost
//! connection triggers a fixed-delay reconnect, and local cancellation lets
//! the loop wind down.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::sink::Sink;
use crate::socket::{ReadOutcome, SocketState, StreamSocket};
use crate::types::Result;

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the telemetry stream.
    pub endpoint: String,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://machinestream.herokuapp.com/ws".to_string(),
            reconnect_delay: Duration::from_millis(1500),
        }
    }
}

/// Lifecycle of one client instance. `Starting` and `Stopping` are
/// transient; `Running` persists for the lifetime of the ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Run-scoped cancellation and the handle of the ingest loop task.
struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Supervises ingestion from a single remote stream.
///
/// At most one ingest loop is active per instance. `start` and `stop` are
/// idempotent and may be called from a control-flow context separate from
/// the loop itself.
pub struct StreamClient<S: StreamSocket> {
    config: ClientConfig,
    socket: Arc<Mutex<S>>,
    sink: Arc<dyn Sink>,
    lifecycle: Arc<RwLock<Lifecycle>>,
    run: Mutex<Option<ActiveRun>>,
}

impl<S: StreamSocket> StreamClient<S> {
    pub fn new(config: ClientConfig, socket: S, sink: Arc<dyn Sink>) -> Self {
        Self {
            config,
            socket: Arc::new(Mutex::new(socket)),
            sink,
            lifecycle: Arc::new(RwLock::new(Lifecycle::Stopped)),
            run: Mutex::new(None),
        }
    }

    /// Whether the ingest loop is currently active.
    pub async fn is_running(&self) -> bool {
        *self.lifecycle.read().await == Lifecycle::Running
    }

    /// Connect and launch the ingest loop.
    ///
    /// Returns as soon as the loop is launched, not when ingestion ends.
    /// A no-op (logged) when already active. A failed connect leaves the
    /// client stopped and surfaces the error to the caller.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Starting machine stream client");
        {
            let mut lifecycle = self.lifecycle.write().await;
            if *lifecycle != Lifecycle::Stopped {
                info!("Machine stream client was already started");
                return Ok(());
            }
            *lifecycle = Lifecycle::Starting;
        }

        if let Err(e) = self.socket.lock().await.connect(cancel).await {
            *self.lifecycle.write().await = Lifecycle::Stopped;
            return Err(e);
        }

        let run_cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.socket),
            Arc::clone(&self.sink),
            run_cancel.clone(),
            self.config.endpoint.clone(),
            self.config.reconnect_delay,
        ));
        *self.run.lock().await = Some(ActiveRun {
            cancel: run_cancel,
            task,
        });

        *self.lifecycle.write().await = Lifecycle::Running;
        info!("Machine stream client successfully started");
        Ok(())
    }

    /// Cancel the ingest loop and close the transport gracefully.
    ///
    /// The close runs under the caller's token, not the (already cancelled)
    /// run-scoped one. The lifecycle is reset even when the close fails.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Stopping machine stream client");
        {
            let mut lifecycle = self.lifecycle.write().await;
            if *lifecycle != Lifecycle::Running {
                info!("Machine stream client is inactive");
                return Ok(());
            }
            *lifecycle = Lifecycle::Stopping;
        }

        if let Some(run) = self.run.lock().await.take() {
            run.cancel.cancel();
            if let Err(e) = run.task.await {
                warn!("Ingest loop task ended abnormally: {}", e);
            }
        }

        let close_result = {
            let mut socket = self.socket.lock().await;
            match socket.state() {
                SocketState::Connecting | SocketState::Open => {
                    socket
                        .close("Client stopped ingesting messages.", cancel)
                        .await
                }
                _ => Ok(()),
            }
        };

        *self.lifecycle.write().await = Lifecycle::Stopped;
        close_result?;
        info!("Machine stream client successfully stopped");
        Ok(())
    }

    /// Release all resources held by the client.
    ///
    /// Deterministic replacement for relying on drop order: cancels and
    /// aborts any remaining loop task and drops the transport. Safe to call
    /// without a prior `stop`, and safe to call twice.
    pub async fn shutdown(&self) {
        if let Some(run) = self.run.lock().await.take() {
            run.cancel.cancel();
            run.task.abort();
        }
        self.socket.lock().await.release();
        *self.lifecycle.write().await = Lifecycle::Stopped;
    }
}

/// The ingest loop. Single and non-recursive: every outcome, including a
/// reconnect, returns control to the top of this loop.
async fn run_loop<S: StreamSocket>(
    socket: Arc<Mutex<S>>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
    endpoint: String,
    reconnect_delay: Duration,
) {
    while !cancel.is_cancelled() {
        let outcome = socket.lock().await.read_message(&cancel).await;
        match outcome {
            ReadOutcome::Delivered(payload) => {
                debug!("Received message of {} bytes", payload.len());
                if let Err(e) = sink.save(payload).await {
                    warn!("Failed to persist delivered message, dropping it: {}", e);
                }
            }
            ReadOutcome::Disconnected(reason) => {
                warn!(
                    "Connection to {} was closed unexpectedly: {}. Message will be discarded. Reconnecting...",
                    endpoint, reason
                );
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(reconnect_delay) => {
                        if let Err(e) = socket.lock().await.connect(&cancel).await {
                            // The next read reports Disconnected again, so
                            // the fixed-delay retry repeats until cancelled.
                            error!("Reconnect failed: {}", e);
                        }
                    }
                }
            }
            ReadOutcome::Aborted => {
                warn!("Listening socket aborted");
            }
        }
    }
    debug!("Ingest loop exited");
}
