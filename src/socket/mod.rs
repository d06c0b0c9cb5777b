//! WebSocket transport for the machine telemetry stream.
//!
//! One socket owns one physical connection. Reading yields classified
//! [`ReadOutcome`]s rather than raw transport results, so the supervising
//! client never inspects protocol errors itself.

pub mod outcome;
mod ws;

pub use outcome::{DisconnectReason, ReadOutcome};
pub use ws::WsSocket;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::Result;

/// Connection states of the underlying transport.
///
/// `Aborted` is terminal for a given transport handle: a fresh handle is
/// dialled on the next connect instead of reusing the failed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Unconnected,
    Connecting,
    Open,
    Closing,
    Closed,
    Aborted,
}

/// A streaming socket that delivers whole logical messages.
///
/// The production implementation is [`WsSocket`]; tests substitute scripted
/// fakes through this seam.
#[async_trait]
pub trait StreamSocket: Send + 'static {
    /// Current transport state.
    fn state(&self) -> SocketState;

    /// Open the transport. A no-op (logged) when already connecting or open.
    /// Any previously failed transport handle is discarded and replaced.
    async fn connect(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Graceful close with a normal-closure code. Only meaningful while
    /// connecting or open; best-effort under the supplied token.
    async fn close(&mut self, reason: &str, cancel: &CancellationToken) -> Result<()>;

    /// Read and reassemble one logical message, classifying the terminal
    /// condition. Never returns an error: connection loss and cancellation
    /// are outcomes.
    async fn read_message(&mut self, cancel: &CancellationToken) -> ReadOutcome;

    /// Release the transport unconditionally. Idempotent; safe from any
    /// state.
    fn release(&mut self);
}
