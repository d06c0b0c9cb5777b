//! Machinestream - streaming ingestion client for machine telemetry
//!
//! Maintains a persistent WebSocket connection to a single remote telemetry
//! endpoint, classifies every read into a delivered payload, a lost
//! connection, or a locally aborted listen, and hands delivered payloads to
//! a pluggable sink.
//!
//! ## Modules
//!
//! - **socket**: transport ownership, fragment reassembly, outcome
//!   classification
//! - **client**: supervising read loop, reconnect policy, start/stop
//!   lifecycle
//! - **sink**: persistence boundary consumed by the client
//! - **config**: CLI/environment configuration for the binary

pub mod client;
pub mod config;
pub mod sink;
pub mod socket;
pub mod types;

pub use client::{ClientConfig, StreamClient};
pub use config::Args;
pub use sink::{JsonlSink, Sink};
pub use socket::{DisconnectReason, ReadOutcome, SocketState, StreamSocket, WsSocket};
pub use types::{Result, StreamError};
