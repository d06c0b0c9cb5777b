//! Crate-wide error and result types.
//!
//! Only genuinely exceptional conditions live here. A lost connection or a
//! locally cancelled read is an ordinary [`ReadOutcome`](crate::socket::ReadOutcome)
//! variant, never an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors surfaced by the stream ingestion core.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A connect attempt failed. Fatal to `start`; the caller decides
    /// whether to retry.
    #[error("failed to connect to web socket at {url}: {detail}")]
    Connect { url: String, detail: String },

    /// A graceful close failed. The lifecycle is still reset by the caller.
    #[error("web socket close failed: {0}")]
    Close(String),

    /// The sink rejected a delivered payload. Caught at the dispatch site;
    /// the message is dropped and ingestion continues.
    #[error("sink error: {0}")]
    Sink(String),
}
