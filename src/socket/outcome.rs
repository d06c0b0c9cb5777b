//! Outcome classification for a single logical-message read.

use std::fmt;

/// Result of one read attempt on the streaming socket.
///
/// Exactly one outcome is produced per read call, and each is consumed by
/// the supervising loop before the next read begins. Classification happens
/// here, at the transport layer; the client only ever matches on this union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete logical message, all fragments joined in order.
    Delivered(Vec<u8>),
    /// The remote side closed or the transport failed. Any partially
    /// accumulated message is discarded.
    Disconnected(DisconnectReason),
    /// The read was terminated by local cancellation.
    Aborted,
}

/// Why the connection was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote initiated shutdown with a close frame.
    CloseFrame { code: u16, reason: String },
    /// A transport-level failure, including an unexpected end of stream.
    Transport { detail: String },
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::CloseFrame { code, reason } if reason.is_empty() => {
                write!(f, "close frame {code}")
            }
            DisconnectReason::CloseFrame { code, reason } => {
                write!(f, "close frame {code} ({reason})")
            }
            DisconnectReason::Transport { detail } => write!(f, "transport error: {detail}"),
        }
    }
}
