//! tokio-tungstenite implementation of [`StreamSocket`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, Message},
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{DisconnectReason, ReadOutcome, SocketState, StreamSocket};
use crate::types::{Result, StreamError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to the machine telemetry endpoint.
///
/// The endpoint is fixed at construction. The transport handle is replaced
/// wholesale on every reconnect; an aborted stream is never reused.
pub struct WsSocket {
    endpoint: String,
    stream: Option<WsStream>,
    state: SocketState,
}

impl WsSocket {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            stream: None,
            state: SocketState::Unconnected,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl StreamSocket for WsSocket {
    fn state(&self) -> SocketState {
        self.state
    }

    async fn connect(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!("Connecting to {}", self.endpoint);
        if matches!(self.state, SocketState::Connecting | SocketState::Open) {
            info!("Already connected to {}", self.endpoint);
            return Ok(());
        }

        // Never reuse a failed transport: drop whatever handle is left over
        // and dial a fresh one.
        self.stream = None;
        self.state = SocketState::Connecting;

        let connected = tokio::select! {
            _ = cancel.cancelled() => Err("connect cancelled".to_string()),
            res = connect_async(self.endpoint.as_str()) => {
                res.map(|(stream, _response)| stream).map_err(|e| e.to_string())
            }
        };

        match connected {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = SocketState::Open;
                info!("Successfully connected to {}", self.endpoint);
                Ok(())
            }
            Err(detail) => {
                self.state = SocketState::Unconnected;
                error!("Failed to connect to web socket at {}: {}", self.endpoint, detail);
                Err(StreamError::Connect {
                    url: self.endpoint.clone(),
                    detail,
                })
            }
        }
    }

    async fn close(&mut self, reason: &str, cancel: &CancellationToken) -> Result<()> {
        if !matches!(self.state, SocketState::Connecting | SocketState::Open) {
            debug!("Close requested while socket is {:?}, nothing to do", self.state);
            return Ok(());
        }

        let Some(mut stream) = self.stream.take() else {
            self.state = SocketState::Closed;
            return Ok(());
        };
        self.state = SocketState::Closing;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_owned().into(),
        };
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(StreamError::Close("close cancelled".to_string())),
            res = stream.close(Some(frame)) => res.map_err(|e| StreamError::Close(e.to_string())),
        };

        // The handle is released either way; a failed close is reported but
        // leaves no half-open transport behind.
        self.state = SocketState::Closed;
        result
    }

    async fn read_message(&mut self, cancel: &CancellationToken) -> ReadOutcome {
        if self.state != SocketState::Open {
            return ReadOutcome::Disconnected(DisconnectReason::Transport {
                detail: "socket is not open".to_string(),
            });
        }
        let Some(mut stream) = self.stream.take() else {
            self.state = SocketState::Aborted;
            return ReadOutcome::Disconnected(DisconnectReason::Transport {
                detail: "transport handle is gone".to_string(),
            });
        };

        loop {
            debug!("Waiting for data from the socket...");
            let item = tokio::select! {
                _ = cancel.cancelled() => None,
                item = stream.next() => Some(item),
            };
            let Some(item) = item else {
                // Cancelled locally; the connection itself is still fine.
                self.stream = Some(stream);
                return ReadOutcome::Aborted;
            };

            match item {
                Some(Ok(Message::Binary(data))) => {
                    self.stream = Some(stream);
                    return ReadOutcome::Delivered(data);
                }
                Some(Ok(Message::Text(text))) => {
                    self.stream = Some(stream);
                    return ReadOutcome::Delivered(text.into_bytes());
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = stream.send(Message::Pong(payload)).await {
                        warn!("Failed to answer ping: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    self.state = SocketState::Closed;
                    let (code, reason) = match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (u16::from(CloseCode::Status), String::new()),
                    };
                    return ReadOutcome::Disconnected(DisconnectReason::CloseFrame {
                        code,
                        reason,
                    });
                }
                Some(Err(e)) => {
                    error!("Error while receiving data from the socket: {}", e);
                    self.state = SocketState::Aborted;
                    return ReadOutcome::Disconnected(DisconnectReason::Transport {
                        detail: e.to_string(),
                    });
                }
                None => {
                    self.state = SocketState::Aborted;
                    return ReadOutcome::Disconnected(DisconnectReason::Transport {
                        detail: "stream ended unexpectedly".to_string(),
                    });
                }
            }
        }
    }

    fn release(&mut self) {
        self.stream = None;
        self.state = SocketState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn bind_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn connect_refused_surfaces_connect_error() {
        // Bind then drop so the port is known-dead.
        let (listener, url) = bind_server().await;
        drop(listener);

        let mut socket = WsSocket::new(url);
        let cancel = CancellationToken::new();
        let result = socket.connect(&cancel).await;

        assert!(matches!(result, Err(StreamError::Connect { .. })));
        assert_eq!(socket.state(), SocketState::Unconnected);
    }

    #[tokio::test]
    async fn delivers_payloads_byte_exact() {
        let (listener, url) = bind_server().await;
        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let expected = payload.clone();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Binary(payload)).await.unwrap();
            ws.send(Message::Text("hello".to_string())).await.unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "done".into(),
            }))
            .await
            .unwrap();
        });

        let mut socket = WsSocket::new(url);
        let cancel = CancellationToken::new();
        socket.connect(&cancel).await.unwrap();
        assert_eq!(socket.state(), SocketState::Open);

        let first = socket.read_message(&cancel).await;
        assert_eq!(first, ReadOutcome::Delivered(expected));

        let second = socket.read_message(&cancel).await;
        assert_eq!(second, ReadOutcome::Delivered(b"hello".to_vec()));

        let third = socket.read_message(&cancel).await;
        assert_eq!(
            third,
            ReadOutcome::Disconnected(DisconnectReason::CloseFrame {
                code: 1000,
                reason: "done".to_string(),
            })
        );
        assert_eq!(socket.state(), SocketState::Closed);
    }

    #[tokio::test]
    async fn cancellation_aborts_a_pending_read() {
        let (listener, url) = bind_server().await;

        // Server that accepts and then stays silent.
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(ws);
        });

        let mut socket = WsSocket::new(url);
        let cancel = CancellationToken::new();
        socket.connect(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = socket.read_message(&cancel).await;
        assert_eq!(outcome, ReadOutcome::Aborted);
    }

    #[tokio::test]
    async fn reconnects_with_a_fresh_transport_after_abort() {
        let (listener, url) = bind_server().await;

        tokio::spawn(async move {
            // First connection is dropped without a closing handshake.
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            drop(ws);

            // Second connection delivers a message.
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            ws.send(Message::Binary(vec![1, 2, 3, 4])).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });

        let mut socket = WsSocket::new(url);
        let cancel = CancellationToken::new();
        socket.connect(&cancel).await.unwrap();

        let outcome = socket.read_message(&cancel).await;
        assert!(matches!(
            outcome,
            ReadOutcome::Disconnected(DisconnectReason::Transport { .. })
        ));

        socket.connect(&cancel).await.unwrap();
        let outcome = socket.read_message(&cancel).await;
        assert_eq!(outcome, ReadOutcome::Delivered(vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn read_on_unconnected_socket_reports_disconnected() {
        let mut socket = WsSocket::new("ws://127.0.0.1:9");
        let cancel = CancellationToken::new();

        let outcome = socket.read_message(&cancel).await;
        assert_eq!(
            outcome,
            ReadOutcome::Disconnected(DisconnectReason::Transport {
                detail: "socket is not open".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let mut socket = WsSocket::new("ws://127.0.0.1:9");
        socket.release();
        socket.release();
        assert_eq!(socket.state(), SocketState::Closed);
    }
}
