//! Transport seam between the connection task and the network.
//!
//! The connection task only sees [`Connector`] and [`TransportConnection`].
//! [`WebSocketConnector`] is the production implementation on top of
//! `tokio-tungstenite`; tests plug in in-memory connectors.

use crate::{
    error::{NotifyError, Result},
    event_handlers::DisconnectReason,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{error::Error as WsError, protocol::Message},
    MaybeTlsStream,
};

type WebSocketStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound unit delivered by a transport connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Reply to a keepalive ping. Carries no data; only proves liveness.
    Pong,
    /// The peer closed the stream normally.
    Close(DisconnectReason),
}

/// An open, exclusively owned transport connection.
#[async_trait]
pub trait TransportConnection: Send {
    /// Next inbound frame. `None` means the stream ended without a close
    /// frame; `Some(Err(_))` is a transport failure.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Send a keepalive ping.
    async fn ping(&mut self) -> Result<()>;

    /// Best-effort graceful close.
    async fn close(&mut self);
}

/// Opens transport connections to resolved subscription URLs.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>>;
}

/// Default connector: one WebSocket per subscription.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportConnection>> {
        log::debug!("[kalam-notify] Opening WebSocket to {}", url);
        match connect_async(url).await {
            Ok((stream, _response)) => Ok(Box::new(WebSocketConnection { stream })),
            Err(WsError::Http(response)) => {
                let status = response.status();
                let body_text = response
                    .into_body()
                    .as_ref()
                    .and_then(|b| {
                        if b.is_empty() {
                            None
                        } else {
                            Some(String::from_utf8_lossy(b).into_owned())
                        }
                    })
                    .unwrap_or_default();
                let message = match status.as_u16() {
                    401 => "Unauthorized: WebSocket requires valid credentials".to_string(),
                    403 => "Forbidden: Access to WebSocket denied".to_string(),
                    code => {
                        if body_text.is_empty() {
                            format!("WebSocket HTTP error: {}", code)
                        } else {
                            format!("WebSocket HTTP error {}: {}", code, body_text)
                        }
                    },
                };
                Err(NotifyError::WebSocketError(message))
            },
            Err(e) => Err(NotifyError::WebSocketError(format!("Connection failed: {}", e))),
        }
    }
}

struct WebSocketConnection {
    stream: WebSocketStream,
}

#[async_trait]
impl TransportConnection for WebSocketConnection {
    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(WsError::ConnectionClosed) => return None,
                Err(e) => return Some(Err(NotifyError::WebSocketError(e.to_string()))),
            };
            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Message::Binary(data) => return Some(Ok(Frame::Binary(data.to_vec()))),
                Message::Ping(payload) => {
                    // tungstenite queues a Pong on its own; flush it explicitly.
                    let _ = self.stream.send(Message::Pong(payload)).await;
                },
                Message::Pong(_) => return Some(Ok(Frame::Pong)),
                Message::Close(frame) => {
                    let reason = match frame {
                        Some(f) => DisconnectReason::with_code(f.reason.to_string(), f.code.into()),
                        None => DisconnectReason::new("Server closed connection"),
                    };
                    return Some(Ok(Frame::Close(reason)));
                },
                Message::Frame(_) => {},
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.stream
            .send(Message::Ping(Bytes::new()))
            .await
            .map_err(|e| NotifyError::WebSocketError(format!("Failed to send keepalive ping: {}", e)))
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
