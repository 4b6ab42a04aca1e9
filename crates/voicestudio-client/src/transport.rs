//! Transport abstraction for the event channel.
//!
//! A [`Transport`] opens one [`TransportConnection`] to a URL. The
//! reconnecting channel is the only caller and never holds more than one
//! connection at a time. The production implementation is a WebSocket over
//! tokio-tungstenite; tests use the scripted fake in [`testing`].

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::error::TransportError;

// ============================================================================
// Transport Traits
// ============================================================================

/// Opens connections to the event channel endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Box<dyn TransportConnection>, TransportError>;
}

/// One open, full-duplex text connection.
#[async_trait]
pub trait TransportConnection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Next inbound text frame.
    ///
    /// `None` means the peer closed the connection. Must be cancel-safe: the
    /// channel polls it inside `select!`.
    async fn next_text(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the connection. Errors are ignored.
    async fn close(&mut self);
}

// ============================================================================
// WebSocket Transport
// ============================================================================

/// Production transport: a WebSocket opened with `connect_async`.
///
/// `wss` URLs are handled with rustls and the webpki root store.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

impl WsTransport {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &Url) -> Result<Box<dyn TransportConnection>, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn next_text(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Server closed progress channel");
                    return None;
                }
                // Pings are answered by tungstenite itself.
                Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}

// ============================================================================
// Fake Transport for Testing
// ============================================================================
