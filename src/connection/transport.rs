//! Duplex Transport Layer
//!
//! Single responsibility: open a duplex byte channel and move frames in
//! and out of it. No knowledge of envelopes, authentication, or retry
//! policy.
//!
//! The [`Connector`] trait is the seam the reconnect engine is tested
//! through: production code uses [`WsConnector`] (tokio-tungstenite),
//! tests hand the supervisor a scripted connector backed by channels.

use async_trait::async_trait;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{http::Request, protocol::Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// A single inbound transport event.
#[derive(Debug)]
pub enum Frame {
    /// A binary frame, the only payload type the protocol uses
    Binary(Vec<u8>),
    /// A text frame; the dispatcher logs and discards these
    Text(String),
    /// The channel closed, with the close code when the peer sent one
    Closed { code: Option<u16> },
}

/// The send half of an open connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Transmit one binary frame.
    async fn send(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Start the close handshake. Errors are irrelevant at this point
    /// and are swallowed.
    async fn close(&mut self);
}

/// An open duplex connection: a sink for outbound frames and a stream
/// of inbound [`Frame`]s. The stream always ends with `Frame::Closed`
/// (or simply ends, which the supervisor treats the same way).
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub frames: mpsc::Receiver<Frame>,
}

/// Opens connections. One `connect` call corresponds to one connection
/// attempt; the connect future resolving is the transport `open` event.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// WebSocket connector over tokio-tungstenite, binary framing.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection> {
        debug!(url = %url, "opening websocket");

        let request = Request::builder()
            .uri(url)
            .header("Host", extract_host(url))
            .header("Origin", "http://localhost")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .body(())
            .map_err(|e| ClientError::Handshake(format!("failed to build request: {}", e)))?;

        let (ws, _) = connect_async_with_config(request, None, false)
            .await
            .map_err(|e| ClientError::Handshake(format!("websocket connect failed: {}", e)))?;

        let (sink, mut stream) = ws.split();
        let (frame_tx, frame_rx) = mpsc::channel(64);

        // Reader task: forwards inbound frames until the stream ends,
        // then reports the close exactly once.
        tokio::spawn(async move {
            let mut close_code = None;
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Binary(data)) => {
                        if frame_tx.send(Frame::Binary(data)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Text(text)) => {
                        if frame_tx.send(Frame::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        close_code = frame.map(|f| u16::from(f.code));
                        break;
                    }
                    // Ping/pong are answered by tungstenite
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "websocket stream error");
                        break;
                    }
                }
            }
            let _ = frame_tx.send(Frame::Closed { code: close_code }).await;
        });

        debug!(url = %url, "websocket open");
        Ok(Connection {
            sink: Box::new(WsSink { sink }),
            frames: frame_rx,
        })
    }
}

struct WsSink {
    sink: SplitSink<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Binary(payload))
            .await
            .map_err(|e| ClientError::Transport(format!("failed to send frame: {}", e)))
    }

    async fn close(&mut self) {
        let _ = self.sink.send(Message::Close(None)).await;
    }
}

/// Extract host from URL for the Host header
fn extract_host(url: &str) -> &str {
    url.split("//")
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or("localhost")
}
