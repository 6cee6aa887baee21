//! Shared test support: a scripted in-memory connector standing in for
//! the WebSocket transport, and a recording event handler.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use lantern_client::{
    protocol::decode_client_envelope, protocol::encode_server_envelope, ClientConfig,
    ClientEnvelope, ClientError, Connection, Connector, EventHandler, Frame, FrameSink, Result,
    ServerEnvelope,
};

/// The backend's side of one accepted in-memory connection.
pub struct ServerEnd {
    /// Frames the client transmitted
    pub outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    /// Pushes frames to the client
    pub inbound: mpsc::Sender<Frame>,
}

impl ServerEnd {
    /// Next envelope the client sent, decoded.
    pub async fn recv_envelope(&mut self) -> ClientEnvelope {
        let bytes = tokio::time::timeout(Duration::from_secs(2), self.outbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client closed its sink");
        decode_client_envelope(&bytes).expect("client sent an undecodable frame")
    }

    pub async fn push(&self, envelope: &ServerEnvelope) {
        let bytes = encode_server_envelope(envelope).unwrap();
        self.inbound
            .send(Frame::Binary(bytes))
            .await
            .expect("client dropped the connection");
    }

    pub async fn push_frame(&self, frame: Frame) {
        self.inbound
            .send(frame)
            .await
            .expect("client dropped the connection");
    }

    /// Simulate a server-initiated close.
    pub async fn close(&self, code: u16) {
        let _ = self.inbound.send(Frame::Closed { code: Some(code) }).await;
    }
}

struct ChannelSink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::Sender<Frame>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, payload: Vec<u8>) -> Result<()> {
        self.outbound
            .send(payload)
            .map_err(|_| ClientError::Transport("server end dropped".into()))
    }

    async fn close(&mut self) {
        // A real transport completes the close handshake; the scripted
        // one reports the close event straight back.
        let _ = self.inbound.send(Frame::Closed { code: Some(1000) }).await;
    }
}

/// A connector that refuses the first `refusals` attempts and hands the
/// test a [`ServerEnd`] for every accepted one.
pub struct ScriptedConnector {
    refusals: usize,
    attempts: AtomicUsize,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl ScriptedConnector {
    pub fn new(refusals: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                refusals,
                attempts: AtomicUsize::new(0),
                accepted: accepted_tx,
            }),
            accepted_rx,
        )
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Connection> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.refusals {
            return Err(ClientError::Handshake("connection refused".into()));
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(64);

        let server = ServerEnd {
            outbound: outbound_rx,
            inbound: inbound_tx.clone(),
        };
        let _ = self.accepted.send(server);

        Ok(Connection {
            sink: Box::new(ChannelSink {
                outbound: outbound_tx,
                inbound: inbound_tx,
            }),
            frames: inbound_rx,
        })
    }
}

/// Records every callback for later assertions.
#[derive(Default)]
pub struct Recorder {
    pub messages: Mutex<Vec<ServerEnvelope>>,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub exhausted: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn exhausted_count(&self) -> usize {
        self.exhausted.load(Ordering::SeqCst)
    }
}

impl EventHandler for Recorder {
    fn on_message(&self, message: ServerEnvelope) {
        self.messages.lock().unwrap().push(message);
    }

    fn on_connect(&self) {
        self.connects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnect(&self, _close_code: Option<u16>) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_retries_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }
}

/// Config with a zero cooldown so retries run at test speed.
pub fn fast_config() -> ClientConfig {
    ClientConfig {
        url: "ws://test.invalid".to_string(),
        max_retries: 3,
        reconnect_cooldown: Duration::ZERO,
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_millis(500),
    }
}

/// Poll until the condition holds or two seconds pass.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition not reached within two seconds"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
