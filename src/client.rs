//! Lantern Client
//!
//! The public handle over one logical connection to the messaging
//! backend. Construction spawns the connection supervisor; the handle
//! itself is a thin, cloneable front of channels:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       Client                          │
//! │  initialize / dispose / send / request / state        │
//! └──────────────────────────────────────────────────────┘
//!            │ commands (mpsc)        ▲ state (watch)
//!            ▼                        │
//! ┌──────────────────────────────────────────────────────┐
//! │                     Supervisor                        │
//! │  lifecycle machine · reconnect · dispatcher           │
//! └──────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//!                  Connector / transport
//! ```
//!
//! Multiple independent clients are constructible and usable
//! concurrently in one process; nothing is shared between them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, warn};

use crate::config::ClientConfig;
use crate::connection::correlator::Correlator;
use crate::connection::state::ConnectionState;
use crate::connection::supervisor::{Command, Supervisor};
use crate::connection::transport::{Connector, WsConnector};
use crate::credentials::CredentialSource;
use crate::error::{ClientError, Result};
use crate::protocol::{
    self, ChannelMessage, ClientEnvelope, DirectMessage, Request, Response, ServerEnvelope,
};

/// Receives everything the backend pushes and the connection's
/// lifecycle notifications.
///
/// Callbacks run synchronously on the connection task, in transport
/// delivery order. A handler that blocks delays every subsequent
/// inbound frame, so hand long work off to a task or channel.
pub trait EventHandler: Send + Sync {
    /// An inbound envelope that is not a response to a pending request.
    fn on_message(&self, message: ServerEnvelope);

    /// The channel reached the open state.
    fn on_connect(&self) {}

    /// The channel closed, with the peer's close code when it sent one.
    /// Fired before any reconnect attempt.
    fn on_disconnect(&self, _close_code: Option<u16>) {}

    /// The retry budget ran out; no further automatic attempts will be
    /// made until the next `initialize()`.
    fn on_retries_exhausted(&self) {}
}

/// A client for the Lantern messaging backend.
///
/// Cloning yields another handle to the same connection. The supervisor
/// shuts down, closing any open transport, when the last handle drops.
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    commands: mpsc::UnboundedSender<Command>,
    correlator: Arc<Correlator>,
    state: watch::Receiver<ConnectionState>,
}

impl Client {
    /// Create a client over the standard WebSocket transport.
    ///
    /// The connection is not opened until [`initialize`](Self::initialize)
    /// is called.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialSource>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self::with_connector(config, credentials, handler, Arc::new(WsConnector))
    }

    /// Create a client over a custom transport. Tests use this to drive
    /// the reconnect engine with a scripted connector.
    pub fn with_connector(
        config: ClientConfig,
        credentials: Arc<dyn CredentialSource>,
        handler: Arc<dyn EventHandler>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let correlator = Arc::new(Correlator::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let supervisor = Supervisor::new(
            config.clone(),
            connector,
            credentials,
            handler,
            Arc::clone(&correlator),
            state_tx,
            command_rx,
        );
        tokio::spawn(supervisor.run());

        Self {
            config,
            commands: command_tx,
            correlator,
            state: state_rx,
        }
    }

    /// Connect, resetting the retry budget. Idempotent: while already
    /// connecting or open this only resets the budget and never opens a
    /// second transport. Also revives a disposed client.
    pub fn initialize(&self) {
        self.command(Command::Initialize);
    }

    /// Tear the connection down and stop reconnecting. Requests still
    /// pending are rejected immediately.
    pub fn dispose(&self) {
        self.command(Command::Dispose);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// True when no transport is open or opening.
    pub fn is_disconnected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Disconnected | ConnectionState::Closing | ConnectionState::Disposed
        )
    }

    /// Fire-and-forget send. While disconnected the envelope is dropped
    /// with a warning; outbound traffic is never buffered across
    /// reconnects, and the call site cannot distinguish "accepted" from
    /// "dropped".
    pub fn send(&self, envelope: ClientEnvelope) {
        match protocol::encode_client_envelope(&envelope) {
            Ok(bytes) => self.command(Command::Transmit(bytes)),
            Err(e) => error!(error = %e, "failed to encode outbound envelope"),
        }
    }

    /// Send a user-to-user message, fire-and-forget.
    pub fn send_direct(&self, message: DirectMessage) {
        self.send(ClientEnvelope::direct_message(message));
    }

    /// Send a channel message, fire-and-forget.
    pub fn send_channel(&self, message: ChannelMessage) {
        self.send(ClientEnvelope::channel_message(message));
    }

    /// Start receiving pushes for a channel.
    pub fn subscribe(&self, channel: u64) {
        self.send(ClientEnvelope::subscribe(channel));
    }

    /// Stop receiving pushes for a channel.
    pub fn unsubscribe(&self, channel: u64) {
        self.send(ClientEnvelope::unsubscribe(channel));
    }

    /// Correlated request with the configured default timeout.
    pub async fn request(&self, request: Request) -> Result<Response> {
        self.request_with_timeout(request, self.config.request_timeout)
            .await
    }

    /// Correlated request with an explicit timeout.
    ///
    /// The request is stamped with a fresh correlation id and resolves
    /// with the matching response. It rejects with
    /// [`ClientError::Timeout`] when no response arrives in time (a
    /// later response for the same id is silently dropped) and with
    /// [`ClientError::ConnectionClosed`] when the connection leaves the
    /// open state while the request is pending.
    pub async fn request_with_timeout(
        &self,
        mut request: Request,
        deadline: Duration,
    ) -> Result<Response> {
        if self.state() == ConnectionState::Disposed {
            return Err(ClientError::Disposed);
        }

        let id = self.correlator.allocate();
        request.id = id;
        let response_rx = self.correlator.register(id).await;

        let bytes = protocol::encode_client_envelope(&ClientEnvelope::request(request))?;
        self.command(Command::Transmit(bytes));

        match tokio::time::timeout(deadline, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.correlator.forget(id).await;
                Err(ClientError::Timeout(deadline))
            }
        }
    }

    fn command(&self, command: Command) {
        // The supervisor outlives every handle; a send only fails while
        // the runtime is shutting down.
        if self.commands.send(command).is_err() {
            warn!("connection supervisor is gone");
        }
    }
}
