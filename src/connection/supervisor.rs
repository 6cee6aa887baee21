//! Connection Supervisor
//!
//! Single responsibility: keep exactly one logical connection alive,
//! re-establishing it after failure without any caller involvement.
//!
//! One supervisor task runs per client for the client's whole lifetime.
//! It owns the transport halves and the lifecycle machine; callers talk
//! to it through an unbounded command channel, and the current
//! [`ConnectionState`] is published through a watch channel.
//!
//! The lifecycle machine in [`state`](super::state) decides every
//! transition; this task only performs the effects it is told to:
//! dialing, authenticating, flushing pending requests, notifying
//! exhaustion, and closing the transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::correlator::Correlator;
use super::dispatcher::Dispatcher;
use super::state::{ConnectionState, Effect, Lifecycle, LifecycleEvent};
use super::transport::{Connection, Connector, Frame, FrameSink};
use crate::client::EventHandler;
use crate::config::ClientConfig;
use crate::credentials::CredentialSource;
use crate::protocol::{self, ClientEnvelope};

/// A caller instruction delivered over the command channel.
pub(crate) enum Command {
    /// Idempotent connect; also resets the retry budget
    Initialize,
    /// Terminal teardown
    Dispose,
    /// A pre-encoded envelope to transmit. Dropped with a warning when
    /// no transport is open; outbound traffic is not buffered across
    /// reconnects.
    Transmit(Vec<u8>),
}

pub(crate) struct Supervisor {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialSource>,
    handler: Arc<dyn EventHandler>,
    correlator: Arc<Correlator>,
    dispatcher: Dispatcher,
    lifecycle: Lifecycle,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    last_attempt: Option<Instant>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialSource>,
        handler: Arc<dyn EventHandler>,
        correlator: Arc<Correlator>,
        state_tx: watch::Sender<ConnectionState>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&correlator), Arc::clone(&handler));
        let lifecycle = Lifecycle::new(config.max_retries);
        Self {
            config,
            connector,
            credentials,
            handler,
            correlator,
            dispatcher,
            lifecycle,
            state_tx,
            commands,
            last_attempt: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            match self.lifecycle.state() {
                ConnectionState::Connecting => {
                    if let Some(connection) = self.attempt().await {
                        self.open_loop(connection).await;
                    }
                }
                // Disconnected, Disposed: nothing to drive until the
                // caller says something. Open/Closing only exist inside
                // open_loop.
                _ => {
                    let Some(command) = self.commands.recv().await else {
                        break;
                    };
                    self.handle_idle_command(command).await;
                }
            }
        }
        debug!("supervisor stopped");
    }

    async fn handle_idle_command(&mut self, command: Command) {
        match command {
            Command::Initialize => {
                self.apply(LifecycleEvent::Initialize).await;
            }
            Command::Dispose => {
                self.apply(LifecycleEvent::Dispose).await;
            }
            Command::Transmit(_) => {
                warn!("channel not open, dropping outbound message");
            }
        }
    }

    /// One connection attempt: cooldown, then dial with the open
    /// timeout as a watchdog.
    async fn attempt(&mut self) -> Option<Connection> {
        if !self.wait_cooldown().await {
            return None;
        }

        self.last_attempt = Some(Instant::now());
        info!(url = %self.config.url, "connecting");

        let dial = timeout(
            self.config.connect_timeout,
            self.connector.connect(&self.config.url),
        )
        .await;

        match dial {
            Ok(Ok(mut connection)) => {
                self.apply(LifecycleEvent::Opened).await;
                if self.lifecycle.state() != ConnectionState::Open {
                    // The machine absorbed the open (disposal raced the
                    // dial); discard the fresh transport.
                    connection.sink.close().await;
                    return None;
                }
                Some(connection)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "connection attempt failed");
                self.apply(LifecycleEvent::Closed).await;
                None
            }
            Err(_) => {
                warn!(
                    timeout = ?self.config.connect_timeout,
                    "connection attempt timed out"
                );
                self.apply(LifecycleEvent::Closed).await;
                None
            }
        }
    }

    /// Wait out the reconnect cooldown, staying responsive to commands.
    /// Returns false when disposal interrupted the wait.
    async fn wait_cooldown(&mut self) -> bool {
        let remaining = match self.last_attempt {
            Some(last) => self.config.reconnect_cooldown.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        };
        if remaining.is_zero() {
            return true;
        }

        debug!(wait = ?remaining, "throttling reconnect");
        let sleep = tokio::time::sleep(remaining);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Initialize) => {
                        self.apply(LifecycleEvent::Initialize).await;
                    }
                    Some(Command::Transmit(_)) => {
                        warn!("channel not open, dropping outbound message");
                    }
                    Some(Command::Dispose) | None => {
                        self.apply(LifecycleEvent::Dispose).await;
                        return false;
                    }
                }
            }
        }
    }

    /// Drive one open connection until it closes or is disposed.
    async fn open_loop(&mut self, mut connection: Connection) {
        info!(url = %self.config.url, "connection open");
        self.handler.on_connect();
        self.authenticate(connection.sink.as_mut()).await;

        loop {
            tokio::select! {
                frame = connection.frames.recv() => match frame {
                    Some(Frame::Closed { code }) => {
                        info!(code = ?code, "connection closed");
                        self.handler.on_disconnect(code);
                        self.apply(LifecycleEvent::Closed).await;
                        return;
                    }
                    Some(frame) => self.dispatcher.dispatch(frame).await,
                    None => {
                        info!("connection closed without close frame");
                        self.handler.on_disconnect(None);
                        self.apply(LifecycleEvent::Closed).await;
                        return;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Transmit(bytes)) => {
                        if let Err(e) = connection.sink.send(bytes).await {
                            // The matching close event is on its way; it
                            // drives recovery.
                            warn!(error = %e, "send failed");
                        }
                    }
                    Some(Command::Initialize) => {
                        self.apply(LifecycleEvent::Initialize).await;
                    }
                    Some(Command::Dispose) | None => {
                        let effects = self.apply(LifecycleEvent::Dispose).await;
                        if effects.contains(&Effect::CloseTransport) {
                            connection.sink.close().await;
                            self.drain_until_closed(&mut connection).await;
                        }
                        return;
                    }
                }
            }
        }
    }

    /// After a forced close, absorb remaining frames until the close
    /// event lands so the machine can settle in `Disposed`.
    async fn drain_until_closed(&mut self, connection: &mut Connection) {
        let deadline = tokio::time::sleep(self.config.connect_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                frame = connection.frames.recv() => match frame {
                    Some(Frame::Closed { code }) => {
                        self.handler.on_disconnect(code);
                        self.apply(LifecycleEvent::Closed).await;
                        return;
                    }
                    Some(_) => {}
                    None => {
                        self.handler.on_disconnect(None);
                        self.apply(LifecycleEvent::Closed).await;
                        return;
                    }
                },
                _ = &mut deadline => {
                    warn!("close handshake timed out");
                    self.handler.on_disconnect(None);
                    self.apply(LifecycleEvent::Closed).await;
                    return;
                }
            }
        }
    }

    /// Fetch a bearer token and send the authentication envelope.
    /// Fire-and-forget: the channel is usable before any server-side
    /// acknowledgement, and a failed credential source leaves the
    /// connection unauthenticated rather than closed.
    async fn authenticate(&mut self, sink: &mut dyn FrameSink) {
        let token = match self.credentials.bearer_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "credential source failed; connection stays unauthenticated");
                return;
            }
        };

        match protocol::encode_client_envelope(&ClientEnvelope::bearer_token(token)) {
            Ok(bytes) => {
                if let Err(e) = sink.send(bytes).await {
                    warn!(error = %e, "failed to send authentication envelope");
                }
            }
            Err(e) => {
                error!(error = %e, "failed to encode authentication envelope");
            }
        }
    }

    /// Run one event through the machine, publish the new state, and
    /// perform the transport-independent effects. Transport-bound
    /// effects (`Connect`, `Authenticate`, `CloseTransport`) are driven
    /// by the callers that hold the transport.
    async fn apply(&mut self, event: LifecycleEvent) -> Vec<Effect> {
        let effects = self.lifecycle.apply(event);
        debug!(
            state = ?self.lifecycle.state(),
            retries_left = self.lifecycle.retries_left(),
            "lifecycle transition"
        );
        let _ = self.state_tx.send(self.lifecycle.state());

        for effect in &effects {
            match effect {
                Effect::FlushPending => self.correlator.fail_all().await,
                Effect::NotifyExhausted => {
                    warn!("retry budget exhausted, giving up");
                    self.handler.on_retries_exhausted();
                }
                Effect::Connect | Effect::Authenticate | Effect::CloseTransport => {}
            }
        }
        effects
    }
}
