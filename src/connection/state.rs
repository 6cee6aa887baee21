//! Connection Lifecycle State Machine
//!
//! Single responsibility: decide, for each discrete transport or caller
//! event, what the next state is and which side effects the supervisor
//! must perform. No I/O and no clocks live here, so retry and disposal
//! logic is unit-testable without a transport.
//!
//! # States
//!
//! ```text
//! Disconnected ──initialize──▶ Connecting ──open──▶ Open
//!      ▲                        │      ▲             │
//!      │ budget exhausted       │      └───close─────┘ (budget left)
//!      └────────────────────────┘
//! Open ──dispose──▶ Closing ──close──▶ Disposed
//! ```
//!
//! The retry budget is reset on every successful open and on every
//! `initialize()`. A close while disposed is absorbed without effects.

/// Connection lifecycle state. Exactly one per client; mutated only by
/// the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport and no attempt in progress
    Disconnected,
    /// An attempt is in progress (cooldown wait or handshake)
    Connecting,
    /// The channel is open and usable
    Open,
    /// Disposal requested; waiting for the transport to finish closing
    Closing,
    /// Terminal until the next `initialize()`
    Disposed,
}

/// Remaining automatic reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryBudget {
    max_retries: u32,
    retries_left: u32,
}

impl RetryBudget {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retries_left: max_retries,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.retries_left = self.max_retries;
    }

    /// Take one retry from the budget. Returns false when none are left.
    pub(crate) fn consume(&mut self) -> bool {
        if self.retries_left > 0 {
            self.retries_left -= 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn retries_left(&self) -> u32 {
        self.retries_left
    }
}

/// A discrete lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LifecycleEvent {
    /// Caller asked to connect (idempotent)
    Initialize,
    /// The transport reached the open state
    Opened,
    /// The transport closed, whether it ever opened or not
    Closed,
    /// Caller asked for terminal teardown
    Dispose,
}

/// A side effect the supervisor must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Begin a connection attempt (cooldown, then dial)
    Connect,
    /// Invoke the credential source and send the authentication envelope
    Authenticate,
    /// Reject every pending request with a connection-closed error
    FlushPending,
    /// Force-close the open transport
    CloseTransport,
    /// Invoke the retry-exhaustion callback
    NotifyExhausted,
}

/// The lifecycle machine: current state, retry budget, disposed flag.
pub(crate) struct Lifecycle {
    state: ConnectionState,
    budget: RetryBudget,
    disposed: bool,
}

impl Lifecycle {
    pub(crate) fn new(max_retries: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            budget: RetryBudget::new(max_retries),
            disposed: false,
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn retries_left(&self) -> u32 {
        self.budget.retries_left()
    }

    /// Apply one event; returns the effects in execution order.
    pub(crate) fn apply(&mut self, event: LifecycleEvent) -> Vec<Effect> {
        use ConnectionState::*;
        use LifecycleEvent::*;

        match (self.state, event) {
            (_, Initialize) => {
                // Always resets the budget and revives a disposed client,
                // but never opens a second transport.
                self.budget.reset();
                self.disposed = false;
                match self.state {
                    Disconnected | Disposed => {
                        self.state = Connecting;
                        vec![Effect::Connect]
                    }
                    Connecting | Open | Closing => vec![],
                }
            }

            (Connecting, Opened) => {
                self.state = Open;
                self.budget.reset();
                vec![Effect::Authenticate]
            }

            (Open, Closed) => {
                let mut effects = vec![Effect::FlushPending];
                effects.extend(self.after_close());
                effects
            }
            (Connecting, Closed) => self.after_close(),
            (Closing, Closed) => {
                self.state = Disposed;
                vec![]
            }

            (Open, Dispose) => {
                self.disposed = true;
                self.state = Closing;
                vec![Effect::CloseTransport, Effect::FlushPending]
            }
            (Disconnected | Connecting | Disposed, Dispose) => {
                self.disposed = true;
                self.state = Disposed;
                vec![]
            }
            (Closing, Dispose) => vec![],

            // Stray events: an open racing a disposal, or a late close
            // after exhaustion. Absorbed.
            (_, Opened) | (_, Closed) => vec![],
        }
    }

    /// Shared close handling: reconnect while the budget lasts, then
    /// signal exhaustion exactly once.
    fn after_close(&mut self) -> Vec<Effect> {
        use ConnectionState::*;

        if self.disposed {
            self.state = Disposed;
            vec![]
        } else if self.budget.consume() {
            self.state = Connecting;
            vec![Effect::Connect]
        } else {
            self.state = Disconnected;
            vec![Effect::NotifyExhausted]
        }
    }
}
