//! Connection Engine
//!
//! Everything between the public [`Client`](crate::Client) handle and
//! the wire. Each submodule has a single responsibility:
//!
//! | Module       | Responsibility                                       |
//! |--------------|------------------------------------------------------|
//! | `transport`  | Duplex channel connect/send/receive                  |
//! | `state`      | Lifecycle transitions and the retry budget (pure)    |
//! | `correlator` | Request ids and pending-request tracking             |
//! | `dispatcher` | Routing inbound frames to correlator or push handler |
//! | `supervisor` | The per-client task that drives all of the above     |
//!
//! # Key Design Points
//!
//! ## Transitions are data, not callbacks
//!
//! Transport events do not mutate shared fields from event handlers.
//! They become [`state::LifecycleEvent`]s fed through a pure machine
//! that returns the new state plus the effects to perform, so retry and
//! disposal logic is testable without a live transport.
//!
//! ## One task owns the connection
//!
//! The supervisor owns the transport halves, the lifecycle machine, and
//! the dispatch order. Callers reach it only through channels; there is
//! no shared mutable connection state and no process-wide singleton.
//! Every client instance carries its own engine.

// Internal modules
pub(crate) mod correlator;
pub(crate) mod dispatcher;
pub(crate) mod supervisor;

// Public seams
pub mod state;
pub mod transport;
