//! Rust client SDK for the Lantern messaging backend
//!
//! Connects a peer to the backend over one auto-reconnecting duplex
//! WebSocket channel and multiplexes three kinds of traffic over it:
//! fire-and-forget messages, subscription push events, and correlated
//! request/response exchanges.
//!
//! Message bodies are opaque ciphertext: end-to-end encryption and key
//! storage live in layers above this crate, which only moves envelopes.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lantern_client::{
//!     ChannelMessage, Client, ClientConfig, EventHandler, Request,
//!     ServerEnvelope, StaticCredentials,
//! };
//!
//! struct Printer;
//!
//! impl EventHandler for Printer {
//!     fn on_message(&self, message: ServerEnvelope) {
//!         println!("push: {:?}", message);
//!     }
//!     fn on_retries_exhausted(&self) {
//!         eprintln!("gave up reconnecting");
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(
//!     ClientConfig::new("ws://lantern.example/ws"),
//!     Arc::new(StaticCredentials::new("token")),
//!     Arc::new(Printer),
//! );
//!
//! client.initialize();
//! client.subscribe(42);
//!
//! let response = client
//!     .request(Request::publish_channel(ChannelMessage {
//!         channel: 42,
//!         body: b"ciphertext".to_vec(),
//!         ..Default::default()
//!     }))
//!     .await?;
//! println!("stored as {:?}", response.ack);
//!
//! client.dispose();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod error;
pub mod protocol;

// Re-export the public API
pub use client::{Client, EventHandler};
pub use config::ClientConfig;
pub use connection::state::ConnectionState;
pub use connection::transport::{Connection, Connector, Frame, FrameSink, WsConnector};
pub use credentials::{CredentialSource, StaticCredentials};
pub use error::{ClientError, Result};
pub use protocol::{
    Ack, ChannelMessage, ClientEnvelope, DirectMessage, ErrorBody, Request, Response,
    ServerEnvelope, Subscribe, SyncQuery, Unsubscribe,
};
