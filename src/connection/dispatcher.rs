//! Message Dispatcher
//!
//! Single responsibility: route every inbound transport frame. Frames
//! carrying a response go to the correlator; everything else is
//! delivered to the caller's handler, synchronously, in delivery order.
//!
//! Failures here are never connection-fatal: undecodable and non-binary
//! frames are logged and dropped, and the next frame is processed as if
//! nothing happened.

use std::sync::Arc;

use tracing::warn;

use super::correlator::Correlator;
use super::transport::Frame;
use crate::client::EventHandler;
use crate::protocol;

pub(crate) struct Dispatcher {
    correlator: Arc<Correlator>,
    handler: Arc<dyn EventHandler>,
}

impl Dispatcher {
    pub(crate) fn new(correlator: Arc<Correlator>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            correlator,
            handler,
        }
    }

    /// Route one inbound frame. `Frame::Closed` never reaches this
    /// point; the supervisor consumes it.
    pub(crate) async fn dispatch(&self, frame: Frame) {
        match frame {
            Frame::Binary(bytes) => match protocol::decode_server_envelope(&bytes) {
                Ok(mut envelope) => {
                    if let Some(response) = envelope.response.take() {
                        self.correlator.resolve(response).await;
                    } else {
                        self.handler.on_message(envelope);
                    }
                }
                Err(e) => {
                    warn!(error = %e, len = bytes.len(), "dropping undecodable frame");
                }
            },
            Frame::Text(text) => {
                warn!(len = text.len(), "dropping unexpected text frame");
            }
            Frame::Closed { .. } => {
                warn!("close frame reached the dispatcher");
            }
        }
    }
}
