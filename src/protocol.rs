//! Lantern Wire Protocol
//!
//! Single responsibility: encode and decode envelopes in the backend's
//! MessagePack wire format. No knowledge of connections, retries, or
//! request correlation.
//!
//! # Wire Format
//!
//! Envelopes are MessagePack maps with named fields. An envelope is a
//! tagged union in spirit: exactly one of its optional fields is
//! populated, and the discriminant is which field is present, not an
//! explicit type tag. Absent fields are absent bytes.
//!
//! ## Outbound ([`ClientEnvelope`])
//! ```text
//! { "bearer_token": <string> }        authentication, sent once per open
//! { "direct_message": {...} }         fire-and-forget user message
//! { "channel_message": {...} }        fire-and-forget channel message
//! { "subscribe": {"channel": <u64>} } push subscription control
//! { "unsubscribe": {...} }
//! { "request": {"id": <u32>, ...} }   correlated request
//! ```
//!
//! ## Inbound ([`ServerEnvelope`])
//! ```text
//! { "direct_message": {...} }         push
//! { "channel_message": {...} }        push
//! { "response": {"id": <u32>, ...} }  reply to a pending request
//! ```
//!
//! Message bodies are opaque ciphertext; encryption happens in a layer
//! above this crate.

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// A user-to-user message. The body is opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectMessage {
    /// Server-assigned message id (zero when not yet stored)
    #[serde(default)]
    pub id: u64,
    /// Recipient address
    pub to: u64,
    /// Sender address (filled by the server on inbound messages)
    #[serde(default)]
    pub from: u64,
    /// Encrypted payload
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    /// Application-level message kind
    #[serde(default)]
    pub kind: u32,
}

/// A message published to a channel. The body is opaque ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Server-assigned message id (zero when not yet stored)
    #[serde(default)]
    pub id: u64,
    /// Channel the message belongs to
    pub channel: u64,
    /// Encrypted payload
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

/// Subscription control payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub channel: u64,
}

/// Unsubscription control payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsubscribe {
    pub channel: u64,
}

/// A backlog query carried inside a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncQuery {
    pub channel: u64,
    /// Return messages with ids strictly greater than this
    #[serde(default)]
    pub start_after: u64,
    #[serde(default)]
    pub limit: u32,
}

/// A correlated request. Exactly one operation field is populated.
///
/// The `id` is stamped by the client's correlator just before
/// transmission and is always non-zero on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_direct: Option<DirectMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_channel: Option<ChannelMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncQuery>,
}

impl Request {
    pub fn publish_direct(message: DirectMessage) -> Self {
        Self {
            publish_direct: Some(message),
            ..Default::default()
        }
    }

    pub fn publish_channel(message: ChannelMessage) -> Self {
        Self {
            publish_channel: Some(message),
            ..Default::default()
        }
    }

    pub fn sync(query: SyncQuery) -> Self {
        Self {
            sync: Some(query),
            ..Default::default()
        }
    }
}

/// Error payload inside a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

/// Acknowledgement payload inside a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    /// Server-assigned id of the stored message
    pub id: u64,
}

/// A reply to a [`Request`], echoing its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<Ack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChannelMessage>>,
}

/// Outbound envelope. Exactly one field is populated per instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_message: Option<DirectMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_message: Option<ChannelMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<Subscribe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribe: Option<Unsubscribe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
}

impl ClientEnvelope {
    pub fn bearer_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn direct_message(message: DirectMessage) -> Self {
        Self {
            direct_message: Some(message),
            ..Default::default()
        }
    }

    pub fn channel_message(message: ChannelMessage) -> Self {
        Self {
            channel_message: Some(message),
            ..Default::default()
        }
    }

    pub fn subscribe(channel: u64) -> Self {
        Self {
            subscribe: Some(Subscribe { channel }),
            ..Default::default()
        }
    }

    pub fn unsubscribe(channel: u64) -> Self {
        Self {
            unsubscribe: Some(Unsubscribe { channel }),
            ..Default::default()
        }
    }

    pub fn request(request: Request) -> Self {
        Self {
            request: Some(request),
            ..Default::default()
        }
    }
}

/// Inbound envelope. Exactly one field is populated per instance.
///
/// An envelope with a populated `response` is routed to the correlator
/// and never reaches the push handler.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_message: Option<DirectMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_message: Option<ChannelMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
}

impl ServerEnvelope {
    pub fn direct_message(message: DirectMessage) -> Self {
        Self {
            direct_message: Some(message),
            ..Default::default()
        }
    }

    pub fn channel_message(message: ChannelMessage) -> Self {
        Self {
            channel_message: Some(message),
            ..Default::default()
        }
    }

    pub fn response(response: Response) -> Self {
        Self {
            response: Some(response),
            ..Default::default()
        }
    }
}

/// Encode an outbound envelope to wire bytes.
pub fn encode_client_envelope(envelope: &ClientEnvelope) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(envelope).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Decode an inbound envelope from wire bytes.
///
/// Decode failures are per-message: the caller drops the message and
/// keeps the connection.
pub fn decode_server_envelope(bytes: &[u8]) -> Result<ServerEnvelope> {
    rmp_serde::from_slice(bytes).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Encode an inbound envelope. Test servers use this; clients never do.
pub fn encode_server_envelope(envelope: &ServerEnvelope) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(envelope).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Decode an outbound envelope. Test servers use this; clients never do.
pub fn decode_client_envelope(bytes: &[u8]) -> Result<ClientEnvelope> {
    rmp_serde::from_slice(bytes).map_err(|e| ClientError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope_round_trip() {
        let envelope = ClientEnvelope::request(Request {
            id: 7,
            ..Request::sync(SyncQuery {
                channel: 42,
                start_after: 100,
                limit: 50,
            })
        });

        let bytes = encode_client_envelope(&envelope).unwrap();
        let decoded = decode_client_envelope(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.request.unwrap().id, 7);
    }

    #[test]
    fn test_push_envelope_round_trip() {
        let envelope = ServerEnvelope::direct_message(DirectMessage {
            id: 9,
            to: 2,
            from: 1,
            body: vec![0xde, 0xad],
            kind: 0,
        });

        let bytes = encode_server_envelope(&envelope).unwrap();
        let decoded = decode_server_envelope(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert!(decoded.response.is_none());
    }

    #[test]
    fn test_absent_fields_stay_absent() {
        let bytes =
            encode_client_envelope(&ClientEnvelope::bearer_token("token")).unwrap();
        let decoded = decode_client_envelope(&bytes).unwrap();
        assert!(decoded.request.is_none());
        assert!(decoded.subscribe.is_none());
        assert_eq!(decoded.bearer_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        assert!(decode_server_envelope(&[0xc1, 0xff, 0x00]).is_err());
        assert!(decode_server_envelope(b"not msgpack at all").is_err());
    }

    #[test]
    fn test_truncated_input_is_an_error() {
        let envelope = ServerEnvelope::response(Response {
            id: 3,
            ack: Some(Ack { id: 77 }),
            ..Default::default()
        });
        let bytes = encode_server_envelope(&envelope).unwrap();
        assert!(decode_server_envelope(&bytes[..bytes.len() / 2]).is_err());
    }
}
