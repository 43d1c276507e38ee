//! # Wire Protocol Messages
//!
//! Defines every message exchanged between the relay and its two peer
//! roles — edge agents and access clients — over WebSocket text frames.
//!
//! Every frame on the wire is a single JSON object with one field,
//! `inner`, which is itself a tagged object whose `kind` field selects
//! one of a fixed set of variants for that direction. For example, an
//! edge agent registering with the relay sends:
//!
//! ```json
//! {"inner": {"kind": "start", "name": "edge-1", "secret": "s3cr3t"}}
//! ```
//!
//! There are four independent message families — one per direction —
//! because the agent and the access client see different vocabularies.
//! Mixing them into one enum would let an access client claim to be
//! sending an agent-only variant; keeping them separate makes that a
//! compile error instead of a runtime check.

use serde::{Deserialize, Serialize};

/// A message sent by an edge agent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentToRelayMessage {
    pub inner: AtRInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtRInner {
    /// First frame on the connection: authenticate and register as `name`.
    Start { name: String, secret: String },
    /// The agent successfully opened `connection_id` to the requested target.
    InitiateConnectionOk { connection_id: String },
    /// The agent failed to open `connection_id`; `message` explains why.
    InitiateConnectionError {
        connection_id: String,
        message: String,
    },
    /// Opaque bytes read from the target, to be forwarded to the access client.
    TcpData {
        connection_id: String,
        data_base64: String,
    },
    /// The target connection for `connection_id` was reset or closed.
    ConnectionReset {
        connection_id: String,
        message: String,
    },
}

/// A message sent by the relay to an edge agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayToAgentMessage {
    pub inner: RtAgentInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RtAgentInner {
    /// Asks the agent to open `protocol://target_ip:target_port` and tag
    /// the resulting stream with `connection_id`.
    InitiateConnection {
        target_ip: String,
        target_port: u16,
        protocol: String,
        connection_id: String,
    },
    /// Opaque bytes from the access client, to be written to the target.
    TcpData {
        connection_id: String,
        data_base64: String,
    },
}

/// A message sent by an access client to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientToRelayMessage {
    pub inner: CtRInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CtRInner {
    /// First frame on the connection: authenticate and request a tunnel
    /// to `connection_target` at `target_ip:target_port`.
    Start {
        connection_target: String,
        target_ip: String,
        target_port: u16,
        protocol: String,
        secret: String,
    },
    /// Opaque bytes to forward to the target through the bound stream.
    /// Carries no identifier: an access-client session binds to exactly
    /// one stream for its lifetime.
    TcpData { data_base64: String },
}

/// A message sent by the relay to an access client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayToClientMessage {
    pub inner: RtClientInner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RtClientInner {
    /// The requested tunnel is open; the client may start streaming.
    StartOk,
    /// A human-readable failure, always followed by the socket closing.
    Error { message: String },
    /// Opaque bytes read from the target, to be forwarded to the client.
    TcpData { data_base64: String },
}

/// Failure to parse an inbound text frame into the expected message type.
///
/// Returned when the frame is not valid JSON, when it has no `kind` tag
/// under `inner`, or when `kind` does not name a known variant for this
/// direction. Callers treat this as a protocol violation and terminate
/// the session; the codec never guesses at a "closest" variant.
#[derive(Debug, thiserror::Error)]
#[error("malformed message: {0}")]
pub struct MalformedMessage(#[from] serde_json::Error);

/// Decodes a single inbound WebSocket text frame.
pub fn decode<'a, T: Deserialize<'a>>(text: &'a str) -> Result<T, MalformedMessage> {
    serde_json::from_str(text).map_err(MalformedMessage)
}

/// Encodes a single outbound message as a WebSocket text frame.
///
/// Serialization of these types cannot fail (no maps with non-string
/// keys, no floats that could be NaN), so this panics rather than
/// threading an error through every send site for a condition that
/// indicates a bug in this crate, not bad input.
pub fn encode<T: Serialize>(message: &T) -> String {
    serde_json::to_string(message).expect("protocol messages are always serializable")
}
