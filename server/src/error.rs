//! Error taxonomy for the relay (§7 / §4.11).
//!
//! `CredentialsError` is fatal and startup-only: it surfaces once,
//! before any socket is accepted, and gets bubbled up through `main`
//! with `anyhow::Context`. `SessionError` covers the per-session
//! failure categories named in §7 — `session::agent`/`session::client`
//! construct the matching variant at each failure site instead of a
//! bare string, so callers match on `kind` rather than comparing
//! message text, and the `Display` impl is the one place each
//! category's wording lives.

use std::path::PathBuf;

/// Failure to load the credentials file at startup. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse credentials file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-session failure categories (§7). A handful carry a reason string
/// (the specific credential that failed, the malformed frame's parse
/// error, the agent's own rejection message); the rest name a fixed
/// condition. Where §7 calls for a peer-visible `error` frame, the
/// `Display` text below is exactly that frame's `message` field — call
/// sites send `err.to_string()` rather than re-deriving the wording.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown agent name, wrong agent secret, or an access-client
    /// secret outside the configured set.
    #[error("{0}")]
    AuthFailure(String),
    /// Another session is already registered under this agent name.
    #[error("duplicate agent registration")]
    DuplicateAgent,
    /// The access client asked for an agent that never registered.
    #[error("Agent not registered")]
    UnknownTarget,
    /// Malformed JSON, an unknown `kind`, or a non-`start` first frame.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The agent rejected `initiate_connection` (§7: in practice this
    /// is almost always an unsupported `protocol`, since that's the
    /// one check the agent itself enforces before answering).
    #[error("Initiating connection failed: {0}")]
    UnsupportedProtocol(String),
    /// A transport disconnect, or an explicit `connection_reset`, on
    /// the other side of a stream.
    #[error("Connection reset: {0}")]
    PeerGone(String),
    /// `tcp_data`/`connection_reset` named a `connection_id` with no
    /// live stream-table entry. Never fatal — logged and dropped.
    #[error("stray connection_id: {0}")]
    StrayIdentifier(String),
}
