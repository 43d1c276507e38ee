//! # Agent Session
//!
//! Implements the state machine in §4.5: authenticate, register, then
//! demultiplex inbound agent frames onto the correct stream for the
//! rest of the session's life.

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::coordinator::InitiateReply;
use crate::error::SessionError;
use crate::outbound::{spawn_writer, Outbound};
use crate::registry::{AgentHandle, AgentTx, RegisterOutcome};
use crate::state::AppState;
use crate::streams::StreamState;
use crate::timeouts::START_TIMEOUT;
use relay_protocol::{AgentToRelayMessage, AtRInner, RelayToClientMessage, RtClientInner};

/// Runs `cleanup` on drop, not just on the happy-path return of
/// `run_agent_session` (§4.8: finalizers must fire "regardless of exit
/// path (graceful close, transport error, panic)"). Rust drops locals
/// during an unwind the same as during a normal return, so constructing
/// this once registration succeeds is enough to guarantee the agent's
/// slot and every stream it owns are freed even if a later `.await` or
/// handler panics.
struct AgentSessionGuard {
    name: String,
    tx: AgentTx,
    state: AppState,
}

impl Drop for AgentSessionGuard {
    fn drop(&mut self) {
        cleanup(&self.name, &self.tx, &self.state);
    }
}

/// Runs one agent connection to completion. Returns once the socket is
/// closed, whether cleanly, on error, or because this session lost an
/// authentication or registration check — cleanup is guaranteed by
/// `AgentSessionGuard` regardless of how this function exits, so callers
/// never need to inspect the outcome.
pub async fn run_agent_session(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let tx = spawn_writer::<relay_protocol::RelayToAgentMessage>(sink);

    let name = match await_start(&mut stream, &state).await {
        Some(name) => name,
        None => {
            let _ = tx.send(Outbound::Close);
            return;
        }
    };

    match state.registry.register(name.clone(), AgentHandle { tx: tx.clone() }) {
        RegisterOutcome::Duplicate => {
            let err = SessionError::DuplicateAgent;
            warn!(agent = %name, %err, "duplicate agent registration rejected");
            let _ = tx.send(Outbound::Close);
            return;
        }
        RegisterOutcome::Accepted => {
            info!(agent = %name, "agent registered");
        }
    }

    let _guard = AgentSessionGuard {
        name: name.clone(),
        tx: tx.clone(),
        state: state.clone(),
    };

    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                if !handle_frame(&name, &text, &state).await {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {} // binary/ping/pong frames carry no protocol meaning here
            Some(Err(e)) => {
                let err = SessionError::PeerGone(e.to_string());
                warn!(agent = %name, %err, "transport error on agent socket");
                break;
            }
        }
    }
}

/// Waits for the first frame and validates it as a `start` message with
/// correct credentials. Returns the agent's name on success; on any
/// failure (timeout, parse error, wrong variant, bad credentials) logs
/// the reason and returns `None` — the caller closes the socket with no
/// reply, matching the `AuthFailure`/`ProtocolViolation` policy of a
/// silent close on the agent side (§7).
async fn await_start(
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
    state: &AppState,
) -> Option<String> {
    let frame = match tokio::time::timeout(START_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => {
            let err = SessionError::ProtocolViolation("non-text frame before start".to_string());
            warn!(%err);
            return None;
        }
        Ok(Some(Err(e))) => {
            let err = SessionError::PeerGone(e.to_string());
            warn!(%err, "transport error awaiting agent start");
            return None;
        }
        Ok(None) => {
            warn!("agent socket closed before start");
            return None;
        }
        Err(_) => {
            warn!("agent did not send start within the timeout");
            return None;
        }
    };

    let message: AgentToRelayMessage = match relay_protocol::decode(&frame) {
        Ok(m) => m,
        Err(e) => {
            let err = SessionError::ProtocolViolation(e.to_string());
            warn!(%err, "malformed start frame from agent");
            return None;
        }
    };

    let (name, secret) = match message.inner {
        AtRInner::Start { name, secret } => (name, secret),
        other => {
            let err =
                SessionError::ProtocolViolation(format!("expected start, got {other:?}"));
            warn!(%err);
            return None;
        }
    };

    if !state.credentials.verify_agent(&name, &secret) {
        let err = SessionError::AuthFailure("unknown agent name or wrong secret".to_string());
        warn!(agent = %name, %err);
        return None;
    }

    Some(name)
}

/// Handles one post-registration frame. Returns `false` when the
/// session should terminate (malformed JSON — a protocol violation).
async fn handle_frame(name: &str, text: &str, state: &AppState) -> bool {
    let message: AgentToRelayMessage = match relay_protocol::decode(text) {
        Ok(m) => m,
        Err(e) => {
            let err = SessionError::ProtocolViolation(e.to_string());
            warn!(agent = %name, %err, "malformed message from agent");
            return false;
        }
    };

    match message.inner {
        AtRInner::Start { .. } => {
            debug!(agent = %name, "ignoring redundant start after registration");
        }
        AtRInner::InitiateConnectionOk { connection_id } => {
            state
                .coordinator
                .post(&connection_id, InitiateReply::Ok);
        }
        AtRInner::InitiateConnectionError {
            connection_id,
            message,
        } => {
            state
                .coordinator
                .post(&connection_id, InitiateReply::Error(message));
        }
        AtRInner::TcpData {
            connection_id,
            data_base64,
        } => {
            let delivered = state.streams.with(&connection_id, move |entry| {
                let _ = entry.client_tx.send(Outbound::Send(RelayToClientMessage {
                    inner: RtClientInner::TcpData { data_base64 },
                }));
            });
            match delivered {
                Some(()) => {
                    trace!(agent = %name, connection_id, "forwarded tcp_data to access client");
                }
                None => {
                    let err = SessionError::StrayIdentifier(connection_id.clone());
                    debug!(agent = %name, %err, "tcp_data for unknown connection_id");
                }
            }
        }
        AtRInner::ConnectionReset {
            connection_id,
            message,
        } => match state.streams.remove(&connection_id) {
            Some(entry) => {
                let err = SessionError::PeerGone(message);
                let _ = entry.client_tx.send(Outbound::Send(RelayToClientMessage {
                    inner: RtClientInner::Error {
                        message: err.to_string(),
                    },
                }));
                let _ = entry.client_tx.send(Outbound::Close);
            }
            None => {
                let err = SessionError::StrayIdentifier(connection_id.clone());
                debug!(agent = %name, %err, "connection_reset for unknown connection_id");
            }
        },
    }
    true
}

/// Unregisters the agent and tears down every stream it was party to.
/// A stream still `Opening` has no client-visible state yet — the
/// client session is parked in the open coordinator, so waking it with
/// a synthetic error is enough. A stream that reached `Open` has a
/// client actively reading frames, so it gets an explicit `error` and
/// close (§4.5, "stream_table.remove_all_for(self)"). Runs exactly once
/// per session, from `AgentSessionGuard::drop`.
fn cleanup(name: &str, tx: &AgentTx, state: &AppState) {
    state.registry.unregister(name, tx);
    let removed = state.streams.remove_all_for_agent(name);
    for (id, entry) in removed {
        match entry.state {
            StreamState::Opening => {
                // Composed into "Initiating connection failed: {0}" by
                // the waiting access-client session (§4.6) — left as a
                // bare reason rather than `SessionError::PeerGone`'s own
                // "Connection reset: " prefix, which would double up.
                state
                    .coordinator
                    .post(&id, InitiateReply::Error("agent disconnected".to_string()));
            }
            StreamState::Open => {
                let err = SessionError::PeerGone("agent disconnected".to_string());
                let _ = entry.client_tx.send(Outbound::Send(RelayToClientMessage {
                    inner: RtClientInner::Error {
                        message: err.to_string(),
                    },
                }));
                let _ = entry.client_tx.send(Outbound::Close);
            }
        }
    }
    let _ = tx.send(Outbound::Close);
    info!(agent = %name, "agent session ended");
}
