//! # Access-Client Session
//!
//! Implements the state machine in §4.6: authenticate, resolve the
//! target agent, drive the three-way open handshake through the
//! coordinator, then pump payload frames until either side disconnects.

use axum::extract::ws::{Message, WebSocket};
use futures::StreamExt;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::coordinator::{InitiateReply, WaitOutcome};
use crate::error::SessionError;
use crate::outbound::{spawn_writer, Outbound};
use crate::state::AppState;
use crate::streams::{ClientTx, StreamEntry, StreamState};
use crate::timeouts::{OPEN_WAIT_TIMEOUT, START_TIMEOUT};
use relay_protocol::{
    ClientToRelayMessage, CtRInner, RelayToAgentMessage, RelayToClientMessage, RtAgentInner,
    RtClientInner,
};

/// Runs this session's teardown on drop rather than only at the end of
/// `run_access_client_session` (§4.8: finalizers fire on any exit path,
/// including a panic unwind). Created before the first suspension
/// point and held for the session's whole lifetime, so every `return`
/// — and every unwind — removes the stream entry (once one exists) and
/// closes the socket exactly once.
struct ClientSessionGuard {
    connection_id: Option<String>,
    tx: ClientTx,
    state: AppState,
}

impl Drop for ClientSessionGuard {
    fn drop(&mut self) {
        if let Some(id) = &self.connection_id {
            self.state.streams.remove(id);
        }
        let _ = self.tx.send(Outbound::Close);
    }
}

pub async fn run_access_client_session(socket: WebSocket, state: AppState) {
    let (sink, mut stream) = socket.split();
    let tx = spawn_writer::<RelayToClientMessage>(sink);
    let mut guard = ClientSessionGuard {
        connection_id: None,
        tx: tx.clone(),
        state: state.clone(),
    };

    let request = match await_start(&mut stream, &state, &tx).await {
        Some(request) => request,
        None => return,
    };

    let agent = match state.registry.lookup(&request.connection_target) {
        Some(agent) => agent,
        None => {
            let err = SessionError::UnknownTarget;
            warn!(
                target = %request.connection_target,
                %err,
                "access client requested an unregistered agent"
            );
            send_error(&tx, err.to_string());
            return;
        }
    };

    let connection_id = Uuid::new_v4().to_string();
    let entry = StreamEntry {
        agent_name: request.connection_target.clone(),
        agent_tx: agent.tx.clone(),
        client_tx: tx.clone(),
        state: StreamState::Opening,
    };
    if state.streams.create(connection_id.clone(), entry).is_err() {
        warn!(connection_id, "stream id collision, rejecting open");
        send_error(&tx, "Internal error".to_string());
        return;
    }
    guard.connection_id = Some(connection_id.clone());

    let _ = agent.tx.send(Outbound::Send(RelayToAgentMessage {
        inner: RtAgentInner::InitiateConnection {
            target_ip: request.target_ip.clone(),
            target_port: request.target_port,
            protocol: request.protocol.clone(),
            connection_id: connection_id.clone(),
        },
    }));
    info!(
        connection_id,
        target = %request.connection_target,
        ip = %request.target_ip,
        port = request.target_port,
        "initiating connection"
    );

    if !await_open(&connection_id, &state, &tx, &mut stream).await {
        return;
    }

    pump_data(&connection_id, &agent, &state, &mut stream).await;
}

/// The fields carried by an access client's `start` frame.
struct StartRequest {
    connection_target: String,
    target_ip: String,
    target_port: u16,
    protocol: String,
}

/// Waits for, validates, and authenticates the first frame. On any
/// failure this sends the peer-visible frame the table in §4.6 calls
/// for (or none, for a bare protocol violation) and returns `None`; the
/// socket close itself is left to the caller's `ClientSessionGuard`.
async fn await_start(
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
    state: &AppState,
    tx: &ClientTx,
) -> Option<StartRequest> {
    let frame = match tokio::time::timeout(START_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(_))) => {
            let err = SessionError::ProtocolViolation("non-text frame before start".to_string());
            warn!(%err);
            return None;
        }
        Ok(Some(Err(e))) => {
            let err = SessionError::PeerGone(e.to_string());
            warn!(%err, "transport error awaiting access client start");
            return None;
        }
        Ok(None) => {
            warn!("access client socket closed before start");
            return None;
        }
        Err(_) => {
            warn!("access client did not send start within the timeout");
            return None;
        }
    };

    let message: ClientToRelayMessage = match relay_protocol::decode(&frame) {
        Ok(m) => m,
        Err(e) => {
            let err = SessionError::ProtocolViolation(e.to_string());
            warn!(%err, "malformed start frame from access client");
            return None;
        }
    };

    let (connection_target, target_ip, target_port, protocol, secret) = match message.inner {
        CtRInner::Start {
            connection_target,
            target_ip,
            target_port,
            protocol,
            secret,
        } => (connection_target, target_ip, target_port, protocol, secret),
        other => {
            let err =
                SessionError::ProtocolViolation(format!("expected start, got {other:?}"));
            warn!(%err);
            return None;
        }
    };

    if !state.credentials.verify_client(&secret) {
        let err = SessionError::AuthFailure("Invalid access client secret".to_string());
        warn!(%err, "access client auth failed");
        send_error(tx, err.to_string());
        return None;
    }

    Some(StartRequest {
        connection_target,
        target_ip,
        target_port,
        protocol,
    })
}

/// Drives the STARTING state: waits for the agent's reply while also
/// watching the socket for any frame the client should not be allowed
/// to send yet. A client that sends anything before `start_ok` has
/// violated the protocol — the open handshake is not buffered for
/// later replay (§4.6, decided open question (a)) — so any such frame
/// ends the session immediately, racing the coordinator wait itself
/// rather than waiting for it to resolve first.
///
/// Returns `true` once the stream has moved to `Open` and `start_ok`
/// has been sent. The stream-table entry and socket close on any other
/// outcome are handled by the caller's `ClientSessionGuard`.
async fn await_open(
    connection_id: &str,
    state: &AppState,
    tx: &ClientTx,
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
) -> bool {
    let wait = state.coordinator.wait(connection_id, OPEN_WAIT_TIMEOUT);
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            frame = stream.next() => {
                let err = SessionError::ProtocolViolation(
                    "tcp_data received before start_ok".to_string(),
                );
                warn!(connection_id, ?frame, %err);
                return false;
            }
        }
    };

    match outcome {
        WaitOutcome::Reply(InitiateReply::Ok) => {
            state.streams.set_state(connection_id, StreamState::Open);
            let _ = tx.send(Outbound::Send(RelayToClientMessage {
                inner: RtClientInner::StartOk,
            }));
            info!(connection_id, "connection open");
            true
        }
        WaitOutcome::Reply(InitiateReply::Error(message)) => {
            let err = SessionError::UnsupportedProtocol(message);
            send_error(tx, err.to_string());
            false
        }
        WaitOutcome::TimedOut => {
            let err = SessionError::UnsupportedProtocol("timed out".to_string());
            send_error(tx, err.to_string());
            false
        }
    }
}

/// The OPEN state: every inbound frame is `tcp_data`, tagged with
/// `connection_id` and forwarded to the agent, until the stream table
/// entry disappears (the agent side went away) or the socket itself
/// closes. Teardown on exit is the caller's `ClientSessionGuard`'s job.
async fn pump_data(
    connection_id: &str,
    agent: &crate::registry::AgentHandle,
    state: &AppState,
    stream: &mut (impl futures::Stream<Item = Result<Message, axum::Error>> + Unpin),
) {
    loop {
        if state.streams.with(connection_id, |_| ()).is_none() {
            // The agent side tore this stream down already; its own
            // cleanup already queued our error + close.
            break;
        }
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let message: ClientToRelayMessage = match relay_protocol::decode(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        let err = SessionError::ProtocolViolation(e.to_string());
                        warn!(connection_id, %err, "malformed message from access client");
                        break;
                    }
                };
                match message.inner {
                    CtRInner::TcpData { data_base64 } => {
                        let _ = agent.tx.send(Outbound::Send(RelayToAgentMessage {
                            inner: RtAgentInner::TcpData {
                                connection_id: connection_id.to_string(),
                                data_base64,
                            },
                        }));
                        trace!(connection_id, "forwarded tcp_data to agent");
                    }
                    CtRInner::Start { .. } => {
                        debug!(connection_id, "ignoring redundant start while open");
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                let err = SessionError::PeerGone(e.to_string());
                warn!(connection_id, %err, "transport error on access client socket");
                break;
            }
        }
    }

    // Access-client disconnect. The design decides not to notify the
    // agent proactively here (§9, decided open question (b)) — the
    // agent will observe the loss on its own TCP path, which is outside
    // the relay's responsibility.
    info!(connection_id, "access client session ended");
}

fn send_error(tx: &ClientTx, message: String) {
    let _ = tx.send(Outbound::Send(RelayToClientMessage {
        inner: RtClientInner::Error { message },
    }));
}
