//! # Connection-Open Coordinator
//!
//! The rendezvous an access-client session blocks on after sending
//! `initiate_connection`, waiting for the matching `initiate_connection_ok`
//! or `initiate_connection_error` from the agent (§4.7).
//!
//! This is keyed per connection id — a `DashMap<id, oneshot::Sender>` —
//! rather than a single process-wide FIFO queue. A global queue is the
//! bug called out in the design notes (§9): under two concurrent opens,
//! agent reply #1 can be handed to whichever session happens to `recv`
//! first, not the session that actually sent the matching
//! `initiate_connection`. Keying by id makes that impossible by
//! construction: `post` can only reach the waiter actually registered
//! under that id.

use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub enum InitiateReply {
    Ok,
    Error(String),
}

pub enum WaitOutcome {
    Reply(InitiateReply),
    TimedOut,
}

#[derive(Default)]
pub struct OpenCoordinator {
    waiters: DashMap<String, oneshot::Sender<InitiateReply>>,
}

impl OpenCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter for `id` and blocks until `post(id, _)` is
    /// called or `timeout` elapses. If another waiter is already
    /// registered for `id` it is replaced (the design invariant is
    /// one open per id at a time, so this should not happen in
    /// practice).
    pub async fn wait(&self, id: &str, timeout: Duration) -> WaitOutcome {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.to_string(), tx);
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => WaitOutcome::Reply(reply),
            // The sender was dropped without posting — the agent
            // session that would have answered tore down first. Treat
            // it the same as an explicit error reply (§4.6, "agent
            // vanishes before reply").
            Ok(Err(_)) => WaitOutcome::Reply(InitiateReply::Error(
                "agent disconnected before replying".to_string(),
            )),
            Err(_) => {
                self.waiters.remove(id);
                WaitOutcome::TimedOut
            }
        }
    }

    /// Delivers `reply` to the waiter registered for `id`, if any. A
    /// no-op when there is no waiter — the session that would have
    /// received it already terminated (§4.7).
    pub fn post(&self, id: &str, reply: InitiateReply) {
        if let Some((_, tx)) = self.waiters.remove(id) {
            let _ = tx.send(reply);
        }
    }
}
