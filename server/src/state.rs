//! # Shared Relay State
//!
//! The small set of process-wide, concurrently-accessed structures
//! (§5, "shared-resource discipline"): the agent registry, the stream
//! table, and the open coordinator, plus the read-only credential
//! store. Everything else — per-connection sockets, per-stream
//! channels — lives inside a session and is never reachable from here.

use std::sync::Arc;

use crate::coordinator::OpenCoordinator;
use crate::credentials::Credentials;
use crate::registry::AgentRegistry;
use crate::streams::StreamTable;

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<Credentials>,
    pub registry: Arc<AgentRegistry>,
    pub streams: Arc<StreamTable>,
    pub coordinator: Arc<OpenCoordinator>,
}

impl AppState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Arc::new(credentials),
            registry: Arc::new(AgentRegistry::new()),
            streams: Arc::new(StreamTable::new()),
            coordinator: Arc::new(OpenCoordinator::new()),
        }
    }
}
