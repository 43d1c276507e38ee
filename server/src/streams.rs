//! # Stream Table
//!
//! Process-wide map from a relay-minted connection id to the pair of
//! outbound channels participating in that stream, plus its lifecycle
//! state (§3, §4.4). The table holds channel senders, not session
//! objects — membership here never keeps a session's task alive
//! (§3, "ownership").

use dashmap::DashMap;
use relay_protocol::{RelayToAgentMessage, RelayToClientMessage};
use tokio::sync::mpsc;

use crate::outbound::Outbound;

pub type AgentTx = mpsc::UnboundedSender<Outbound<RelayToAgentMessage>>;
pub type ClientTx = mpsc::UnboundedSender<Outbound<RelayToClientMessage>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Opening,
    Open,
}

pub struct StreamEntry {
    pub agent_name: String,
    pub agent_tx: AgentTx,
    pub client_tx: ClientTx,
    pub state: StreamState,
}

/// Returned by `create` when an identifier is already in use. In
/// practice minted identifiers are UUIDs and this never fires; it
/// exists because the design treats uniqueness as an invariant to
/// enforce, not an assumption to trust (§4.4).
#[derive(Debug)]
pub struct DuplicateStreamId;

#[derive(Default)]
pub struct StreamTable {
    streams: DashMap<String, StreamEntry>,
}

impl StreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, id: String, entry: StreamEntry) -> Result<(), DuplicateStreamId> {
        match self.streams.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DuplicateStreamId),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(())
            }
        }
    }

    /// Runs `f` with the entry for `id`, if present, without cloning
    /// the channel handles out of the table.
    pub fn with<R>(&self, id: &str, f: impl FnOnce(&StreamEntry) -> R) -> Option<R> {
        self.streams.get(id).map(|entry| f(entry.value()))
    }

    pub fn set_state(&self, id: &str, state: StreamState) {
        if let Some(mut entry) = self.streams.get_mut(id) {
            entry.state = state;
        }
    }

    pub fn remove(&self, id: &str) -> Option<StreamEntry> {
        self.streams.remove(id).map(|(_, entry)| entry)
    }

    /// Removes every stream whose agent side is `agent_name`, returning
    /// the removed entries so the caller can notify their client sides.
    /// This is the agent-session specialization of `remove_all_for`
    /// (§4.4): an access-client session owns at most one stream and can
    /// just call `remove` with the id it already holds, but an agent
    /// session may be the agent side of arbitrarily many streams, so
    /// removing "all streams for this session" means a scan here.
    pub fn remove_all_for_agent(&self, agent_name: &str) -> Vec<(String, StreamEntry)> {
        let ids: Vec<String> = self
            .streams
            .iter()
            .filter(|entry| entry.value().agent_name == agent_name)
            .map(|entry| entry.key().clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| self.streams.remove(&id).map(|(_, entry)| (id, entry)))
            .collect()
    }
}
