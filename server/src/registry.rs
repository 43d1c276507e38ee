//! # Agent Registry
//!
//! Process-wide map from agent name to the live agent session handle
//! (§4.3). Registration is serialized per name by `DashMap`'s sharded
//! locking: of two concurrent `register` calls for the same name,
//! exactly one sees `Accepted`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use relay_protocol::RelayToAgentMessage;
use tokio::sync::mpsc;

use crate::outbound::Outbound;

pub type AgentTx = mpsc::UnboundedSender<Outbound<RelayToAgentMessage>>;

#[derive(Clone)]
pub struct AgentHandle {
    pub tx: AgentTx,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Accepted,
    Duplicate,
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: DashMap<String, AgentHandle>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` under `name`.
    ///
    /// If a handle is already present, its slot is only reused when the
    /// stored sender is observably closed (no task is left to receive
    /// on it) — the fix for the "is this socket really dead" question
    /// called out in the design notes: ask the channel, not a cached
    /// boolean flag that can go stale.
    pub fn register(&self, name: String, handle: AgentHandle) -> RegisterOutcome {
        match self.agents.entry(name) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().tx.is_closed() {
                    occupied.insert(handle);
                    RegisterOutcome::Accepted
                } else {
                    RegisterOutcome::Duplicate
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(handle);
                RegisterOutcome::Accepted
            }
        }
    }

    /// Removes `name`'s registration, but only if it still points at
    /// `tx` — a session that lost a registration race must not evict
    /// the winner's slot on its own cleanup path.
    pub fn unregister(&self, name: &str, tx: &AgentTx) {
        if let Some(entry) = self.agents.get(name) {
            if !entry.tx.same_channel(tx) {
                return;
            }
        } else {
            return;
        }
        self.agents.remove(name);
    }

    pub fn lookup(&self, name: &str) -> Option<AgentHandle> {
        self.agents.get(name).map(|entry| entry.value().clone())
    }
}
