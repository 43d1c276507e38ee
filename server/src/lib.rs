//! # Reverse-Tunnel Relay
//!
//! A WebSocket-based relay that multiplexes many independent TCP
//! streams between edge agents (machines behind NAT exposing a
//! service) and access clients (operators requesting a tunneled byte
//! stream to that service).
//!
//! ## Architecture
//!
//! ```text
//! Access Client ──WS──► Relay ──WS──► Edge Agent ──TCP──► Target Service
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]-level types live in the sibling `relay-protocol` crate.
//! - [`credentials`] — the read-only agent/client credential store
//! - [`registry`]    — the agent name → session registry
//! - [`streams`]     — the connection id → stream table
//! - [`coordinator`] — the per-id open-connection rendezvous
//! - [`session`]     — the agent and access-client state machines
//! - [`handlers`]    — the two WebSocket upgrade endpoints
//! - [`outbound`]    — the per-socket writer task shared by both session kinds
//! - [`state`]       — [`state::AppState`], the shared process-wide state
//! - [`error`]       — the typed error taxonomy
//! - [`cli`]         — command-line argument parsing

pub mod cli;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod registry;
pub mod session;
pub mod state;
pub mod streams;
pub mod timeouts;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use state::AppState;

/// Builds the relay's axum router: the two WebSocket upgrade routes of
/// §6.2, and nothing else. A permissive CORS layer is middleware, not
/// a route, so it does not widen the HTTP surface the spec bounds.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws_for_edge_agents", get(handlers::ws_for_edge_agents))
        .route(
            "/ws_for_access_clients",
            get(handlers::ws_for_access_clients),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
