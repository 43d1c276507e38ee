//! Scenario 5 / I1 from §8: a second connection registering under a
//! name that is already live is closed immediately, and the first
//! connection keeps serving streams.

mod support;

use futures_util::StreamExt;
use relay_protocol::AtRInner;
use support::{connect, send_agent, TestRelay};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn second_registration_under_same_name_is_rejected() {
    let relay = TestRelay::start(
        r#"{"edge-agents": {"test_agent": "A"}, "access-client-secrets": ["C"]}"#,
    )
    .await;

    let mut first = connect(&relay.agent_url()).await;
    send_agent(
        &mut first,
        AtRInner::Start {
            name: "test_agent".to_string(),
            secret: "A".to_string(),
        },
    )
    .await;

    let mut second = connect(&relay.agent_url()).await;
    send_agent(
        &mut second,
        AtRInner::Start {
            name: "test_agent".to_string(),
            secret: "A".to_string(),
        },
    )
    .await;

    match second.next().await {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected duplicate agent's socket to close, got {other:?}"),
    }

    // The first connection is still alive: sending it a frame does not
    // error out the socket.
    send_agent(
        &mut first,
        AtRInner::InitiateConnectionOk {
            connection_id: "unused".to_string(),
        },
    )
    .await;
}
