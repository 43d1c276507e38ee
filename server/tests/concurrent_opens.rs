//! Scenario 4 / I6 from §8: two opens are in flight on the same agent
//! at once. The agent answers them out of request order (error for
//! the second request, ok for the first) to prove the relay routes
//! each reply back to the client that actually asked for it, not
//! whichever client happens to be first in some global queue.

mod support;

use std::collections::HashMap;

use relay_protocol::{AtRInner, CtRInner, RtAgentInner, RtClientInner};
use support::{connect, recv_as_agent, recv_as_client, send_agent, send_client, TestRelay};

#[tokio::test]
async fn replies_never_cross_wires_between_concurrent_opens() {
    let relay = TestRelay::start(
        r#"{"edge-agents": {"test_agent": "A"}, "access-client-secrets": ["C"]}"#,
    )
    .await;

    let mut agent = connect(&relay.agent_url()).await;
    send_agent(
        &mut agent,
        AtRInner::Start {
            name: "test_agent".to_string(),
            secret: "A".to_string(),
        },
    )
    .await;

    let mut client_a = connect(&relay.client_url()).await;
    send_client(
        &mut client_a,
        CtRInner::Start {
            connection_target: "test_agent".to_string(),
            target_ip: "127.0.0.1".to_string(),
            target_port: 2000,
            protocol: "tcp".to_string(),
            secret: "C".to_string(),
        },
    )
    .await;

    let mut client_b = connect(&relay.client_url()).await;
    send_client(
        &mut client_b,
        CtRInner::Start {
            connection_target: "test_agent".to_string(),
            target_ip: "127.0.0.1".to_string(),
            target_port: 3000,
            protocol: "tcp".to_string(),
            secret: "C".to_string(),
        },
    )
    .await;

    // Collect both initiate requests before replying to either, so the
    // two opens are genuinely concurrent from the relay's point of view.
    let mut id_by_port: HashMap<u16, String> = HashMap::new();
    for _ in 0..2 {
        match recv_as_agent(&mut agent).await {
            RtAgentInner::InitiateConnection {
                target_port,
                connection_id,
                ..
            } => {
                id_by_port.insert(target_port, connection_id);
            }
            other => panic!("expected initiate_connection, got {other:?}"),
        }
    }
    let id_a = id_by_port.get(&2000).cloned().unwrap();
    let id_b = id_by_port.get(&3000).cloned().unwrap();

    // Reply out of request order: b's failure first, then a's success.
    send_agent(
        &mut agent,
        AtRInner::InitiateConnectionError {
            connection_id: id_b,
            message: "connection refused".to_string(),
        },
    )
    .await;
    send_agent(
        &mut agent,
        AtRInner::InitiateConnectionOk {
            connection_id: id_a,
        },
    )
    .await;

    match recv_as_client(&mut client_a).await {
        RtClientInner::StartOk => {}
        other => panic!("client a: expected start_ok, got {other:?}"),
    }
    match recv_as_client(&mut client_b).await {
        RtClientInner::Error { message } => {
            assert!(message.contains("connection refused"));
        }
        other => panic!("client b: expected error, got {other:?}"),
    }
}
