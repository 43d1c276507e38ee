//! Decided open question (a) in §9: an access client that sends
//! `tcp_data` before `start_ok` has violated the protocol. The relay
//! does not buffer it for later replay — the session is torn down
//! immediately instead.

mod support;

use futures_util::StreamExt;
use relay_protocol::{AtRInner, CtRInner};
use support::{b64, connect, recv_as_agent, send_agent, send_client, TestRelay};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn tcp_data_before_start_ok_terminates_the_session() {
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

    let mut client = connect(&relay.client_url()).await;
    send_client(
        &mut client,
        CtRInner::Start {
            connection_target: "test_agent".to_string(),
            target_ip: "127.0.0.1".to_string(),
            target_port: 2222,
            protocol: "tcp".to_string(),
            secret: "C".to_string(),
        },
    )
    .await;

    // The relay is now waiting on the agent's initiate_connection_ok;
    // jump the gun and send data before it ever arrives.
    send_client(
        &mut client,
        CtRInner::TcpData {
            data_base64: b64("too early"),
        },
    )
    .await;

    // The agent never even got to answer — the relay already tore the
    // client session down on the protocol violation.
    let _ = recv_as_agent(&mut agent).await;

    match client.next().await {
        Some(Ok(Message::Close(_))) | None => {}
        other => panic!("expected socket to close, got {other:?}"),
    }
}
