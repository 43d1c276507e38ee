//! Shared harness for the integration tests: boots a real relay on an
//! OS-assigned port and connects to it over real WebSocket sockets, the
//! same way an edge agent or access client would.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use relay_protocol::{
    AgentToRelayMessage, AtRInner, ClientToRelayMessage, CtRInner, RelayToAgentMessage,
    RelayToClientMessage, RtAgentInner, RtClientInner,
};
use relay_server::credentials::Credentials;
use relay_server::state::AppState;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub struct TestRelay {
    pub base_url: String,
    _server: JoinHandle<()>,
}

impl TestRelay {
    pub async fn start(credentials_json: &str) -> Self {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(credentials_json.as_bytes()).unwrap();

        let credentials = Credentials::load(file.path()).unwrap();
        let state = AppState::new(credentials);
        let app = relay_server::build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("ws://{addr}"),
            _server: server,
        }
    }

    pub fn agent_url(&self) -> String {
        format!("{}/ws_for_edge_agents", self.base_url)
    }

    pub fn client_url(&self) -> String {
        format!("{}/ws_for_access_clients", self.base_url)
    }
}

pub type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub async fn connect(url: &str) -> Socket {
    let (socket, _) = connect_async(url).await.expect("failed to connect");
    socket
}

pub async fn send_agent(socket: &mut Socket, inner: AtRInner) {
    let text = relay_protocol::encode(&AgentToRelayMessage { inner });
    socket.send(WsMessage::Text(text.into())).await.unwrap();
}

pub async fn send_client(socket: &mut Socket, inner: CtRInner) {
    let text = relay_protocol::encode(&ClientToRelayMessage { inner });
    socket.send(WsMessage::Text(text.into())).await.unwrap();
}

pub async fn recv_as_agent(socket: &mut Socket) -> RtAgentInner {
    loop {
        match socket.next().await.expect("socket closed unexpectedly") {
            Ok(WsMessage::Text(text)) => {
                let message: RelayToAgentMessage =
                    relay_protocol::decode(&text).expect("malformed relay->agent frame");
                return message.inner;
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub async fn recv_as_client(socket: &mut Socket) -> RtClientInner {
    loop {
        match socket.next().await.expect("socket closed unexpectedly") {
            Ok(WsMessage::Text(text)) => {
                let message: RelayToClientMessage =
                    relay_protocol::decode(&text).expect("malformed relay->client frame");
                return message.inner;
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

pub fn b64(data: &str) -> String {
    STANDARD.encode(data.as_bytes())
}

pub fn un_b64(data: &str) -> String {
    String::from_utf8(STANDARD.decode(data).unwrap()).unwrap()
}

pub fn b64_bytes(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn un_b64_bytes(data: &str) -> Vec<u8> {
    STANDARD.decode(data).unwrap()
}
