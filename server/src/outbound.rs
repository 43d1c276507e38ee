//! # Per-Socket Outbound Writer
//!
//! Every WebSocket is owned by exactly one task that calls `.send()` on
//! it. Several logical contexts need to push frames to the same socket
//! — an agent session forwarding `tcp_data`, the open coordinator
//! pushing `start_ok` once an agent replies — so each session funnels
//! its outbound traffic through a channel into one writer task, rather
//! than locking the sink (§5, "shared-resource discipline").
//!
//! The writer also owns keepalive pings: an idle tunnel should not be
//! silently dropped by an intermediate proxy.

use std::time::Duration;

use axum::extract::ws::Message;
use futures::stream::SplitSink;
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

type WsSink = SplitSink<axum::extract::ws::WebSocket, Message>;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// A command sent to a socket's writer task.
pub enum Outbound<T> {
    /// Serialize `T` as JSON and send it as a text frame.
    Send(T),
    /// Close the socket. Any `Send` commands queued before this one
    /// are still delivered first, since the channel preserves order.
    Close,
}

/// Spawns the writer task for one WebSocket and returns a sender other
/// tasks can use to queue frames (or a close) on it.
pub fn spawn_writer<T>(mut sink: WsSink) -> mpsc::UnboundedSender<Outbound<T>>
where
    T: Serialize + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound<T>>();
    tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(Outbound::Send(msg)) => {
                            let text = relay_protocol::encode(&msg);
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Close) => {
                            let _ = sink.close().await;
                            break;
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    }
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    debug!("sent keepalive ping");
                }
            }
        }
    });
    tx
}
