//! `WebSocket` handler for the dispatcher event stream.
//!
//! Every connection starts with a `SNAPSHOT` frame taken at the same
//! sequence point the session's subscription starts from, followed by
//! every event with a higher `seq`, in order. A session that falls more
//! than the channel capacity behind is not disconnected: it is
//! resubscribed and sent a fresh snapshot, which supersedes whatever it
//! missed. Clients can ask for the same at any time with
//! `{"type": "RESYNC"}`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use dispatch_events::EventEnvelope;
use dispatch_types::Snapshot;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::extract::DispatcherId;
use crate::state::AppState;

/// Wire frame carrying a full snapshot.
#[derive(Debug, Serialize)]
struct SnapshotFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a Snapshot,
    timestamp: DateTime<Utc>,
    seq: u64,
}

/// A message sent by the client.
#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
}

/// Why a session ended.
#[derive(Debug)]
enum Disconnect {
    Client,
    SendFailed,
    BusClosed,
}

/// Upgrade an HTTP request to a dispatcher session.
///
/// # Route
///
/// `GET /ws/dispatch`
pub async fn ws_dispatch(
    ws: WebSocketUpgrade,
    dispatcher: DispatcherId,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state, dispatcher))
}

async fn handle_session(mut socket: WebSocket, state: Arc<AppState>, dispatcher: DispatcherId) {
    let session = state.sessions.register(dispatcher.clone());
    info!(session = session.id(), %dispatcher, "dispatcher connected");

    let reason = run_session(&mut socket, &state).await;
    info!(session = session.id(), %dispatcher, ?reason, "dispatcher disconnected");
}

async fn run_session(socket: &mut WebSocket, state: &AppState) -> Disconnect {
    let mut rx = match resync(socket, state).await {
        Ok(rx) => rx,
        Err(reason) => return reason,
    };

    let mut ping = interval(state.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if let Err(reason) = send_event(socket, &envelope).await {
                            return reason;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dispatcher session lagged, resending snapshot");
                        match resync(socket, state).await {
                            Ok(fresh) => rx = fresh,
                            Err(reason) => return reason,
                        }
                    }
                    Err(RecvError::Closed) => return Disconnect::BusClosed,
                }
            }
            _ = ping.tick() => {
                if let Err(e) = socket.send(Message::Ping(Bytes::new())).await {
                    return send_failed(&e);
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return Disconnect::Client,
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            return send_failed(&e);
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if is_resync(text.as_str()) {
                            debug!("client requested resync");
                            match resync(socket, state).await {
                                Ok(fresh) => rx = fresh,
                                Err(reason) => return reason,
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return Disconnect::Client;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn is_resync(text: &str) -> bool {
    serde_json::from_str::<ClientMessage>(text).is_ok_and(|message| message.kind == "RESYNC")
}

/// Subscribe afresh and send the matching snapshot.
async fn resync(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<broadcast::Receiver<Arc<EventEnvelope>>, Disconnect> {
    let (rx, snapshot) = state.store().subscribe_with_snapshot().await;
    let frame = SnapshotFrame {
        kind: "SNAPSHOT",
        data: &snapshot,
        timestamp: snapshot.taken_at,
        seq: snapshot.seq,
    };
    send_json(socket, &frame).await?;
    debug!(seq = snapshot.seq, "snapshot sent");
    Ok(rx)
}

async fn send_event(socket: &mut WebSocket, envelope: &EventEnvelope) -> Result<(), Disconnect> {
    send_json(socket, envelope).await
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), Disconnect> {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize frame: {e}");
            return Ok(());
        }
    };
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| send_failed(&e))
}

fn send_failed(error: &axum::Error) -> Disconnect {
    debug!(%error, "WebSocket send failed");
    Disconnect::SendFailed
}
