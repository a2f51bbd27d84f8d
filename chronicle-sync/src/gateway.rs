// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The `/ws` endpoint: authenticates, joins a room, replays the snapshot,
//! and bridges inbound `doc_update` messages and outbound broadcasts.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chronicle_storage::RepoStore;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::auth::{Identity, TokenValidator};
use crate::room::{Room, RoomTable, ServerEnvelope};

const PING_INTERVAL: Duration = Duration::from_secs(20);
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_POLICY_VIOLATION: u16 = 1008;
const CLOSE_INTERNAL_ERROR: u16 = 1011;
pub const CLOSE_GOING_AWAY: u16 = 1001;

type Sender = SplitSink<WebSocket, Message>;

pub struct GatewayState {
    pub repo: Arc<RepoStore>,
    pub rooms: Arc<RoomTable>,
    pub validator: Arc<dyn TokenValidator>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: String,
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "branchId")]
    pub branch_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    DocUpdate {
        content: chronicle_storage::Content,
        #[serde(default)]
        doc: serde_json::Value,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, params))
}

async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>, params: ConnectParams) {
    let identity = match state.validator.validate(&params.token).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "rejected sync connection: bad token");
            let (sender, _) = socket.split();
            close(sender, CLOSE_POLICY_VIOLATION, "auth-rejected").await;
            return;
        }
    };

    let room = state
        .rooms
        .get_or_create(&params.document_id, &params.branch_id);
    let mut events = room.subscribe();

    let (mut sender, mut receiver) = socket.split();
    let client_id = uuid::Uuid::new_v4().to_string();

    if send_json(
        &mut sender,
        &ServerEnvelope::Connected {
            client_id: client_id.clone(),
            at: now_rfc3339(),
        },
    )
    .await
    .is_err()
    {
        room.client_left();
        return;
    }

    let snapshot = match room.current_snapshot() {
        Some(existing) => existing,
        None => match state.repo.head(&params.document_id, &params.branch_id) {
            Ok((content, _)) => {
                let doc = content.doc.clone();
                room.seed_snapshot(content.clone(), doc.clone());
                (crate::room::RoomSnapshot { content, doc }, 0)
            }
            Err(err) => {
                warn!(error = %err, "failed to load head for snapshot");
                room.client_left();
                close(sender, CLOSE_INTERNAL_ERROR, "storage-error").await;
                return;
            }
        },
    };

    if send_json(
        &mut sender,
        &ServerEnvelope::Snapshot {
            snapshot: snapshot.0,
            version: snapshot.1,
            at: now_rfc3339(),
        },
    )
    .await
    .is_err()
    {
        room.client_left();
        return;
    }

    let mut ping_ticker = interval(PING_INTERVAL);
    let mut last_pong = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = ping_ticker.tick() => {
                if last_pong.elapsed() > PONG_TIMEOUT {
                    warn!(client = %client_id, "client unresponsive, closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    None | Some(Ok(Message::Close(_))) => {
                        info!(client = %client_id, "sync connection closed by client");
                        break;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sender.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = tokio::time::Instant::now();
                    }
                    Some(Ok(Message::Text(text))) => {
                        if !handle_inbound(&text, &identity, &room, &state, &params, &mut sender).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("ignoring binary frame on sync socket");
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "sync socket receive error");
                        break;
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(ServerEnvelope::ShuttingDown { .. }) => {
                        info!(client = %client_id, "room shutting down, closing connection");
                        close(sender, CLOSE_GOING_AWAY, "shutting-down").await;
                        room.client_left();
                        state.rooms.drop_if_empty(&params.document_id, &params.branch_id);
                        return;
                    }
                    Ok(envelope) => {
                        if send_json(&mut sender, &envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(client = %client_id, skipped, "sync client lagged behind room broadcasts");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    room.client_left();
    state.rooms.drop_if_empty(&params.document_id, &params.branch_id);
    close(sender, CLOSE_NORMAL, "bye").await;
}

/// Returns false when the connection should close (auth/protocol
/// violation or unrecoverable storage error).
async fn handle_inbound(
    text: &str,
    identity: &Identity,
    room: &Arc<Room>,
    state: &Arc<GatewayState>,
    params: &ConnectParams,
    sender: &mut Sender,
) -> bool {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "malformed sync message");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_POLICY_VIOLATION,
                    reason: "malformed-message".into(),
                })))
                .await;
            return false;
        }
    };

    let InboundMessage::DocUpdate { content, doc } = message;

    if !identity.writable {
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: CLOSE_POLICY_VIOLATION,
                reason: "read-only".into(),
            })))
            .await;
        return false;
    }

    let mut persisted_content = content;
    persisted_content.doc = doc.clone();

    match state.repo.commit(
        &params.document_id,
        &params.branch_id,
        persisted_content.clone(),
        &identity.user_name,
        "Sync update",
        false,
    ) {
        Ok(_) | Err(chronicle_storage::RepoError::NoChanges) => {
            room.publish_update(&identity.user_name, persisted_content, doc, now_rfc3339());
            true
        }
        Err(err) => {
            warn!(error = %err, "failed to persist doc_update");
            let _ = sender
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_INTERNAL_ERROR,
                    reason: "storage-error".into(),
                })))
                .await;
            false
        }
    }
}

async fn send_json(sender: &mut Sender, value: &ServerEnvelope) -> Result<(), ()> {
    let text = serde_json::to_string(value).map_err(|_| ())?;
    sender.send(Message::Text(text)).await.map_err(|_| ())
}

async fn close(mut sender: Sender, code: u16, reason: &str) {
    let _ = sender
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
