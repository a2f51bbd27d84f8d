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

//! In-memory state for one `(documentId, branchId)` room: the latest
//! snapshot, the connected clients, and the broadcast channel that fans
//! canonical updates out to them.
//!
//! Room state (snapshot, version, client set) is owned by a single writer:
//! every mutation goes through `&mut self` behind the room table's entry
//! lock, and other tasks only ever enqueue onto the broadcast channel.

use chronicle_storage::Content;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub content: Content,
    pub doc: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerEnvelope {
    #[serde(rename = "connected")]
    Connected { client_id: String, at: String },
    #[serde(rename = "snapshot")]
    Snapshot {
        snapshot: RoomSnapshot,
        version: u64,
        at: String,
    },
    #[serde(rename = "document_update")]
    DocumentUpdate {
        actor: String,
        content: Content,
        doc: serde_json::Value,
        at: String,
    },
    #[serde(rename = "shutting_down")]
    ShuttingDown { at: String },
}

/// One active `(documentId, branchId)` broadcast session.
pub struct Room {
    pub document_id: String,
    pub branch_id: String,
    snapshot: parking_lot::RwLock<Option<RoomSnapshot>>,
    version: AtomicU64,
    sender: broadcast::Sender<ServerEnvelope>,
    client_count: AtomicU64,
}

impl Room {
    fn new(document_id: String, branch_id: String) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            document_id,
            branch_id,
            snapshot: parking_lot::RwLock::new(None),
            version: AtomicU64::new(0),
            sender,
            client_count: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEnvelope> {
        self.client_count.fetch_add(1, Ordering::SeqCst);
        self.sender.subscribe()
    }

    pub fn client_left(&self) -> u64 {
        self.client_count.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::SeqCst)
    }

    pub fn current_snapshot(&self) -> Option<(RoomSnapshot, u64)> {
        self.snapshot
            .read()
            .clone()
            .map(|snapshot| (snapshot, self.version.load(Ordering::SeqCst)))
    }

    /// Advances the room's version and publishes the new canonical state to
    /// every subscriber, including the sender. Called by the single writer
    /// processing one `doc_update` at a time for this room.
    pub fn publish_update(&self, actor: &str, content: Content, doc: serde_json::Value, at: String) {
        *self.snapshot.write() = Some(RoomSnapshot {
            content: content.clone(),
            doc: doc.clone(),
        });
        self.version.fetch_add(1, Ordering::SeqCst);

        // A broadcast channel with no active receivers returns an error;
        // that's expected right after the last client leaves and is not a
        // failure condition.
        let _ = self.sender.send(ServerEnvelope::DocumentUpdate {
            actor: actor.to_string(),
            content,
            doc,
            at,
        });
    }

    pub fn seed_snapshot(&self, content: Content, doc: serde_json::Value) {
        let mut guard = self.snapshot.write();
        if guard.is_none() {
            *guard = Some(RoomSnapshot { content, doc });
        }
    }

    /// Tells every connected client this room is going away. Each
    /// `handle_connection` task observes `ServerEnvelope::ShuttingDown` on
    /// its broadcast receiver and closes its socket with the going-away
    /// code in response; this does not by itself close any socket.
    pub fn broadcast_shutdown(&self, at: String) {
        let _ = self.sender.send(ServerEnvelope::ShuttingDown { at });
    }
}

fn room_key(document_id: &str, branch_id: &str) -> String {
    format!("{document_id}:{branch_id}")
}

/// Table of active rooms, keyed by `(documentId, branchId)`. Rooms are
/// created lazily and may be dropped once their last client disconnects;
/// losing a room never loses data since the Repo Store remains the
/// authoritative source.
pub struct RoomTable {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, document_id: &str, branch_id: &str) -> Arc<Room> {
        self.rooms
            .entry(room_key(document_id, branch_id))
            .or_insert_with(|| Arc::new(Room::new(document_id.to_string(), branch_id.to_string())))
            .clone()
    }

    /// Drops a room from the table if it has no clients left. Safe to call
    /// speculatively; a room that gained a new client between the
    /// disconnect and this call is left alone.
    pub fn drop_if_empty(&self, document_id: &str, branch_id: &str) {
        let key = room_key(document_id, branch_id);
        self.rooms.remove_if(&key, |_, room| room.client_count() == 0);
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Sends a going-away broadcast to every active room's clients, used on
    /// process shutdown. Each connected `handle_connection` task observes
    /// the envelope, sends its own 1001 close frame, and exits its read
    /// loop; this only enqueues the notification, it does not wait for
    /// sockets to actually close.
    pub fn shutdown(&self) {
        let at = chrono::Utc::now().to_rfc3339();
        for room in self.rooms.iter() {
            room.broadcast_shutdown(at.clone());
        }
        self.rooms.clear();
    }
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content() -> Content {
        Content {
            title: "t".into(),
            subtitle: "s".into(),
            purpose: "p".into(),
            tiers: "gold".into(),
            enforce: "strict".into(),
            doc: json!({}),
        }
    }

    #[test]
    fn get_or_create_is_stable_for_same_key() {
        let table = RoomTable::new();
        let a = table.get_or_create("doc-1", "main");
        let b = table.get_or_create("doc-1", "main");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_branches_are_different_rooms() {
        let table = RoomTable::new();
        let a = table.get_or_create("doc-1", "main");
        let b = table.get_or_create("doc-1", "proposal");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn reconnect_after_publish_sees_latest_snapshot() {
        let room = Room::new("doc-1".into(), "main".into());
        room.publish_update(
            "avery",
            content(),
            json!({"type": "doc"}),
            "2026-01-01T00:00:00Z".into(),
        );

        let (snapshot, version) = room.current_snapshot().unwrap();
        assert_eq!(version, 1);
        assert_eq!(snapshot.content.purpose, "p");
    }

    #[test]
    fn drop_if_empty_only_removes_rooms_with_no_clients() {
        let table = RoomTable::new();
        let room = table.get_or_create("doc-1", "main");
        let _rx = room.subscribe();
        table.drop_if_empty("doc-1", "main");
        assert_eq!(table.room_count(), 1);

        room.client_left();
        table.drop_if_empty("doc-1", "main");
        assert_eq!(table.room_count(), 0);
    }

    #[tokio::test]
    async fn table_shutdown_notifies_subscribers_before_clearing() {
        let table = RoomTable::new();
        let room = table.get_or_create("doc-1", "main");
        let mut events = room.subscribe();

        table.shutdown();

        let envelope = events.recv().await.unwrap();
        assert!(matches!(envelope, ServerEnvelope::ShuttingDown { .. }));
        assert_eq!(table.room_count(), 0);
    }
}
