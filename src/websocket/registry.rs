//! Room membership for live editing sessions.
//!
//! A room is one report section. The registry only knows who is connected
//! where; it has no idea what the payloads mean.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::models::ControlMessage;
use crate::websocket::connection::Connection;

/// Identifies one editable unit: a section of a report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub report_id: String,
    pub section: String,
}

impl RoomKey {
    pub fn new(report_id: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            report_id: report_id.into(),
            section: section.into(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.report_id, self.section)
    }
}

type Members = HashMap<Uuid, Arc<dyn Connection>>;

pub struct ConnectionRegistry {
    rooms: Mutex<HashMap<RoomKey, Members>>,
    write_timeout: Duration,
}

impl ConnectionRegistry {
    /// `write_timeout` bounds how long one slow peer can stall a fan-out.
    pub fn new(write_timeout: Duration) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            write_timeout,
        }
    }

    pub async fn open_connection(&self, room: &RoomKey, conn: Arc<dyn Connection>) {
        let mut rooms = self.rooms.lock().await;
        let members = rooms.entry(room.clone()).or_default();
        members.insert(conn.id(), conn);
        info!("WebSocket opened for room {} ({} connected)", room, members.len());
    }

    pub async fn close_connection(&self, room: &RoomKey, conn_id: Uuid) {
        let mut rooms = self.rooms.lock().await;
        Self::remove_member(&mut rooms, room, conn_id);
    }

    pub async fn count(&self, room: &RoomKey) -> usize {
        self.rooms.lock().await.get(room).map_or(0, |members| members.len())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.rooms.lock().await.values().map(|members| members.len()).sum()
    }

    /// Send `payload` to every member of `room` except `excluded`.
    ///
    /// The lock is held for the whole fan-out. A member whose write fails is
    /// dropped from the room and closed after the lock is released; the others
    /// still get the payload. Returns the number of members that received it.
    pub async fn broadcast_except<T: Serialize>(
        &self,
        room: &RoomKey,
        payload: &T,
        excluded: Uuid,
    ) -> Result<usize, serde_json::Error> {
        let text = serde_json::to_string(payload)?;

        let mut rooms = self.rooms.lock().await;
        let targets: Vec<Arc<dyn Connection>> = match rooms.get(room) {
            Some(members) => members
                .values()
                .filter(|conn| conn.id() != excluded)
                .cloned()
                .collect(),
            None => return Ok(0),
        };

        let mut delivered = 0;
        let mut evicted = Vec::new();
        for conn in targets {
            match self.write(conn.as_ref(), text.clone()).await {
                Ok(()) => {
                    debug!("Sent to {} in room {}", conn.id(), room);
                    delivered += 1;
                }
                Err(e) => {
                    error!("Error sending message to {} in room {}: {}", conn.id(), room, e);
                    Self::remove_member(&mut rooms, room, conn.id());
                    evicted.push(conn);
                }
            }
        }
        drop(rooms);

        self.close_evicted(evicted);
        Ok(delivered)
    }

    /// Ask one other member of the room to republish what it has in memory.
    ///
    /// Peers are tried in map iteration order; a peer that cannot be written
    /// to is evicted and the next one is tried. Returns the peer that got the
    /// request, or `None` if nobody else is connected.
    pub async fn request_contents_from_peer(&self, room: &RoomKey, excluded: Uuid) -> Option<Uuid> {
        let text = match serde_json::to_string(&ControlMessage::RequestContents) {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode content request: {}", e);
                return None;
            }
        };

        let mut rooms = self.rooms.lock().await;
        let candidates: Vec<Arc<dyn Connection>> = rooms
            .get(room)?
            .values()
            .filter(|conn| conn.id() != excluded)
            .cloned()
            .collect();

        let mut chosen = None;
        let mut evicted = Vec::new();
        for peer in candidates {
            match self.write(peer.as_ref(), text.clone()).await {
                Ok(()) => {
                    info!("Requested section contents from {} for room {}", peer.id(), room);
                    chosen = Some(peer.id());
                    break;
                }
                Err(e) => {
                    error!("Error requesting section contents from {} in room {}: {}", peer.id(), room, e);
                    Self::remove_member(&mut rooms, room, peer.id());
                    evicted.push(peer);
                }
            }
        }
        drop(rooms);

        self.close_evicted(evicted);
        if chosen.is_none() {
            warn!("No live peer could serve contents for room {}", room);
        }
        chosen
    }

    /// Close connections already removed from their room, off the caller's path.
    ///
    /// A peer that stopped reading can hang in close just as it did in send,
    /// so each close gets the write timeout too.
    fn close_evicted(&self, evicted: Vec<Arc<dyn Connection>>) {
        for conn in evicted {
            let limit = self.write_timeout;
            tokio::spawn(async move {
                if tokio::time::timeout(limit, conn.close()).await.is_err() {
                    warn!("Gave up closing {} after {:?}", conn.id(), limit);
                }
            });
        }
    }

    async fn write(&self, conn: &dyn Connection, text: String) -> Result<(), ConnectionError> {
        match tokio::time::timeout(self.write_timeout, conn.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout(self.write_timeout)),
        }
    }

    fn remove_member(rooms: &mut HashMap<RoomKey, Members>, room: &RoomKey, conn_id: Uuid) {
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        if members.remove(&conn_id).is_some() {
            info!("WebSocket closed for room {} ({} remaining)", room, members.len());
        }
        if members.is_empty() {
            rooms.remove(room);
        }
    }
}
