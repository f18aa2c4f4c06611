use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::db::ReportRepository;
use crate::models::ReceivedMessage;
use crate::services::activity_log::ActivityLogBuffer;
use crate::websocket::connection::Connection;
use crate::websocket::msg_close_handler::handle_close_message;
use crate::websocket::msg_delta_handler::handle_delta_message;
use crate::websocket::msg_join_handler::handle_join_message;
use crate::websocket::msg_sync_handler::{handle_sync_message, handle_update_repo_message};
use crate::websocket::registry::{ConnectionRegistry, RoomKey};

/// What the socket loop should do after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// One connection's view of its room, shared by all message handlers.
pub struct RoomSession {
    pub room: RoomKey,
    pub conn: Arc<dyn Connection>,
    /// Name that activity entries are attributed to.
    pub user: String,
    pub registry: Arc<ConnectionRegistry>,
    pub repo: Arc<dyn ReportRepository>,
    pub activity: ActivityLogBuffer,
}

impl RoomSession {
    /// Register `conn` in `room` and return the session that drives it.
    pub async fn open(
        room: RoomKey,
        conn: Arc<dyn Connection>,
        user: String,
        registry: Arc<ConnectionRegistry>,
        repo: Arc<dyn ReportRepository>,
        activity: ActivityLogBuffer,
    ) -> Self {
        registry.open_connection(&room, conn.clone()).await;
        info!("User {} connected to room {} as {}", user, room, conn.id());
        Self {
            room,
            conn,
            user,
            registry,
            repo,
            activity,
        }
    }

    /// Handle one inbound text frame. Errors are logged, never returned.
    pub async fn dispatch(&self, text: &str) -> Flow {
        let msg: ReceivedMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to parse message for room {}: {}", self.room, e);
                return Flow::Continue;
            }
        };
        debug!("Received {} message in room {} from {}", msg.kind(), self.room, self.conn.id());

        match msg {
            ReceivedMessage::Join(join_msg) => handle_join_message(self, &join_msg).await,
            ReceivedMessage::Sync(sync_msg) => handle_sync_message(self, &sync_msg).await,
            ReceivedMessage::UpdateRepo(update_msg) => handle_update_repo_message(self, &update_msg).await,
            ReceivedMessage::Delta(delta_msg) => handle_delta_message(self, &delta_msg).await,
            ReceivedMessage::Close(close_msg) => return handle_close_message(self, &close_msg).await,
            ReceivedMessage::Unknown => {
                debug!("Ignoring unknown message type in room {}", self.room);
            }
        }
        Flow::Continue
    }

    /// Remove this connection from its room. Safe to call more than once.
    pub async fn end(&self) {
        self.registry.close_connection(&self.room, self.conn.id()).await;
    }

    pub fn record_activity(&self, message: &str) {
        self.activity.append(&self.room.report_id, &self.user, message);
    }

    /// Whether the report/section named in a message body is this session's room.
    /// Absent fields default to the room.
    pub fn addresses_room(&self, report_id: Option<&str>, section: Option<&str>) -> bool {
        let report_ok = report_id.map_or(true, |r| r == self.room.report_id);
        let section_ok = section.map_or(true, |s| s == self.room.section);
        if !(report_ok && section_ok) {
            warn!(
                "Message for {}/{} arrived on room {}; skipping",
                report_id.unwrap_or(&self.room.report_id),
                section.unwrap_or(&self.room.section),
                self.room
            );
        }
        report_ok && section_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EditorDelta, Operation, SendMessage};
    use crate::test_support::{RecordingConnection, RecordingRepository};
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;
    use uuid::Uuid;

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        repo: Arc<RecordingRepository>,
        activity: ActivityLogBuffer,
        room: RoomKey,
    }

    impl Fixture {
        fn new() -> Self {
            let repo = RecordingRepository::new();
            Self {
                registry: Arc::new(ConnectionRegistry::new(Duration::from_millis(200))),
                activity: ActivityLogBuffer::new(repo.clone(), 100),
                repo,
                room: RoomKey::new("r1", "Intro"),
            }
        }

        async fn connect(&self, user: &str) -> (RoomSession, Arc<RecordingConnection>) {
            let conn = RecordingConnection::new();
            let session = RoomSession::open(
                self.room.clone(),
                conn.clone(),
                user.to_string(),
                self.registry.clone(),
                self.repo.clone(),
                self.activity.clone(),
            )
            .await;
            (session, conn)
        }

        async fn activity_messages(&self) -> Vec<String> {
            self.activity.flush_all().await;
            self.repo
                .fetch_logs("r1")
                .await
                .unwrap()
                .into_iter()
                .map(|e| e.message)
                .collect()
        }
    }

    fn envelope(editor: &str, text: &str) -> serde_json::Value {
        json!({"type": "delta", "delta": {"editorId": editor, "delta": {"ops": [{"insert": text}]}}})
    }

    fn stored(editor: &str, text: &str) -> String {
        serde_json::to_string(&SendMessage::Delta(crate::models::DeltaMessage {
            delta: EditorDelta::new(editor, vec![Operation::insert_text(text)]),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_join_replays_stored_contents_in_order() {
        let fx = Fixture::new();
        fx.repo.memory().seed_section("r1", "Intro", &["e1", "empty", "e2"]);
        fx.repo.update_section_content("r1", "Intro", "e1", &stored("e1", "one")).await.unwrap();
        fx.repo.update_section_content("r1", "Intro", "e2", &stored("e2", "two")).await.unwrap();

        let (a, conn) = fx.connect("alice").await;
        assert_eq!(a.dispatch(r#"{"type":"join","reportid":"r1","section":"Intro"}"#).await, Flow::Continue);

        let sent = conn.sent_json();
        assert_eq!(sent, vec![envelope("e1", "one"), envelope("e2", "two")]);
        assert_eq!(fx.repo.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_later_join_asks_a_peer_instead_of_storage() {
        let fx = Fixture::new();
        let (_a, a_conn) = fx.connect("alice").await;
        let (b, b_conn) = fx.connect("bob").await;

        b.dispatch(r#"{"type":"join","reportid":"r1","section":"Intro"}"#).await;

        assert_eq!(fx.repo.fetch_count(), 0);
        assert_eq!(a_conn.sent_json(), vec![json!({"action": "request_contents"})]);
        assert!(b_conn.sent().is_empty());
    }

    #[tokio::test]
    async fn test_join_survives_fetch_failure() {
        let fx = Fixture::new();
        fx.repo.fail_fetches(true);
        let (a, conn) = fx.connect("alice").await;

        assert_eq!(a.dispatch(r#"{"type":"join"}"#).await, Flow::Continue);
        assert!(conn.sent().is_empty());
        assert_eq!(fx.registry.count(&fx.room).await, 1);
    }

    #[tokio::test]
    async fn test_join_skips_unparseable_stored_content() {
        let fx = Fixture::new();
        fx.repo.update_section_content("r1", "Intro", "bad", "not json").await.unwrap();
        fx.repo.update_section_content("r1", "Intro", "e1", &stored("e1", "ok")).await.unwrap();
        let (a, conn) = fx.connect("alice").await;

        a.dispatch(r#"{"type":"join"}"#).await;

        assert_eq!(conn.sent_json(), vec![envelope("e1", "ok")]);
    }

    #[tokio::test]
    async fn test_sync_broadcasts_and_persists_every_editor() {
        let fx = Fixture::new();
        let (a, a_conn) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        let msg = json!({
            "type": "sync", "reportid": "r1", "section": "Intro",
            "contents": {"e1": envelope("e1", "x"), "e2": envelope("e2", "y")}
        });
        a.dispatch(&msg.to_string()).await;

        let received: HashSet<String> = b_conn.sent_json().iter().map(|v| v.to_string()).collect();
        let expected: HashSet<String> = [envelope("e1", "x"), envelope("e2", "y")]
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(received, expected);
        assert!(a_conn.sent().is_empty());

        let updates = fx.repo.updates();
        assert_eq!(updates.len(), 2);
        let persisted: Vec<(String, serde_json::Value)> = updates
            .iter()
            .map(|u| (u.subsection.clone(), serde_json::from_str(&u.content).unwrap()))
            .collect();
        assert!(persisted.contains(&("e1".to_string(), envelope("e1", "x"))));
        assert!(persisted.contains(&("e2".to_string(), envelope("e2", "y"))));
    }

    #[tokio::test]
    async fn test_sync_keeps_broadcasting_when_storage_fails() {
        let fx = Fixture::new();
        fx.repo.fail_updates(true);
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        let msg = json!({"type": "sync", "contents": {"e1": envelope("e1", "x")}});
        assert_eq!(a.dispatch(&msg.to_string()).await, Flow::Continue);

        assert_eq!(b_conn.sent_json(), vec![envelope("e1", "x")]);
        assert!(fx.repo.updates().is_empty());
    }

    #[tokio::test]
    async fn test_update_repo_persists_without_broadcast() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        let msg = json!({"type": "updateRepo", "reportid": "r1", "section": "Intro", "contents": {"e1": envelope("e1", "x")}});
        a.dispatch(&msg.to_string()).await;

        assert!(b_conn.sent().is_empty());
        let updates = fx.repo.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].section, "Intro");
        assert_eq!(updates[0].subsection, "e1");
    }

    #[tokio::test]
    async fn test_delta_reaches_others_only_and_is_not_persisted() {
        let fx = Fixture::new();
        let (a, a_conn) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;
        let (_c, c_conn) = fx.connect("carol").await;

        a.dispatch(&envelope("e1", "hello").to_string()).await;

        assert!(a_conn.sent().is_empty());
        assert_eq!(b_conn.sent_json(), vec![envelope("e1", "hello")]);
        assert_eq!(c_conn.sent_json(), vec![envelope("e1", "hello")]);
        assert!(fx.repo.updates().is_empty());
    }

    #[tokio::test]
    async fn test_delta_preserves_op_order_and_attributes() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;
        let msg = json!({"type": "delta", "delta": {"editorId": "e1", "delta": {"ops": [
            {"retain": 5},
            {"insert": "bold", "attributes": {"bold": true, "color": "#f00"}},
            {"delete": 2},
            {"insert": {"image": "https://x/y.png"}}
        ]}}});

        a.dispatch(&msg.to_string()).await;

        assert_eq!(b_conn.sent_json(), vec![msg]);
    }

    #[tokio::test]
    async fn test_malformed_message_is_skipped() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        assert_eq!(a.dispatch("{not json").await, Flow::Continue);
        assert_eq!(a.dispatch(r#"{"type":"delta","delta":{"editorId":"e1","delta":{"ops":[{"retain":1,"delete":1}]}}}"#).await, Flow::Continue);
        a.dispatch(&envelope("e1", "after").to_string()).await;

        assert_eq!(b_conn.sent_json(), vec![envelope("e1", "after")]);
        assert_eq!(fx.registry.count(&fx.room).await, 2);
    }

    #[tokio::test]
    async fn test_unknown_type_is_ignored() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        assert_eq!(a.dispatch(r#"{"type":"cursor","index":3}"#).await, Flow::Continue);
        assert!(b_conn.sent().is_empty());
        assert!(fx.activity_messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_for_another_section_is_rejected() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        let msg = json!({"type": "sync", "reportid": "r1", "section": "Method", "contents": {"e1": envelope("e1", "x")}});
        a.dispatch(&msg.to_string()).await;

        assert!(b_conn.sent().is_empty());
        assert!(fx.repo.updates().is_empty());
    }

    #[tokio::test]
    async fn test_close_deregisters_and_stops() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice").await;
        let (_b, b_conn) = fx.connect("bob").await;

        assert_eq!(a.dispatch(r#"{"type":"close","section":"Intro"}"#).await, Flow::Close);
        assert_eq!(fx.registry.count(&fx.room).await, 1);

        let delivered = fx
            .registry
            .broadcast_except(&fx.room, &json!("x"), Uuid::nil())
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(b_conn.sent_json(), vec![json!("x")]);
    }

    #[tokio::test]
    async fn test_activity_is_attributed_to_session_user() {
        let fx = Fixture::new();
        let (a, _) = fx.connect("alice@example.com").await;

        a.dispatch(r#"{"type":"join"}"#).await;
        a.dispatch(&json!({"type": "sync", "contents": {}}).to_string()).await;
        a.dispatch(&json!({"type": "updateRepo", "contents": {}}).to_string()).await;
        a.dispatch(&envelope("e1", "x").to_string()).await;
        a.dispatch(r#"{"type":"close"}"#).await;

        assert_eq!(
            fx.activity_messages().await,
            vec![
                "alice@example.com joined a report section",
                "alice@example.com synced content",
                "alice@example.com triggered repository update",
                "alice@example.com sent a delta update",
                "alice@example.com closed a WebSocket connection",
            ]
        );
    }
}
