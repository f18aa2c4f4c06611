use tracing::info;

use crate::models::CloseMessage;
use crate::websocket::session::{Flow, RoomSession};

pub async fn handle_close_message(session: &RoomSession, close_msg: &CloseMessage) -> Flow {
    info!(
        "Client {} closing room {} (section {})",
        session.conn.id(),
        session.room,
        close_msg.section.as_deref().unwrap_or(&session.room.section)
    );
    session.record_activity("closed a WebSocket connection");
    session.end().await;
    Flow::Close
}
