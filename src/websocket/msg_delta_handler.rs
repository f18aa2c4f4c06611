use tracing::{debug, error};

use crate::models::{DeltaMessage, SendMessage};
use crate::websocket::session::RoomSession;

/// Handle DeltaMessage
///
/// Live keystrokes are relayed as-is and never stored; the next `sync`
/// or `updateRepo` carries the durable state.
pub async fn handle_delta_message(session: &RoomSession, delta_msg: &DeltaMessage) {
    session.record_activity("sent a delta update");

    let outgoing = SendMessage::Delta(delta_msg.clone());
    match session
        .registry
        .broadcast_except(&session.room, &outgoing, session.conn.id())
        .await
    {
        Ok(delivered) => debug!(
            "Delta from editor {} relayed to {} peers in room {}",
            delta_msg.delta.editor_id, delivered, session.room
        ),
        Err(e) => error!("Failed to encode delta for room {}: {}", session.room, e),
    }
}
