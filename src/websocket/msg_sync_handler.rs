use tracing::{error, info};

use crate::models::{ContentsMessage, DeltaMessage, SendMessage};
use crate::websocket::session::RoomSession;

/// Handle a `sync`: every editor's delta goes to the other members and then to storage.
pub async fn handle_sync_message(session: &RoomSession, sync_msg: &ContentsMessage) {
    if !session.addresses_room(sync_msg.report_id.as_deref(), sync_msg.section.as_deref()) {
        return;
    }

    session.record_activity("synced content");

    for (editor_id, envelope) in &sync_msg.contents {
        let outgoing = SendMessage::Delta(envelope.clone());
        if let Err(e) = session
            .registry
            .broadcast_except(&session.room, &outgoing, session.conn.id())
            .await
        {
            error!("Failed to encode delta for editor {} in room {}: {}", editor_id, session.room, e);
        }
        persist(session, editor_id, envelope).await;
    }
}

/// Handle an `updateRepo`: same payload as `sync`, but storage only.
pub async fn handle_update_repo_message(session: &RoomSession, update_msg: &ContentsMessage) {
    if !session.addresses_room(update_msg.report_id.as_deref(), update_msg.section.as_deref()) {
        return;
    }

    session.record_activity("triggered repository update");

    for (editor_id, envelope) in &update_msg.contents {
        persist(session, editor_id, envelope).await;
    }
}

async fn persist(session: &RoomSession, editor_id: &str, envelope: &DeltaMessage) {
    let content = match serde_json::to_string(&SendMessage::Delta(envelope.clone())) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to encode delta for editor {} in room {}: {}", editor_id, session.room, e);
            return;
        }
    };

    match session
        .repo
        .update_section_content(&session.room.report_id, &session.room.section, editor_id, &content)
        .await
    {
        Ok(()) => info!("Stored subsection '{}' for room {}", editor_id, session.room),
        Err(e) => error!("Error updating subsection '{}' for room {}: {}", editor_id, session.room, e),
    }
}
