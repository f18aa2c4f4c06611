use tracing::{error, info, warn};

use crate::models::{JoinMessage, SendMessage};
use crate::websocket::session::RoomSession;

/// Handle JoinMessage
///
/// The first connection in a room is seeded from storage. Anyone joining a
/// room that already has members gets the live state from one of them.
pub async fn handle_join_message(session: &RoomSession, join_msg: &JoinMessage) {
    if !session.addresses_room(join_msg.report_id.as_deref(), join_msg.section.as_deref()) {
        return;
    }

    session.record_activity("joined a report section");

    let members = session.registry.count(&session.room).await;
    if members == 1 {
        send_stored_contents(session).await;
    } else {
        info!("Room {} has {} members; asking a peer for its contents", session.room, members);
        session
            .registry
            .request_contents_from_peer(&session.room, session.conn.id())
            .await;
    }
}

async fn send_stored_contents(session: &RoomSession) {
    let contents = match session
        .repo
        .fetch_section_contents(&session.room.report_id, &session.room.section)
        .await
    {
        Ok(contents) => contents,
        Err(e) => {
            error!("Failed to fetch section contents for room {}: {}", session.room, e);
            return;
        }
    };

    let mut sent = 0;
    for subsection in contents {
        if subsection.content.is_empty() {
            continue;
        }
        // Only forward content that still parses as a delta envelope.
        if let Err(e) = serde_json::from_str::<SendMessage>(&subsection.content) {
            warn!(
                "Stored content for subsection '{}' in room {} is not a delta: {}",
                subsection.title, session.room, e
            );
            continue;
        }
        if let Err(e) = session.conn.send_text(subsection.content).await {
            error!("Error sending stored content to {} in room {}: {}", session.conn.id(), session.room, e);
            return;
        }
        sent += 1;
    }
    info!("Sent {} stored subsections to {} in room {}", sent, session.conn.id(), session.room);
}
