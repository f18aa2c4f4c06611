use std::sync::Arc;

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};

use crate::auth::auth;
use crate::models::{ErrorResponse, Identity};
use crate::websocket::connection::WsConnection;
use crate::websocket::registry::RoomKey;
use crate::websocket::session::{Flow, RoomSession};
use crate::AppState;

/// WebSocket handler for one report section
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path((report_id, section_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    info!("New WebSocket connection attempt for report {} section {}", report_id, section_id);

    auth::ensure_report_member(&state.access, &identity, &report_id).await?;

    let room = RoomKey::new(report_id, section_id);
    Ok(ws
        .protocols(["binary"])
        .on_upgrade(move |socket| handle_socket(socket, room, identity, state)))
}

/// Drive one socket until the client closes it or the transport fails
async fn handle_socket(socket: WebSocket, room: RoomKey, identity: Identity, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    let session = RoomSession::open(
        room,
        Arc::new(WsConnection::new(sender)),
        identity.display_name().to_string(),
        state.registry.clone(),
        state.repo.clone(),
        state.activity.clone(),
    )
    .await;

    // Messages from one client are handled strictly in arrival order.
    while let Some(frame) = receiver.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping non UTF-8 binary frame in room {}: {}", session.room, e);
                    continue;
                }
            },
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                debug!("Close frame from {} in room {}", session.conn.id(), session.room);
                break;
            }
            Err(e) => {
                error!("WebSocket read error in room {}: {}", session.room, e);
                break;
            }
        };

        if session.dispatch(&text).await == Flow::Close {
            session.conn.close().await;
            info!("WebSocket connection terminated by close message");
            return;
        }
    }

    session.end().await;
    info!("WebSocket connection terminated");
}
