use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ConnectionError;

/// Write side of one client session.
///
/// The engine loop that owns the read side keeps one handle; the registry
/// keeps another and only ever uses it to broadcast or to close.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> Uuid;

    async fn send_text(&self, text: String) -> Result<(), ConnectionError>;

    async fn close(&self);
}

/// A websocket sink shared between the session loop and the registry.
pub struct WsConnection {
    id: Uuid,
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsConnection {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> Uuid {
        self.id
    }

    async fn send_text(&self, text: String) -> Result<(), ConnectionError> {
        self.sender
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))
    }

    async fn close(&self) {
        // Errors here mean the peer is already gone.
        let _ = self.sender.lock().await.close().await;
    }
}
