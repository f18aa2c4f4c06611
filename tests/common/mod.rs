#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use report_sync::config::Config;
use report_sync::db::MemoryReportRepository;
use report_sync::models::Claims;
use report_sync::routes::create_app;
use report_sync::AppState;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub const SECRET: &str = "integration-secret";

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn test_config() -> Config {
    Config {
        auth_jwt_secret: Some(SECRET.to_string()),
        ws_write_timeout_ms: 1000,
        ..Config::default()
    }
}

pub fn test_state() -> (Arc<AppState>, Arc<MemoryReportRepository>) {
    let repo = Arc::new(MemoryReportRepository::new());
    let state = Arc::new(AppState::new(test_config(), repo.clone()));
    (state, repo)
}

pub fn token(uid: &str, email: Option<&str>, roles: &[&str]) -> String {
    let claims = Claims {
        sub: uid.to_string(),
        email: email.map(str::to_string),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    pub repo: Arc<MemoryReportRepository>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let (state, repo) = test_state();
        let addr = serve(state.clone()).await;
        Self { addr, state, repo }
    }

    pub async fn connect(
        &self,
        report_id: &str,
        section: &str,
        token: &str,
    ) -> Result<Client, tokio_tungstenite::tungstenite::Error> {
        connect(self.addr, report_id, section, token).await
    }
}

/// Bind an ephemeral port and serve the app built from `state` on it.
pub async fn serve(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_app(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn connect(
    addr: SocketAddr,
    report_id: &str,
    section: &str,
    token: &str,
) -> Result<Client, tokio_tungstenite::tungstenite::Error> {
    let url = format!("ws://{}/report/{}/section/{}", addr, report_id, section);
    let mut request = url.into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {}", token).parse().unwrap());
    request
        .headers_mut()
        .insert("Sec-WebSocket-Protocol", "binary".parse().unwrap());
    let (client, _response) = connect_async(request).await?;
    Ok(client)
}

pub async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

/// Next JSON message, or `None` if nothing arrives within the timeout.
pub async fn recv_json(client: &mut Client, wait: Duration) -> Option<Value> {
    loop {
        let frame = match tokio::time::timeout(wait, client.next()).await {
            Ok(Some(Ok(frame))) => frame,
            _ => return None,
        };
        match frame {
            Message::Text(_) | Message::Binary(_) => {
                let text = frame.to_text().unwrap().to_string();
                return Some(serde_json::from_str(&text).unwrap());
            }
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

pub fn envelope(editor: &str, text: &str) -> Value {
    serde_json::json!({"type": "delta", "delta": {"editorId": editor, "delta": {"ops": [{"insert": text}]}}})
}
