#![allow(dead_code)]

use axum::body::Body;
use futures_util::{SinkExt, StreamExt};
use http::{Method, Request};
use slidecast::config::Config;
use slidecast::db;
use slidecast::middleware::auth::{create_token_hash, generate_token};
use slidecast::models::user::User;
use slidecast::routes;
use slidecast::state::AppState;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A user created for testing, bundling the User record with its raw token.
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    /// Returns the Authorization header value (`"Bearer xxx"`).
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Test server that owns an in-memory SQLite pool and full AppState.
/// Each instance is isolated, so tests can run in parallel.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    /// Create a new TestServer with an in-memory SQLite database.
    pub async fn new() -> Self {
        Self::with_config(Config::default()).await
    }

    /// Same as `new`, with bus and handshake settings taken from `config`.
    pub async fn with_config(config: Config) -> Self {
        let pool = db::create_pool("sqlite::memory:")
            .await
            .expect("failed to create test pool");
        Self {
            state: AppState::new(pool, &config),
        }
    }

    /// Returns an Axum Router wired to this server's state for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// WebSocket URL of the gateway.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://127.0.0.1:{}/ws", addr.port())
    }

    /// Create a user and insert a bearer token into `user_tokens` with far-future expiry.
    pub async fn create_user_with_token(&self, username: &str) -> TestUser {
        let user = db::users::create_user(self.pool(), username, "not-a-real-hash")
            .await
            .expect("failed to create test user");

        let token = generate_token();
        let token_hash = create_token_hash(&token);

        sqlx::query(
            "INSERT INTO user_tokens (token_hash, user_id, expires_at) VALUES (?, ?, '2099-12-31T23:59:59')",
        )
        .bind(&token_hash)
        .bind(&user.id)
        .execute(self.pool())
        .await
        .expect("failed to insert test token");

        TestUser { user, token }
    }

    /// Create an upload owned by the given user. Returns its public ID.
    pub async fn create_upload(&self, owner_id: &str, title: &str) -> String {
        db::uploads::create_upload(self.pool(), owner_id, title)
            .await
            .expect("failed to create test upload")
            .public_id
    }

    /// Start a session on a fresh upload owned by `owner_id`. Returns the
    /// session's public ID.
    pub async fn create_session(&self, owner_id: &str) -> String {
        let upload = db::uploads::create_upload(self.pool(), owner_id, "deck")
            .await
            .expect("failed to create test upload");
        db::sessions::create_session(self.pool(), upload.id)
            .await
            .expect("failed to create test session")
            .public_id
    }
}

// ---------------------------------------------------------------------------
// Request builder helpers
// ---------------------------------------------------------------------------

/// Build an authenticated request with no body.
pub fn authenticated_request(method: Method, uri: &str, auth_header: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .body(Body::empty())
        .unwrap()
}

/// Build an authenticated request with a JSON body.
pub fn authenticated_json_request(
    method: Method,
    uri: &str,
    auth_header: &str,
    body: &serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", auth_header)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Build an unauthenticated request with a JSON body.
pub fn json_request(method: Method, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Parse a response body into a `serde_json::Value`.
pub async fn parse_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Gateway client helpers
// ---------------------------------------------------------------------------

/// Connects to the gateway and sends the hello frame.
pub async fn connect(url: &str, session_id: &str, token: Option<&str>) -> WsClient {
    let (mut ws, _) = connect_async(url).await.expect("failed to connect");
    let hello = match token {
        Some(token) => serde_json::json!({ "session_id": session_id, "token": token }),
        None => serde_json::json!({ "session_id": session_id }),
    };
    send_json(&mut ws, &hello).await;
    ws
}

pub async fn send_json(ws: &mut WsClient, value: &serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("failed to send frame");
}

/// Next frame from the server, skipping pings. Fails the test after 5s.
pub async fn next_frame(ws: &mut WsClient) -> Message {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error");
        if !matches!(msg, Message::Ping(_) | Message::Pong(_)) {
            return msg;
        }
    }
}

/// Next text frame parsed as JSON.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    match next_frame(ws).await {
        Message::Text(text) => serde_json::from_str(&text).expect("invalid JSON frame"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

/// Waits for the close frame and returns its code.
pub async fn expect_close(ws: &mut WsClient) -> u16 {
    match next_frame(ws).await {
        Message::Close(Some(frame)) => frame.code.into(),
        other => panic!("expected close frame, got {other:?}"),
    }
}
