use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::SinkExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::GatewayError;
use crate::models::command::Command;
use crate::role::Role;

pub type WsSink = SplitSink<WebSocket, Message>;
pub type WsStream = SplitStream<WebSocket>;

/// Close codes.
pub mod close_code {
    pub const NORMAL: u16 = 1000;
    pub const INTERNAL_ERROR: u16 = 1011;
    pub const DECODE_ERROR: u16 = 4002;
    pub const SESSION_NOT_FOUND: u16 = 4004;
    pub const SUBSCRIBER_OVERRUN: u16 = 4008;
    pub const HANDSHAKE_TIMEOUT: u16 = 4009;
}

/// First frame a client sends after the upgrade.
#[derive(Debug, Deserialize)]
pub struct Hello {
    pub session_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// First frame the server sends once the connection's role is known.
#[derive(Debug, Serialize)]
pub struct SyncPayload {
    pub cmd: &'static str,
    pub role: Role,
    pub page: i64,
    pub ended: Option<String>,
    pub cmds: Vec<Command>,
}

impl SyncPayload {
    pub fn new(role: Role, page: i64, ended: Option<String>, cmds: Vec<Command>) -> Self {
        Self {
            cmd: "sync",
            role,
            page,
            ended,
            cmds,
        }
    }

    /// Highest log id included in the replay.
    pub fn watermark(&self) -> i64 {
        self.cmds.iter().filter_map(|c| c.id).max().unwrap_or(0)
    }
}

pub async fn send_json<T: Serialize>(sink: &mut WsSink, value: &T) -> Result<(), GatewayError> {
    let text = serde_json::to_string(value)
        .map_err(|e| GatewayError::Internal(format!("failed to encode frame: {e}")))?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|_| GatewayError::Transport)
}

/// Longest reason a close frame can carry: a control frame payload is
/// capped at 125 bytes and the code takes two of them.
pub const MAX_CLOSE_REASON: usize = 123;

/// How long a close frame may wait on a peer that is not reading.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Cuts `reason` to fit a close frame, on a char boundary.
pub fn close_reason(reason: &str) -> &str {
    if reason.len() <= MAX_CLOSE_REASON {
        return reason;
    }
    let mut end = MAX_CLOSE_REASON;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    &reason[..end]
}

/// Best effort: the peer may already be gone or never read it.
pub async fn send_close(sink: &mut WsSink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: close_reason(reason).into(),
    };
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await;
}
