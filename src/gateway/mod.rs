//! WebSocket entry point for presenters and spectators.
//!
//! A client opens `/ws`, sends a hello frame naming the session (and
//! optionally a bearer token), and is then handed to the presenter or the
//! spectator path depending on whether it owns the session. Every exit
//! ends with a close frame carrying the outcome.

pub mod error;
pub mod events;
pub mod presenter;
pub mod spectator;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::StreamExt;
use std::time::Duration;

use crate::db;
use crate::middleware::auth::{bearer_token, resolve_principal, OptionalAuthUser};
use crate::models::command::Command;
use crate::role::{self, Role, SessionContext};
use crate::state::AppState;
use error::GatewayError;
use events::{close_code, send_close, send_json, Hello, SyncPayload, WsSink, WsStream};

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    OptionalAuthUser(user): OptionalAuthUser,
    State(state): State<AppState>,
) -> Response {
    let principal = user.map(|u| u.user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(socket: WebSocket, state: AppState, header_principal: Option<String>) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    match serve(&state, &mut ws_sink, &mut ws_stream, header_principal).await {
        Ok(()) => send_close(&mut ws_sink, close_code::NORMAL, "").await,
        Err(e) => {
            match &e {
                GatewayError::Infrastructure(_) | GatewayError::Internal(_) => {
                    tracing::error!("gateway connection failed: {e}")
                }
                GatewayError::Transport => tracing::debug!("gateway peer went away"),
                GatewayError::Stalled => tracing::info!("gateway spectator dropped: {e}"),
                _ => tracing::info!("gateway connection rejected: {e}"),
            }
            if let Some(code) = e.close_code() {
                send_close(&mut ws_sink, code, e.reason()).await;
            }
        }
    }
}

async fn serve(
    state: &AppState,
    sink: &mut WsSink,
    stream: &mut WsStream,
    header_principal: Option<String>,
) -> Result<(), GatewayError> {
    let hello = read_hello(stream, state.handshake_timeout).await?;

    // The upgrade request's Authorization header wins over the hello token.
    let principal = match header_principal {
        Some(user_id) => Some(user_id),
        None => match hello.token.as_deref().and_then(bearer_token) {
            Some(token) => resolve_principal(state, token).await.map(|u| u.user_id),
            None => None,
        },
    };

    let ctx = role::resolve(&state.db, &hello.session_id, principal.as_deref()).await?;
    tracing::info!(
        session = %ctx.public_id,
        role = ?ctx.role,
        "gateway connection attached"
    );

    if ctx.ended.is_some() {
        let sync = load_sync(state, &ctx).await?;
        return finish_ended(sink, &ctx, &sync).await;
    }

    let result = match ctx.role {
        Role::Presenter => presenter::run(state, &ctx, sink, stream).await,
        Role::Spectator => spectator::run(state, &ctx, sink, stream).await,
    };
    tracing::info!(session = %ctx.public_id, role = ?ctx.role, "gateway connection detached");
    result
}

async fn read_hello(stream: &mut WsStream, timeout: Duration) -> Result<Hello, GatewayError> {
    let read = async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Hello>(&text)
                        .map_err(|e| GatewayError::Decode(e.to_string()));
                }
                Some(Ok(Message::Binary(_))) => {
                    return Err(GatewayError::Decode("hello must be a text frame".into()));
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    return Err(GatewayError::Transport);
                }
            }
        }
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| GatewayError::HandshakeTimeout)?
}

/// Loads the replay for a connection: ordered log, current page and the
/// ended flag as they stand now.
pub(crate) async fn load_sync(
    state: &AppState,
    ctx: &SessionContext,
) -> Result<SyncPayload, GatewayError> {
    let cmds = db::commands::list_ordered(&state.db, ctx.session_id).await?;
    let page = db::commands::latest_page(&state.db, ctx.session_id).await?;
    let ended = db::sessions::ended_at(&state.db, ctx.session_id).await?;
    Ok(SyncPayload::new(ctx.role, page, ended, cmds))
}

/// An ended session replays once, then closes.
pub(crate) async fn finish_ended(
    sink: &mut WsSink,
    ctx: &SessionContext,
    sync: &SyncPayload,
) -> Result<(), GatewayError> {
    send_json(sink, sync).await?;
    send_json(sink, &Command::close(ctx.session_id)).await
}
