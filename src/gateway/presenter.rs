use axum::extract::ws::Message;
use futures_util::StreamExt;

use super::error::GatewayError;
use super::events::{send_json, WsSink, WsStream};
use super::{finish_ended, load_sync};
use crate::bus::SessionClock;
use crate::db;
use crate::effects;
use crate::models::command::{Command, CommandKind};
use crate::role::SessionContext;
use crate::state::AppState;

pub async fn run(
    state: &AppState,
    ctx: &SessionContext,
    sink: &mut WsSink,
    stream: &mut WsStream,
) -> Result<(), GatewayError> {
    // Attach before loading so a stop landing in between is seen either in
    // the ended flag or through the lease.
    let mut lease = state.bus.attach_presenter(ctx.session_id);
    let sync = load_sync(state, ctx).await?;
    if sync.ended.is_some() {
        return finish_ended(sink, ctx, &sync).await;
    }
    send_json(sink, &sync).await?;

    // The clock may be fresh (first presenter, reaped channel, restart);
    // never stamp behind what the log already holds.
    let clock = lease.clock();
    if let Some(latest) = db::commands::latest_timestamp(&state.db, ctx.session_id).await? {
        clock.lock().await.observe(latest);
    }

    loop {
        tokio::select! {
            _ = lease.closed() => {
                tracing::info!(session = %ctx.public_id, "session stopped, releasing presenter");
                send_json(sink, &Command::close(ctx.session_id)).await?;
                return Ok(());
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let command = decode(&text)?;
                        handle_command(state, ctx, &clock, command).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        return Err(GatewayError::Decode("binary frames are not supported".into()));
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(_)) => return Err(GatewayError::Transport),
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

fn decode(text: &str) -> Result<Command, GatewayError> {
    let command: Command =
        serde_json::from_str(text).map_err(|e| GatewayError::Decode(e.to_string()))?;
    if command.is_close() {
        return Err(GatewayError::Protocol(
            "close is issued by the server when a session stops".into(),
        ));
    }
    Ok(command)
}

/// Stamp, persist (or clear), then publish, all under the session clock so
/// concurrent presenters cannot interleave. Storage failures are logged and
/// the live broadcast still goes out.
async fn handle_command(
    state: &AppState,
    ctx: &SessionContext,
    clock: &SessionClock,
    mut command: Command,
) {
    let mut clock = clock.lock().await;
    command.id = None;
    command.session_id = ctx.session_id;
    command.timestamp = clock.stamp();

    if command.cmd != CommandKind::ClearSlide {
        match db::commands::insert(&state.db, &command).await {
            Ok(id) => command.id = Some(id),
            Err(e) => tracing::warn!(
                session = %ctx.public_id,
                kind = command.cmd.as_str(),
                "failed to persist command: {e}"
            ),
        }
    }

    if let Err(e) = effects::apply(&state.db, &command).await {
        tracing::warn!(
            session = %ctx.public_id,
            kind = command.cmd.as_str(),
            "side effect failed: {e}"
        );
    }

    let delivery = state.bus.publish(ctx.session_id, command);
    if delivery.evicted > 0 {
        tracing::debug!(
            session = %ctx.public_id,
            "{} spectator(s) evicted on publish",
            delivery.evicted
        );
    }
}
