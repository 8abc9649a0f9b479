use axum::extract::ws::Message;
use futures_util::StreamExt;
use std::time::Duration;

use super::error::GatewayError;
use super::events::{send_json, WsSink, WsStream};
use super::{finish_ended, load_sync};
use crate::bus::{EndReason, Subscription};
use crate::models::command::Command;
use crate::role::SessionContext;
use crate::state::AppState;

/// How long an evicted spectator's in-flight write may still take before
/// the socket is dropped without a close frame.
const EVICTION_GRACE: Duration = Duration::from_secs(5);

pub async fn run(
    state: &AppState,
    ctx: &SessionContext,
    sink: &mut WsSink,
    stream: &mut WsStream,
) -> Result<(), GatewayError> {
    // Subscribe before replaying; live commands already covered by the
    // replay are dropped by id below.
    let mut subscription = state.bus.subscribe(ctx.session_id);
    let sync = load_sync(state, ctx).await?;
    if sync.ended.is_some() {
        return finish_ended(sink, ctx, &sync).await;
    }
    let watermark = sync.watermark();
    send_json(sink, &sync).await?;

    loop {
        tokio::select! {
            next = subscription.recv() => {
                if subscription.is_overrun() {
                    return Err(GatewayError::SubscriberOverrun);
                }
                let Some(command) = next else {
                    return match subscription.end_reason() {
                        Some(EndReason::Overrun) => Err(GatewayError::SubscriberOverrun),
                        _ => Ok(()),
                    };
                };
                if command.id.is_some_and(|id| id <= watermark) {
                    continue;
                }
                deliver(sink, &subscription, &command, EVICTION_GRACE).await?;
                if command.is_close() {
                    return Ok(());
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Err(_)) => return Err(GatewayError::Transport),
                    // spectators have nothing to say
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Writes one live command. A spectator evicted mid-write gets `grace` for
/// that write to drain so 4008 can follow; past that its socket is dropped.
async fn deliver(
    sink: &mut WsSink,
    subscription: &Subscription,
    command: &Command,
    grace: Duration,
) -> Result<(), GatewayError> {
    let write = send_json(sink, command);
    tokio::pin!(write);

    tokio::select! {
        sent = &mut write => return sent,
        _ = subscription.evicted() => {}
    }

    tracing::debug!(subscriber = subscription.id(), "spectator evicted mid-write");
    match tokio::time::timeout(grace, write).await {
        Ok(sent) => sent.and(Err(GatewayError::SubscriberOverrun)),
        Err(_) => Err(GatewayError::Stalled),
    }
}
