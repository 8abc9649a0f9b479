use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::{AuthUser, OptionalAuthUser};
use crate::models::command::Command;
use crate::models::session::StartSession;
use crate::role;
use crate::state::AppState;

/// Starts a new session on one of the caller's uploads.
pub async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<StartSession>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let upload = db::uploads::get_owned_upload(&state.db, &input.upload_id, &auth.user_id).await?;
    let session = db::sessions::create_session(&state.db, upload.id).await?;
    tracing::info!(session = %session.public_id, upload = %upload.public_id, "session started");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": { "id": session.public_id } })),
    ))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let sessions = db::sessions::list_sessions_for_user(&state.db, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "data": sessions })))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    OptionalAuthUser(auth): OptionalAuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let viewer = auth.as_ref().map(|a| a.user_id.as_str());
    let info = db::sessions::get_session_info(&state.db, &session_id, viewer).await?;
    Ok(Json(serde_json::json!({ "data": info })))
}

/// Ends a session. Only the first stop publishes `close`; later calls are no-ops.
pub async fn stop_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let ctx = role::require_owner(&state.db, &session_id, &auth.user_id).await?;

    if db::sessions::mark_ended(&state.db, &session_id).await? {
        let delivery = state
            .bus
            .publish(ctx.session_id, Command::close(ctx.session_id));
        tracing::info!(
            session = %session_id,
            "session stopped, close sent to {} spectator(s)",
            delivery.delivered
        );
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let ctx = role::require_owner(&state.db, &session_id, &auth.user_id).await?;
    db::sessions::delete_session(&state.db, &session_id).await?;

    if ctx.ended.is_none() {
        state
            .bus
            .publish(ctx.session_id, Command::close(ctx.session_id));
    }
    tracing::info!(session = %session_id, "session deleted");

    Ok(StatusCode::NO_CONTENT)
}
