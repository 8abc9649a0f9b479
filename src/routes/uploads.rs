use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::command::Command;
use crate::models::upload::{CreateUpload, UpdateUpload};
use crate::state::AppState;

fn validate_title(title: &str) -> Result<&str, AppError> {
    let title = title.trim();
    if title.is_empty() || title.len() > 200 {
        return Err(AppError::BadRequest(
            "title must be between 1 and 200 characters".to_string(),
        ));
    }
    Ok(title)
}

pub async fn list_uploads(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let uploads = db::uploads::list_uploads_for_user(&state.db, &auth.user_id).await?;
    Ok(Json(serde_json::json!({ "data": uploads })))
}

pub async fn create_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateUpload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let title = validate_title(&input.title)?;
    let upload = db::uploads::create_upload(&state.db, &auth.user_id, title).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "data": upload })),
    ))
}

pub async fn update_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    auth: AuthUser,
    Json(input): Json<UpdateUpload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let title = validate_title(&input.title)?;
    let upload = db::uploads::rename_upload(&state.db, &upload_id, &auth.user_id, title).await?;
    Ok(Json(serde_json::json!({ "data": upload })))
}

/// Removes an upload with all of its sessions. Sessions that were still
/// live are closed on the bus so their connections end.
pub async fn delete_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let open_sessions = db::uploads::delete_upload(&state.db, &upload_id, &auth.user_id).await?;
    for session_id in open_sessions {
        state.bus.publish(session_id, Command::close(session_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
