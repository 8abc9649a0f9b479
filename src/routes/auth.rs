use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::db;
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::models::user::CreateUser;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let username = input.username.trim();
    if username.is_empty() || username.len() > 32 {
        return Err(AppError::BadRequest(
            "username must be between 1 and 32 characters".to_string(),
        ));
    }

    if input.password.len() < 8 || input.password.len() > 128 {
        return Err(AppError::BadRequest(
            "password must be between 8 and 128 characters".to_string(),
        ));
    }

    if db::users::username_taken(&state.db, username).await? {
        return Err(AppError::Conflict("username already taken".to_string()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(input.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
        .to_string();

    let user = db::users::create_user(&state.db, username, &password_hash).await?;
    let token = db::auth::issue_token(&state.db, &user.id).await?;
    tracing::info!(user_id = %user.id, "registered new user");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "data": {
                "user": user,
                "token": token
            }
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some((user_id, stored_hash)) =
        db::users::get_credentials(&state.db, input.username.trim()).await?
    else {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    };

    let parsed_hash = PasswordHash::new(&stored_hash)
        .map_err(|e| AppError::Internal(format!("stored hash parse failed: {e}")))?;

    if Argon2::default()
        .verify_password(input.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    let user = db::users::get_user(&state.db, &user_id).await?;
    let token = db::auth::issue_token(&state.db, &user_id).await?;

    Ok(Json(serde_json::json!({
        "data": {
            "user": user,
            "token": token
        }
    })))
}

/// Revokes only the token the request was made with.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    db::auth::revoke_token(&state.db, &auth.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
