use sqlx::SqlitePool;

use crate::error::AppError;
use crate::middleware::auth::{create_token_hash, generate_token};

/// Bearer tokens stay valid for this many days.
pub const TOKEN_TTL_DAYS: i64 = 30;

/// Issues a new bearer token for a user and returns the raw token.
pub async fn issue_token(pool: &SqlitePool, user_id: &str) -> Result<String, AppError> {
    let token = generate_token();
    let token_hash = create_token_hash(&token);
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();

    sqlx::query("INSERT INTO user_tokens (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token_hash)
        .bind(user_id)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

pub async fn revoke_token(pool: &SqlitePool, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_tokens WHERE token_hash = ?")
        .bind(create_token_hash(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolves a raw bearer token to its user id. Expired tokens resolve to `None`.
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Result<Option<String>, AppError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT user_id, expires_at FROM user_tokens WHERE token_hash = ?",
    )
    .bind(create_token_hash(token))
    .fetch_optional(pool)
    .await?;

    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    Ok(row.and_then(|(user_id, expires_at)| (expires_at >= now).then_some(user_id)))
}
