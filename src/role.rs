use serde::Serialize;
use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;

/// Per-connection role within a session. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Presenter,
    Spectator,
}

/// Typed session context handed to the connection handlers.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: i64,
    pub public_id: String,
    pub owner_id: String,
    pub ended: Option<String>,
    pub role: Role,
}

impl SessionContext {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }
}

/// Presenter iff a principal is present and it owns the session.
pub fn role_for(owner_id: &str, principal: Option<&str>) -> Role {
    match principal {
        Some(p) if p == owner_id => Role::Presenter,
        _ => Role::Spectator,
    }
}

/// Looks up the session by public id and decides the caller's role.
pub async fn resolve(
    pool: &SqlitePool,
    public_id: &str,
    principal: Option<&str>,
) -> Result<SessionContext, AppError> {
    let owner = db::sessions::owner_of(pool, public_id).await?;
    let role = role_for(&owner.owner_id, principal);

    Ok(SessionContext {
        session_id: owner.session_id,
        public_id: public_id.to_string(),
        owner_id: owner.owner_id,
        ended: owner.ended,
        role,
    })
}

/// Resolves a session for an administrative action that only its owner may take.
pub async fn require_owner(
    pool: &SqlitePool,
    public_id: &str,
    user_id: &str,
) -> Result<SessionContext, AppError> {
    let ctx = resolve(pool, public_id, Some(user_id)).await?;
    if !ctx.is_owned_by(user_id) {
        return Err(AppError::Forbidden(
            "only the session owner can do this".to_string(),
        ));
    }
    Ok(ctx)
}
