use sqlx::{Row, SqlitePool};

use crate::db;
use crate::error::AppError;
use crate::ids;
use crate::models::session::{Session, SessionInfo, SessionOwner, SessionSummary};

fn row_to_session(row: sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: row.get("id"),
        upload_id: row.get("upload_id"),
        public_id: row.get("public_id"),
        started: row.get("started"),
        ended: row.get("ended"),
    }
}

const SELECT_SESSIONS: &str = "SELECT id, upload_id, public_id, started, ended FROM sessions";

fn unknown_session() -> AppError {
    AppError::NotFound("unknown_session".to_string())
}

pub async fn get_session(pool: &SqlitePool, public_id: &str) -> Result<Session, AppError> {
    let row = sqlx::query(&format!("{SELECT_SESSIONS} WHERE public_id = ?"))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(unknown_session)?;

    Ok(row_to_session(row))
}

/// Starts a new session presenting the given upload.
pub async fn create_session(pool: &SqlitePool, upload_id: i64) -> Result<Session, AppError> {
    let public_id = ids::public_id();

    sqlx::query("INSERT INTO sessions (upload_id, public_id) VALUES (?, ?)")
        .bind(upload_id)
        .bind(&public_id)
        .execute(pool)
        .await?;

    get_session(pool, &public_id).await
}

/// Resolves the owning user, numeric id and lifecycle state of a session.
/// Ownership is derived through the presented upload.
pub async fn owner_of(pool: &SqlitePool, public_id: &str) -> Result<SessionOwner, AppError> {
    let row = sqlx::query_as::<_, (String, i64, Option<String>)>(
        "SELECT u.user_id, s.id, s.ended FROM sessions s JOIN uploads u ON s.upload_id = u.id WHERE s.public_id = ? LIMIT 1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(unknown_session)?;

    Ok(SessionOwner {
        owner_id: row.0,
        session_id: row.1,
        ended: row.2,
    })
}

/// Sets the ended timestamp. Returns `true` only when this call moved the
/// session from open to ended; an already ended session is left untouched.
pub async fn mark_ended(pool: &SqlitePool, public_id: &str) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE sessions SET ended = datetime('now') WHERE public_id = ? AND ended IS NULL",
    )
    .bind(public_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Deletes a session; its commands go with it through the foreign key cascade.
pub async fn delete_session(pool: &SqlitePool, public_id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE public_id = ?")
        .bind(public_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(unknown_session());
    }
    Ok(())
}

/// Current ended timestamp of a session by numeric id.
pub async fn ended_at(pool: &SqlitePool, session_id: i64) -> Result<Option<String>, AppError> {
    let ended = sqlx::query_scalar::<_, Option<String>>("SELECT ended FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(unknown_session)?;
    Ok(ended)
}

pub async fn list_sessions_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<SessionSummary>, AppError> {
    let rows = sqlx::query_as::<_, (String, String, String, Option<String>)>(
        "SELECT s.public_id, u.title, s.started, s.ended FROM sessions s JOIN uploads u ON s.upload_id = u.id WHERE u.user_id = ? ORDER BY s.started DESC, s.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, title, started, ended)| SessionSummary {
            id,
            title,
            started,
            ended,
        })
        .collect())
}

/// Everything a client needs to render a session from scratch.
pub async fn get_session_info(
    pool: &SqlitePool,
    public_id: &str,
    viewer_id: Option<&str>,
) -> Result<SessionInfo, AppError> {
    let row = sqlx::query_as::<_, (i64, String, String, String, Option<String>)>(
        "SELECT s.id, u.title, u.public_id, u.user_id, s.ended FROM sessions s JOIN uploads u ON s.upload_id = u.id WHERE s.public_id = ?",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(unknown_session)?;
    let (session_id, title, upload_id, owner_id, ended) = row;

    let page = db::commands::latest_page(pool, session_id).await?;
    let cmds = db::commands::list_ordered(pool, session_id).await?;

    Ok(SessionInfo {
        title,
        upload_id,
        owner: viewer_id == Some(owner_id.as_str()),
        page,
        ended,
        cmds,
    })
}
