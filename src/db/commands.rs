use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::models::command::{Command, CommandKind};

fn row_to_command(row: sqlx::sqlite::SqliteRow) -> Option<Command> {
    let kind: String = row.get("cmd");
    let Some(cmd) = CommandKind::parse(&kind) else {
        tracing::warn!("skipping logged command with unknown kind {kind:?}");
        return None;
    };
    let millis: i64 = row.get("timestamp");
    let coords: Option<String> = row.get("coords");

    Some(Command {
        id: Some(row.get("id")),
        session_id: row.get("session_id"),
        timestamp: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
        cmd,
        page: row.get("page"),
        coords: coords.and_then(|c| serde_json::from_str(&c).ok()),
        color: row.get("color"),
        width: row.get("width"),
        canvas_width: row.get("canvas_width"),
        canvas_height: row.get("canvas_height"),
    })
}

const SELECT_COMMANDS: &str = "SELECT id, session_id, timestamp, cmd, page, coords, color, width, canvas_width, canvas_height FROM commands";

/// Appends a stamped command to the log and returns its id.
pub async fn insert(pool: &SqlitePool, command: &Command) -> Result<i64, AppError> {
    let coords = command
        .coords
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| AppError::Internal(format!("encoding coordinates failed: {e}")))?;

    let result = sqlx::query(
        "INSERT INTO commands (session_id, timestamp, cmd, page, coords, color, width, canvas_width, canvas_height) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(command.session_id)
    .bind(command.timestamp.timestamp_millis())
    .bind(command.cmd.as_str())
    .bind(command.page)
    .bind(&coords)
    .bind(&command.color)
    .bind(command.width)
    .bind(command.canvas_width)
    .bind(command.canvas_height)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Full replay log of a session in `(timestamp, id)` order.
pub async fn list_ordered(pool: &SqlitePool, session_id: i64) -> Result<Vec<Command>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_COMMANDS} WHERE session_id = ? ORDER BY timestamp ASC, id ASC"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(row_to_command).collect())
}

/// Drops everything drawn on one page. Navigation history is kept.
pub async fn delete_for_clear(
    pool: &SqlitePool,
    session_id: i64,
    page: i64,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM commands WHERE session_id = ? AND page = ? AND cmd != ?")
        .bind(session_id)
        .bind(page)
        .bind(CommandKind::GotoPage.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Page of the most recent navigation command, or 1 if there is none.
pub async fn latest_page(pool: &SqlitePool, session_id: i64) -> Result<i64, AppError> {
    let page = sqlx::query_scalar::<_, i64>(
        "SELECT page FROM commands WHERE session_id = ? AND cmd = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
    )
    .bind(session_id)
    .bind(CommandKind::GotoPage.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(page.unwrap_or(1))
}

/// Newest timestamp in a session's log, if it has any entries.
pub async fn latest_timestamp(
    pool: &SqlitePool,
    session_id: i64,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let millis = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(timestamp) FROM commands WHERE session_id = ?",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(millis.and_then(DateTime::from_timestamp_millis))
}
