use sqlx::{Row, SqlitePool};

use crate::error::AppError;
use crate::ids;
use crate::models::upload::Upload;

fn row_to_upload(row: sqlx::sqlite::SqliteRow) -> Upload {
    Upload {
        id: row.get("id"),
        public_id: row.get("public_id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        uploaded: row.get("uploaded"),
    }
}

const SELECT_UPLOADS: &str = "SELECT id, public_id, user_id, title, uploaded FROM uploads";

pub async fn create_upload(pool: &SqlitePool, user_id: &str, title: &str) -> Result<Upload, AppError> {
    let public_id = ids::public_id();

    sqlx::query("INSERT INTO uploads (public_id, user_id, title) VALUES (?, ?, ?)")
        .bind(&public_id)
        .bind(user_id)
        .bind(title)
        .execute(pool)
        .await?;

    get_owned_upload(pool, &public_id, user_id).await
}

/// Looks an upload up by public id, scoped to its owner. Someone else's
/// upload is reported as unknown.
pub async fn get_owned_upload(
    pool: &SqlitePool,
    public_id: &str,
    user_id: &str,
) -> Result<Upload, AppError> {
    let row = sqlx::query(&format!(
        "{SELECT_UPLOADS} WHERE public_id = ? AND user_id = ?"
    ))
    .bind(public_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("unknown_upload".to_string()))?;

    Ok(row_to_upload(row))
}

pub async fn list_uploads_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Upload>, AppError> {
    let rows = sqlx::query(&format!(
        "{SELECT_UPLOADS} WHERE user_id = ? ORDER BY uploaded DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_upload).collect())
}

pub async fn rename_upload(
    pool: &SqlitePool,
    public_id: &str,
    user_id: &str,
    title: &str,
) -> Result<Upload, AppError> {
    let result = sqlx::query("UPDATE uploads SET title = ? WHERE public_id = ? AND user_id = ?")
        .bind(title)
        .bind(public_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("unknown_upload".to_string()));
    }
    get_owned_upload(pool, public_id, user_id).await
}

/// Deletes an upload together with its sessions and their commands.
/// Returns the numeric ids of sessions that were still open.
pub async fn delete_upload(
    pool: &SqlitePool,
    public_id: &str,
    user_id: &str,
) -> Result<Vec<i64>, AppError> {
    let upload = get_owned_upload(pool, public_id, user_id).await?;

    let open_sessions = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM sessions WHERE upload_id = ? AND ended IS NULL",
    )
    .bind(upload.id)
    .fetch_all(pool)
    .await?;

    sqlx::query("DELETE FROM uploads WHERE id = ?")
        .bind(upload.id)
        .execute(pool)
        .await?;

    Ok(open_sessions)
}
