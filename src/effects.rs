use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::command::{Command, CommandKind};

/// Applies the log-mutating effect of a command, if its kind has one.
///
/// `clearSlide` erases every persisted drawing on its page so replay never
/// redraws cleared strokes; navigation stays in the log.
pub async fn apply(pool: &SqlitePool, command: &Command) -> Result<(), AppError> {
    match command.cmd {
        CommandKind::ClearSlide => {
            let removed =
                db::commands::delete_for_clear(pool, command.session_id, command.page).await?;
            tracing::debug!(
                session_id = command.session_id,
                page = command.page,
                "clearSlide removed {removed} command(s)"
            );
            Ok(())
        }
        CommandKind::GotoPage | CommandKind::DrawLine | CommandKind::Close => Ok(()),
    }
}
