mod auth;
mod health;
mod sessions;
mod uploads;
mod users;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(crate::gateway::ws_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth (register/login are public, logout requires auth)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        // Users
        .route("/users/@me", get(users::get_current_user))
        // Uploads
        .route(
            "/uploads",
            get(uploads::list_uploads).post(uploads::create_upload),
        )
        .route(
            "/uploads/{upload_id}",
            patch(uploads::update_upload).delete(uploads::delete_upload),
        )
        // Sessions
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::start_session),
        )
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{session_id}/stop", post(sessions::stop_session))
        // Version
        .route("/version", get(health::version))
}
