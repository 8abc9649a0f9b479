use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::db;
use crate::state::AppState;

/// The principal behind a request, resolved from its bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub token: String,
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accepts either a raw token or an `Authorization` value with the
/// `Bearer ` scheme. Empty tokens count as absent.
pub fn bearer_token(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves a raw token to a principal. Lookup failures are logged and
/// treated as anonymous.
pub async fn resolve_principal(state: &AppState, token: &str) -> Option<AuthUser> {
    match db::auth::resolve_token(&state.db, token).await {
        Ok(user_id) => user_id.map(|user_id| AuthUser {
            user_id,
            token: token.to_string(),
        }),
        Err(e) => {
            tracing::error!("token lookup failed: {e}");
            None
        }
    }
}

fn header_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(bearer_token)
        .map(|s| s.to_string())
}

/// Rejection type for when auth fails.
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": "unauthorized",
                "message": "invalid or missing authentication"
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let state = state.clone();
        let token = header_token(parts);

        async move {
            let Some(token) = token else {
                return Err(AuthRejection);
            };
            resolve_principal(&state, &token).await.ok_or(AuthRejection)
        }
    }
}

/// Optional auth extractor. Returns `Some(AuthUser)` if a valid bearer token
/// is present, `None` otherwise. Never rejects.
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let state = state.clone();
        let token = header_token(parts);

        async move {
            let user = match token {
                Some(token) => resolve_principal(&state, &token).await,
                None => None,
            };
            Ok(OptionalAuthUser(user))
        }
    }
}

/// Helper to create a token hash for token creation.
pub fn create_token_hash(token: &str) -> String {
    hash_token(token)
}

/// Generate a random token string.
pub fn generate_token() -> String {
    let ts = chrono::Utc::now().timestamp_micros();
    let random: u64 = rand::random();
    let salt: u64 = rand::random();
    format!("{ts:x}.{random:016x}{salt:016x}")
}
