mod common;

use axum::body::Body;
use common::{
    authenticated_json_request, authenticated_request, json_request, parse_body, TestServer,
};
use http::{Method, Request, StatusCode};
use slidecast::bus::SessionBus;
use slidecast::db;
use slidecast::models::command::{Command, CommandKind};
use tower::ServiceExt;

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new().await;
    let response = server
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = TestServer::new().await;
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/version")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = parse_body(response).await;
    assert_eq!(json["name"], "slidecast");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_not_found() {
    let server = TestServer::new().await;
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_login_logout() {
    let server = TestServer::new().await;
    let creds = serde_json::json!({ "username": "ada", "password": "correct horse" });

    let response = server
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/auth/register", &creds))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = parse_body(response).await;
    assert_eq!(json["data"]["user"]["username"], "ada");
    assert!(json["data"]["token"].is_string());

    let response = server
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/auth/login", &creds))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = parse_body(response).await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    let header = format!("Bearer {token}");

    let response = server
        .router()
        .oneshot(authenticated_request(Method::GET, "/api/v1/users/@me", &header))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_body(response).await["data"]["username"], "ada");

    let response = server
        .router()
        .oneshot(authenticated_request(Method::POST, "/api/v1/auth/logout", &header))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .router()
        .oneshot(authenticated_request(Method::GET, "/api/v1/users/@me", &header))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_duplicate_username_conflicts() {
    let server = TestServer::new().await;
    let creds = serde_json::json!({ "username": "ada", "password": "correct horse" });
    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let response = server
            .router()
            .oneshot(json_request(Method::POST, "/api/v1/auth/register", &creds))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let server = TestServer::new().await;
    let creds = serde_json::json!({ "username": "ada", "password": "short" });
    let response = server
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/auth/register", &creds))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(parse_body(response).await["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let server = TestServer::new().await;
    let creds = serde_json::json!({ "username": "ada", "password": "correct horse" });
    server
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/auth/register", &creds))
        .await
        .unwrap();

    let wrong = serde_json::json!({ "username": "ada", "password": "battery staple" });
    let response = server
        .router()
        .oneshot(json_request(Method::POST, "/api/v1/auth/login", &wrong))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_auth_is_unauthorized() {
    let server = TestServer::new().await;
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(parse_body(response).await["error"]["code"], "unauthorized");
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_upload_crud() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let auth = owner.auth_header();

    let response = server
        .router()
        .oneshot(authenticated_json_request(
            Method::POST,
            "/api/v1/uploads",
            &auth,
            &serde_json::json!({ "title": "Quarterly review" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let upload_id = parse_body(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .router()
        .oneshot(authenticated_json_request(
            Method::PATCH,
            &format!("/api/v1/uploads/{upload_id}"),
            &auth,
            &serde_json::json!({ "title": "Q3 review" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_body(response).await["data"]["title"], "Q3 review");

    let response = server
        .router()
        .oneshot(authenticated_request(Method::GET, "/api/v1/uploads", &auth))
        .await
        .unwrap();
    let list = parse_body(response).await;
    assert_eq!(list["data"].as_array().unwrap().len(), 1);

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::DELETE,
            &format!("/api/v1/uploads/{upload_id}"),
            &auth,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = server
        .router()
        .oneshot(authenticated_request(Method::GET, "/api/v1/uploads", &auth))
        .await
        .unwrap();
    assert!(parse_body(response).await["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_someone_elses_upload_is_not_found() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let stranger = server.create_user_with_token("stranger").await;
    let upload_id = server.create_upload(&owner.user.id, "deck").await;

    let response = server
        .router()
        .oneshot(authenticated_json_request(
            Method::PATCH,
            &format!("/api/v1/uploads/{upload_id}"),
            &stranger.auth_header(),
            &serde_json::json!({ "title": "mine now" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_upload_closes_its_live_sessions() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let upload = db::uploads::create_upload(server.pool(), &owner.user.id, "deck")
        .await
        .unwrap();
    let session = db::sessions::create_session(server.pool(), upload.id)
        .await
        .unwrap();
    let mut spectator = server.state.bus.subscribe(session.id);

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::DELETE,
            &format!("/api/v1/uploads/{}", upload.public_id),
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(spectator.recv().await.unwrap().is_close());
    assert!(spectator.recv().await.is_none());
    assert!(matches!(
        db::sessions::get_session(server.pool(), &session.public_id).await,
        Err(slidecast::error::AppError::NotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_session_and_read_it_back() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let upload_id = server.create_upload(&owner.user.id, "Kickoff").await;

    let response = server
        .router()
        .oneshot(authenticated_json_request(
            Method::POST,
            "/api/v1/sessions",
            &owner.auth_header(),
            &serde_json::json!({ "upload_id": upload_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let session_id = parse_body(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(session_id.len(), slidecast::ids::PUBLIC_ID_LEN);

    // owner view
    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_id}"),
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let info = parse_body(response).await;
    assert_eq!(info["data"]["title"], "Kickoff");
    assert_eq!(info["data"]["upload_id"], upload_id.as_str());
    assert_eq!(info["data"]["owner"], true);
    assert_eq!(info["data"]["page"], 1);
    assert!(info["data"]["cmds"].as_array().unwrap().is_empty());

    // anonymous view
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(parse_body(response).await["data"]["owner"], false);

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::GET,
            "/api/v1/sessions",
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    let list = parse_body(response).await;
    assert_eq!(list["data"][0]["id"], session_id.as_str());
    assert_eq!(list["data"][0]["title"], "Kickoff");
}

#[tokio::test]
async fn test_start_session_on_foreign_upload_is_not_found() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let stranger = server.create_user_with_token("stranger").await;
    let upload_id = server.create_upload(&owner.user.id, "deck").await;

    let response = server
        .router()
        .oneshot(authenticated_json_request(
            Method::POST,
            "/api/v1/sessions",
            &stranger.auth_header(),
            &serde_json::json!({ "upload_id": upload_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let server = TestServer::new().await;
    let response = server
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/v1/sessions/doesnotexist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_owner_cannot_stop_or_delete() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let stranger = server.create_user_with_token("stranger").await;
    let session_id = server.create_session(&owner.user.id).await;

    for (method, uri) in [
        (Method::POST, format!("/api/v1/sessions/{session_id}/stop")),
        (Method::DELETE, format!("/api/v1/sessions/{session_id}")),
    ] {
        let response = server
            .router()
            .oneshot(authenticated_request(method, &uri, &stranger.auth_header()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(parse_body(response).await["error"]["code"], "forbidden");
    }

    let ctx = slidecast::role::resolve(server.pool(), &session_id, None)
        .await
        .unwrap();
    assert!(ctx.ended.is_none());
}

#[tokio::test]
async fn test_stop_session_publishes_close_once() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let session_id = server.create_session(&owner.user.id).await;
    let ctx = slidecast::role::resolve(server.pool(), &session_id, None)
        .await
        .unwrap();
    let mut spectator = server.state.bus.subscribe(ctx.session_id);

    let stop = format!("/api/v1/sessions/{session_id}/stop");
    let response = server
        .router()
        .oneshot(authenticated_request(Method::POST, &stop, &owner.auth_header()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert!(spectator.recv().await.unwrap().is_close());
    assert!(spectator.recv().await.is_none());

    // a second stop is a no-op and reaches nobody
    let late = server.state.bus.subscribe(ctx.session_id);
    let response = server
        .router()
        .oneshot(authenticated_request(Method::POST, &stop, &owner.auth_header()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.state.bus.subscriber_count(ctx.session_id), 1);
    assert!(late.end_reason().is_none());

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::GET,
            &format!("/api/v1/sessions/{session_id}"),
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    assert!(parse_body(response).await["data"]["ended"].is_string());
}

#[tokio::test]
async fn test_delete_session_cascades_and_closes() {
    let server = TestServer::new().await;
    let owner = server.create_user_with_token("owner").await;
    let session_id = server.create_session(&owner.user.id).await;
    let ctx = slidecast::role::resolve(server.pool(), &session_id, None)
        .await
        .unwrap();
    db::commands::insert(
        server.pool(),
        &Command::new(ctx.session_id, CommandKind::GotoPage, 2),
    )
    .await
    .unwrap();
    let mut spectator = server.state.bus.subscribe(ctx.session_id);

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::DELETE,
            &format!("/api/v1/sessions/{session_id}"),
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(spectator.recv().await.unwrap().is_close());

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commands WHERE session_id = ?")
        .bind(ctx.session_id)
        .fetch_one(server.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let response = server
        .router()
        .oneshot(authenticated_request(
            Method::DELETE,
            &format!("/api/v1/sessions/{session_id}"),
            &owner.auth_header(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
