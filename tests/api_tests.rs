//! HTTP-level tests of the user endpoints against the full router.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use stencil::config::{Environment, Settings};
use stencil::core::entity::Lookup;
use stencil::core::repository::Repository;
use stencil::server::{AppBuilder, AppContext, build_router};
use stencil::users::User;
use stencil::users::service::assign_role;

fn setup() -> (TestServer, AppContext) {
    let mut builder = AppBuilder::new().with_settings(Settings::for_environment(Environment::Testing));
    let ctx = builder.build_context().unwrap();
    let server = TestServer::new(build_router(ctx.clone(), Vec::new()));
    (server, ctx)
}

fn registration(username: &str) -> Value {
    json!({
        "username": username,
        "email": format!("{username}@example.com"),
        "password": "secret1",
        "confirm": "secret1"
    })
}

async fn register(server: &TestServer, username: &str) -> Value {
    let response = server.post("/api/user/register").json(&registration(username)).await;
    response.assert_status_ok();
    response.json()
}

/// Log in and return the `data` object
async fn login(server: &TestServer, username: &str) -> Value {
    let response = server
        .post("/api/user/login")
        .json(&json!({"username": username, "password": "secret1"}))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "0", "login failed: {body}");
    body["data"].clone()
}

fn token(data: &Value, key: &str) -> String {
    data[key].as_str().unwrap().to_string()
}

// ============================================================================
// Index and health
// ============================================================================

#[tokio::test]
async fn test_index() {
    let (server, _) = setup();
    let body: Value = server.get("/api/").await.json();
    assert_eq!(body, json!({"hello": "world"}));
}

#[tokio::test]
async fn test_health() {
    let (server, _) = setup();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["backend"], "memory");
}

// ============================================================================
// Register
// ============================================================================

#[tokio::test]
async fn test_register() {
    let (server, _) = setup();
    let body = register(&server, "ann").await;

    assert_eq!(body["code"], "0");
    assert_eq!(body["error"], Value::Null);
    assert_eq!(body["data"]["username"], "ann");
    assert_eq!(body["data"]["email"], "ann@example.com");
    assert_eq!(body["data"]["active"], true);
    assert_eq!(body["data"]["roles"], json!([]));
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("id").is_none());
    let created = body["data"]["created_at"].as_str().unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(created, "%Y-%m-%d %H:%M:%S").is_ok());
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let (server, _) = setup();
    register(&server, "ann").await;

    let body = register(&server, "ann").await;
    assert_eq!(body["code"], "10004");
    assert_eq!(body["data"], Value::Null);
    assert!(body["error"].as_str().unwrap().contains("ann"));
}

#[tokio::test]
async fn test_register_password_mismatch() {
    let (server, _) = setup();
    let mut payload = registration("ann");
    payload["confirm"] = json!("other1");

    let response = server.post("/api/user/register").json(&payload).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "10002");
    assert_eq!(body["error"], json!({"confirm": ["Passwords must match"]}));
}

#[tokio::test]
async fn test_register_reports_every_bad_field() {
    let (server, _) = setup();
    let body: Value = server
        .post("/api/user/register")
        .json(&json!({"username": "ab", "email": "nope", "password": "secret1"}))
        .await
        .json();

    assert_eq!(body["code"], "10002");
    let errors = body["error"].as_object().unwrap();
    assert!(errors.contains_key("username"));
    assert!(errors.contains_key("email"));
    assert_eq!(errors["confirm"], json!(["This field is required."]));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (server, _) = setup();
    let response = server
        .post("/api/user/register")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "10002");
}

// ============================================================================
// Login and current user
// ============================================================================

#[tokio::test]
async fn test_login() {
    let (server, _) = setup();
    register(&server, "ann").await;

    let data = login(&server, "ann").await;
    assert_eq!(data["username"], "ann");
    assert!(data["access_token"].as_str().is_some());
    assert!(data["refresh_token"].as_str().is_some());
}

#[tokio::test]
async fn test_login_failure() {
    let (server, _) = setup();
    register(&server, "ann").await;

    for (username, password) in [("ann", "wrong12"), ("nobody", "secret1")] {
        let body: Value = server
            .post("/api/user/login")
            .json(&json!({"username": username, "password": password}))
            .await
            .json();
        assert_eq!(body["code"], "10001");
        assert_eq!(body["error"], "username or password invalid.");
        assert_eq!(body["data"], Value::Null);
    }
}

#[tokio::test]
async fn test_current_user() {
    let (server, _) = setup();
    register(&server, "ann").await;
    let data = login(&server, "ann").await;

    let body: Value = server
        .get("/api/user/login")
        .authorization_bearer(token(&data, "access_token"))
        .await
        .json();
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"]["username"], "ann");
}

#[tokio::test]
async fn test_current_user_requires_token() {
    let (server, _) = setup();
    let response = server.get("/api/user/login").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "10005");
}

#[tokio::test]
async fn test_refresh_token_cannot_access_user_routes() {
    let (server, _) = setup();
    register(&server, "ann").await;
    let data = login(&server, "ann").await;

    server
        .get("/api/user/login")
        .authorization_bearer(token(&data, "refresh_token"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Logout and refresh
// ============================================================================

#[tokio::test]
async fn test_logout_revokes_token() {
    let (server, _) = setup();
    register(&server, "ann").await;
    let data = login(&server, "ann").await;
    let access = token(&data, "access_token");

    let response = server.post("/api/user/logout").authorization_bearer(&access).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"], json!({}));

    let response = server.get("/api/user/login").authorization_bearer(&access).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "10005");
}

#[tokio::test]
async fn test_logout_ends_refresh_session() {
    let (server, _) = setup();
    register(&server, "ann").await;
    let data = login(&server, "ann").await;

    let refresh = token(&data, "refresh_token");
    let response = server.post("/api/user/refresh").authorization_bearer(&refresh).await;
    let renewed: Value = response.json();
    assert_eq!(renewed["code"], "0");

    server
        .post("/api/user/logout")
        .authorization_bearer(&token(&data, "access_token"))
        .await
        .assert_status_ok();

    let response = server.post("/api/user/refresh").authorization_bearer(&refresh).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "10005");

    // Access tokens minted from the old refresh token die with the session too.
    let minted = renewed["data"]["access_token"].as_str().unwrap();
    server
        .get("/api/user/login")
        .authorization_bearer(minted)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh() {
    let (server, ctx) = setup();
    register(&server, "ann").await;
    let data = login(&server, "ann").await;

    // Roles granted after login show up in refreshed tokens.
    let mut session = ctx.session().await.unwrap();
    let user = Repository::<User>::new(session.as_mut())
        .get(&Lookup::new().eq("username", "ann"))
        .await
        .unwrap()
        .unwrap();
    grant_role(&ctx, &user, "admin").await;

    let body: Value = server
        .post("/api/user/refresh")
        .authorization_bearer(token(&data, "refresh_token"))
        .await
        .json();
    assert_eq!(body["code"], "0");
    let access = token(&body["data"], "access_token");
    let claims = ctx
        .tokens
        .decode(&access, stencil::core::auth::TokenKind::Access)
        .unwrap();
    assert_eq!(claims.roles, vec!["admin"]);

    server
        .post("/api/user/refresh")
        .authorization_bearer(token(&data, "access_token"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

async fn grant_role(ctx: &AppContext, user: &User, role: &str) {
    let mut session = ctx.session().await.unwrap();
    tokio_test::assert_ok!(assign_role(session.as_mut(), user, role).await);
}

// ============================================================================
// Admin listing
// ============================================================================

#[tokio::test]
async fn test_admin_guard() {
    let (server, ctx) = setup();
    register(&server, "ann").await;
    register(&server, "bob").await;

    let plain = login(&server, "bob").await;
    let response = server
        .get("/api/users")
        .authorization_bearer(token(&plain, "access_token"))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "10003");

    let mut session = ctx.session().await.unwrap();
    let ann = Repository::<User>::new(session.as_mut())
        .get(&Lookup::new().eq("username", "ann"))
        .await
        .unwrap()
        .unwrap();
    grant_role(&ctx, &ann, "admin").await;
    let admin = login(&server, "ann").await;

    let body: Value = server
        .get("/api/users")
        .add_query_param("per_page", 1)
        .authorization_bearer(token(&admin, "access_token"))
        .await
        .json();
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["pages"], 2);
    assert_eq!(body["data"]["items"][0]["username"], "ann");
    assert_eq!(body["data"]["items"][0]["roles"][0]["name"], "admin");

    let body: Value = server
        .get("/api/users")
        .add_query_param("per_page", 500)
        .authorization_bearer(token(&admin, "access_token"))
        .await
        .json();
    assert_eq!(body["code"], "10002");

    let body: Value = server
        .get("/api/users")
        .add_query_param("page", i64::MAX)
        .authorization_bearer(token(&admin, "access_token"))
        .await
        .json();
    assert_eq!(body["code"], "0");
    assert_eq!(body["data"]["items"], json!([]));
    assert_eq!(body["data"]["total"], 2);
}
