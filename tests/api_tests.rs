use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt; // for .collect()
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower::ServiceExt; // for .oneshot()

use keystone::config::{AppConfig, DatabaseConfig, JwtConfig, WebConfig};
use keystone::session::{InMemorySessionStore, SessionAuthenticator};
use keystone::web_server::{create_router, AppState};

/// Build a router backed by a fresh in-memory database.
async fn spawn_app(token_ttl_minutes: i64) -> Router {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    // A single connection, otherwise each checkout would see a different
    // empty in-memory database.
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options)
        .await
        .expect("Failed to create in-memory database pool.");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run migrations on test database.");

    let app_config = AppConfig {
        web: WebConfig {
            addr: "127.0.0.1".to_string(),
            port: 0,
            cors_origin: "*".to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
        },
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            token_ttl_minutes,
        },
    };

    let sessions = Arc::new(SessionAuthenticator::new(
        &app_config.jwt.secret,
        token_ttl_minutes,
        Arc::new(InMemorySessionStore::default()),
    ));

    create_router(AppState {
        db_pool,
        sessions,
        app_config,
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("Response body was not valid JSON")
}

async fn register(app: &Router, name: &str, email: &str, password: &str) -> StatusCode {
    let payload = json!({ "name": name, "email": email, "password": password });
    let response = app
        .clone()
        .oneshot(post_json("/api/v1/register", &payload))
        .await
        .unwrap();
    response.status()
}

/// Register + login a user and return their session token.
async fn login(app: &Router, email: &str, password: &str) -> String {
    let payload = json!({ "email": email, "password": password });
    let response = app
        .clone()
        .oneshot(post_json("/api/v1/login", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK, "Login failed");

    let body = body_json(response).await;
    body["access_token"]
        .as_str()
        .expect("Login response had no access_token")
        .to_string()
}

#[tokio::test]
async fn home_returns_hello() {
    let app = spawn_app(60).await;

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Hello world");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = spawn_app(60).await;

    assert_eq!(
        register(&app, "Alice", "alice@example.com", "password123").await,
        StatusCode::OK
    );
    assert_eq!(
        register(&app, "Alice Again", "alice@example.com", "different-pass").await,
        StatusCode::CONFLICT
    );

    // No duplicate record is observable: the listing holds exactly one entry
    // for the address.
    let token = login(&app, "alice@example.com", "password123").await;
    let response = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let users = body_json(response).await;
    let matching: Vec<&Value> = users
        .as_array()
        .unwrap()
        .iter()
        .filter(|u| u["email"] == "alice@example.com")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0]["name"], "Alice");
}

#[tokio::test]
async fn register_rejects_invalid_email() {
    let app = spawn_app(60).await;

    let payload = json!({ "name": "Bob", "email": "not-an-email", "password": "p1" });
    let response = app
        .oneshot(post_json("/api/v1/register", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app(60).await;
    register(&app, "Alice", "alice@example.com", "password123").await;

    let unknown = app
        .clone()
        .oneshot(post_json(
            "/api/v1/login",
            &json!({ "email": "missing@example.com", "password": "anything" }),
        ))
        .await
        .unwrap();
    let wrong_password = app
        .clone()
        .oneshot(post_json(
            "/api/v1/login",
            &json!({ "email": "alice@example.com", "password": "wrong" }),
        ))
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    // Same status is not enough: the bodies must carry no distinguishing
    // signal either.
    assert_eq!(body_json(unknown).await, body_json(wrong_password).await);
}

#[tokio::test]
async fn full_session_lifecycle() {
    let app = spawn_app(60).await;

    assert_eq!(
        register(&app, "A", "a@x.com", "p1").await,
        StatusCode::OK
    );
    let token = login(&app, "a@x.com", "p1").await;

    // The listing is visible while the session is live
    let response = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    assert!(users
        .as_array()
        .unwrap()
        .iter()
        .any(|u| u["name"] == "A" && u["email"] == "a@x.com"));

    // Logout succeeds once
    let response = app
        .clone()
        .oneshot(post_with_token("/api/v1/logout", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The very same token is now rejected, even though its signature and
    // expiry are still fine.
    let response = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn second_logout_with_same_token_is_unauthorized() {
    let app = spawn_app(60).await;
    register(&app, "Alice", "alice@example.com", "password123").await;
    let token = login(&app, "alice@example.com", "password123").await;

    let first = app
        .clone()
        .oneshot(post_with_token("/api/v1/logout", &token))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // The middleware rejects the revoked token before the handler could
    // report a missing session.
    let second = app
        .clone()
        .oneshot(post_with_token("/api/v1/logout", &token))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_reject_missing_or_garbage_tokens() {
    let app = spawn_app(60).await;

    let no_token = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/users")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", "not-a-real-token"))
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    // Tokens issued by this app are already past their expiry.
    let app = spawn_app(-5).await;
    register(&app, "Alice", "alice@example.com", "password123").await;
    let token = login(&app, "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn concurrent_sessions_are_independently_revocable() {
    let app = spawn_app(60).await;
    register(&app, "Alice", "alice@example.com", "password123").await;

    let first = login(&app, "alice@example.com", "password123").await;
    let second = login(&app, "alice@example.com", "password123").await;
    assert_ne!(first, second);

    // Logging out the first session leaves the second untouched
    let response = app
        .clone()
        .oneshot(post_with_token("/api/v1/logout", &first))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let revoked = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &first))
        .await
        .unwrap();
    assert_eq!(revoked.status(), StatusCode::UNAUTHORIZED);

    let still_live = app
        .clone()
        .oneshot(get_with_token("/api/v1/users", &second))
        .await
        .unwrap();
    assert_eq!(still_live.status(), StatusCode::OK);
}
