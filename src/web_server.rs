use axum::{
    extract::State,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::session::SessionAuthenticator;
use crate::users::{self, UserSummary};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub sessions: Arc<SessionAuthenticator>,
    pub app_config: AppConfig,
}

#[derive(OpenApi)]
#[openapi(
    paths(auth::register, auth::login, auth::logout, list_users),
    components(schemas(
        auth::RegisterPayload,
        auth::Credentials,
        auth::TokenResponse,
        UserSummary
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn run_server(app_state: AppState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        app_state.app_config.web.addr, app_state.app_config.web.port
    );
    let app = create_router(app_state);
    tracing::info!("Serving API at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

pub fn create_router(app_state: AppState) -> Router {
    let cors = match app_state.app_config.web.cors_origin.parse::<HeaderValue>() {
        Ok(origin) if app_state.app_config.web.cors_origin != "*" => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any),
        _ => CorsLayer::permissive(),
    };

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Everything below the middleware requires a live session
    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(home))
        .nest("/api/v1", auth_routes.merge(protected_routes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

// --- API Handlers ---

/// Liveness probe, also handy as a quick smoke test.
async fn home() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello world" }))
}

/// ## List all registered users
/// Every authenticated caller sees every user.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All registered users", body = [UserSummary]),
        (status = 401, description = "Authentication required"),
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    tracing::info!("Listing users for {}", user.email);
    let users = users::list_all(&state.db_pool).await?;

    Ok(Json(users))
}
