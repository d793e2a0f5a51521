use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::users;
use crate::web_server::AppState;

// --- Payload structs ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterPayload {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

// Login deliberately skips field validation: a syntactically bad email must
// produce the same 401 as a wrong password, not a 400 that leaks which field
// was off.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
}

// --- API Handlers ---

/// ## Register a new user
/// Takes name, email and password, hashes the password, and stores the user.
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterPayload,
    responses(
        (status = 200, description = "User registered successfully"),
        (status = 400, description = "Invalid data provided"),
        (status = 409, description = "User with this email already exists"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    // Validate the incoming payload
    payload.validate()?;

    tracing::info!("Registering user with email: {}", &payload.email);
    let user = users::create_user(
        &state.db_pool,
        &payload.name,
        &payload.email,
        &payload.password,
    )
    .await?;
    tracing::info!("Registered user id {}", user.id);

    Ok(Json(json!({ "message": "User successfully registered" })))
}

/// ## Login an existing user
/// Takes email and password, verifies them, and returns a session token.
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<TokenResponse>, AppError> {
    tracing::info!("Login attempt for {}", &payload.email);

    let user = users::find_by_credentials(&state.db_pool, &payload.email, &payload.password)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let issued = state.sessions.issue(&user.email)?;
    tracing::info!("Issued session {} for {}", issued.jti, user.email);

    Ok(Json(TokenResponse {
        access_token: issued.token,
    }))
}

/// ## Logout
/// Revokes the session identified by the presented token's jti.
#[utoipa::path(
    post,
    path = "/api/v1/logout",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Logout successful"),
        (status = 400, description = "Session not found"),
        (status = 401, description = "Authentication required"),
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Logging out session {}", user.jti);
    state.sessions.revoke(&user.jti)?;

    Ok(Json(json!({ "message": "Successfully logged out" })))
}

// --- Middleware for session authentication ---

pub async fn auth_middleware(
    State(state): State<AppState>,
    auth_header: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = auth_header
        .ok_or(AppError::Unauthorized)?
        .token()
        .to_owned();

    // All three checks (signature, expiry, allow-set membership) run here;
    // handlers behind this middleware can trust the identity outright.
    let session = state.sessions.verify(&token)?;

    request.extensions_mut().insert(AuthUser {
        email: session.subject,
        jti: session.jti,
    });

    Ok(next.run(request).await)
}
