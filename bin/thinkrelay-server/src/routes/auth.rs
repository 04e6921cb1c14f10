//! Account and session routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::audit;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::{UserId, UNKNOWN_USER};
use crate::entities::UserStore;
use crate::error::ServerError;
use crate::schemas::auth::{CredentialsRequest, LoginResponse, RegisterResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(register, login, get_token),
    components(schemas(CredentialsRequest, RegisterResponse, LoginResponse))
)]
pub struct AuthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/getToken", get(get_token))
}

/// Resolve a query-string token to its user, or fail with `bad token`.
pub(crate) fn authorize(
    state: &AppState,
    token: Option<&str>,
) -> Result<(UserId, String), ServerError> {
    token
        .filter(|t| !t.is_empty())
        .and_then(|t| state.tokens.authorize(t))
        .ok_or(ServerError::BadToken)
}

fn check_credentials(req: &CredentialsRequest, action: &str) -> Result<(), ServerError> {
    let who = if req.username.is_empty() { UNKNOWN_USER } else { req.username.as_str() };
    if !req.is_complete() {
        audit::record(who, format!("{action} failed: missing credentials"));
        return Err(ServerError::MissingInput("missing credentials"));
    }
    if let Err(e) = req.validate() {
        audit::record(who, format!("{action} failed: invalid credentials format"));
        return Err(e.into());
    }
    Ok(())
}

// ── Register ──────────────────────────────────────────────────────────────────

/// Create an account.
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created", body = RegisterResponse),
        (status = 400, description = "Missing or invalid credentials"),
        (status = 409, description = "Username already exists"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ServerError> {
    check_credentials(&req, "registration")?;
    audit::record(&req.username, "attempting registration");

    if state.store.find_by_username(&req.username).await?.is_some() {
        audit::record(&req.username, "registration failed: username already exists");
        return Err(ServerError::Conflict("username exists"));
    }

    let hash = hash_password(req.password).await?;
    // The lookup above is only a fast path; the UNIQUE constraint decides races.
    let Some(user_id) = state.store.insert_user(&req.username, &hash).await? else {
        audit::record(&req.username, "registration failed: username already exists");
        return Err(ServerError::Conflict("username exists"));
    };

    audit::record(&req.username, format!("registration successful with ID: {user_id}"));
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { message: "user registered".to_owned(), user_id }),
    ))
}

// ── Login ─────────────────────────────────────────────────────────────────────

/// Exchange credentials for a short-lived session token.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Unknown user or wrong password"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    check_credentials(&req, "login")?;
    audit::record(&req.username, "attempting login");

    let Some(user) = state.store.find_by_username(&req.username).await? else {
        audit::record(&req.username, "login failed: user not found");
        return Err(ServerError::InvalidCredentials);
    };

    if !verify_password(req.password, user.password).await? {
        audit::record(&req.username, "login failed: incorrect password");
        return Err(ServerError::InvalidCredentials);
    }

    let token = state.tokens.issue(user.id, &user.username);
    audit::record(&user.username, "login successful");
    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
        username: user.username,
        expires_in: state.tokens.ttl().as_secs(),
    }))
}

// ── Token hint ────────────────────────────────────────────────────────────────

/// Tokens are only handed out by `/login`; this always answers 401.
#[utoipa::path(
    get,
    path = "/getToken",
    tag = "auth",
    responses((status = 401, description = "Login required"))
)]
pub async fn get_token() -> ServerError {
    audit::record("visitor", "unauthorized token request");
    ServerError::LoginRequired
}

// ── Tests ──────────────────────────────────────────────────────────────────────
