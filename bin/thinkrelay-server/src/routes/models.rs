//! Model-list routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::audit;
use crate::auth::{UserId, UNKNOWN_USER};
use crate::error::ServerError;
use crate::routes::auth::authorize;
use crate::schemas::models::{ApiQuery, ModelsResponse, TokenQuery};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_models, legacy_api), components(schemas(ModelsResponse)))]
pub struct ModelsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/models", get(list_models))
        .route("/api", get(legacy_api))
}

fn require_user(state: &AppState, token: Option<&str>) -> Result<(UserId, String), ServerError> {
    authorize(state, token).inspect_err(|_| {
        audit::record(UNKNOWN_USER, "api access with invalid token");
    })
}

/// Models offered by this relay.
#[utoipa::path(
    get,
    path = "/models",
    tag = "models",
    params(TokenQuery),
    responses(
        (status = 200, description = "Configured models", body = ModelsResponse),
        (status = 401, description = "Bad token"),
    )
)]
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<ModelsResponse>, ServerError> {
    let (user_id, username) = require_user(&state, query.token.as_deref())?;
    audit::record(&username, "requested model list");
    Ok(Json(ModelsResponse { models: Some(state.config.models.clone()), user_id }))
}

/// Token check with optional model list (`getModels`).
#[utoipa::path(
    get,
    path = "/api",
    tag = "models",
    params(ApiQuery),
    responses(
        (status = 200, description = "Token accepted", body = ModelsResponse),
        (status = 401, description = "Bad token"),
    )
)]
pub async fn legacy_api(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ApiQuery>,
) -> Result<Json<ModelsResponse>, ServerError> {
    let (user_id, username) = require_user(&state, query.token.as_deref())?;
    let models = match query.get_models.filter(|v| !v.is_empty()) {
        Some(_) => {
            audit::record(&username, "requested model list");
            Some(state.config.models.clone())
        }
        None => {
            audit::record(&username, "api token check");
            None
        }
    };
    Ok(Json(ModelsResponse { models, user_id }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use crate::routes::testing::{call, get, TestApp};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn models_require_valid_token() {
        let app = TestApp::new().await;
        let (status, body) = call(&app.router, get("/models?token=nope")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "bad token");

        let (status, _) = call(&app.router, get("/models")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn models_list_configured_models() {
        let app = TestApp::new().await;
        let (token, user_id) = app.login("dave").await;
        let (status, body) = call(&app.router, get(&format!("/models?token={token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"][0], "reasoner-1");
        assert_eq!(body["userId"].as_i64(), Some(user_id));
    }

    #[tokio::test]
    async fn legacy_api_lists_models_only_when_asked() {
        let app = TestApp::new().await;
        let (token, _) = app.login("erin").await;

        let (_, body) = call(&app.router, get(&format!("/api?token={token}&getModels=true"))).await;
        assert_eq!(body["models"][1], "chat-1");

        let (status, body) = call(&app.router, get(&format!("/api?token={token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("models").is_none());
        assert!(body["userId"].is_i64());
    }
}
