//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with
//!   `THINKRELAY_ENABLE_SWAGGER=false`)
//! - Health, account, model-list and relay routes
//! - Optional static asset directory as the fallback service

pub(crate) mod auth;
pub mod doc;
mod health;
mod models;
pub(crate) mod relay;

use std::sync::Arc;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tracing::info;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors_layer, trace_middleware};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(models::router())
        .merge(relay::router());

    // ── Swagger UI ────────────────────────────────────────────────────────────
    if state.config.enable_swagger {
        let swagger = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs());
        app = app.merge(swagger);
    }

    if let Some(dir) = &state.config.static_dir {
        info!(dir = %dir.display(), "serving static assets");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors_layer(&state.config)))
        .layer(middleware::from_fn(trace_middleware))
        .with_state(state)
}

// ── Test harness ──────────────────────────────────────────────────────────────


#[cfg(test)]
mod test {
    use super::testing::{call, get, TestApp};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn unknown_path_is_404_without_static_dir() {
        let app = TestApp::new().await;
        let (status, _) = call(&app.router, get("/index.html")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_greeting_is_plain_text() {
        let app = TestApp::new().await;
        let (status, body) = call(&app.router, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_str().unwrap().starts_with("Hello World"));
    }
}
