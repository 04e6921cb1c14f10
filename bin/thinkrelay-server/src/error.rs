//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON body `{"error": <kind>, "message": <text>}` with an appropriate
//! status code.
//!
//! **Security note:** Internal errors (Upstream, Database, Internal) are
//! logged with full detail but only a generic message is returned to the
//! caller so that provider responses, SQL, or API keys never leak to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::upstream::UpstreamError;

/// All errors that can occur in the thinkrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Session token absent, unknown, or expired.
    #[error("bad token")]
    BadToken,

    /// A required input is absent. Carries the kind, e.g. `"missing prompt"`.
    #[error("{0}")]
    MissingInput(&'static str),

    /// Input present but rejected by validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown user or wrong password; both produce the same response.
    #[error("credentials mismatch")]
    InvalidCredentials,

    /// A uniqueness constraint was hit. Carries the kind, e.g. `"username exists"`.
    #[error("{0}")]
    Conflict(&'static str),

    /// The endpoint exists only to tell the caller to log in.
    #[error("login required")]
    LoginRequired,

    /// The provider refused or could not be reached before streaming began.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable error kind reported in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadToken => "bad token",
            ServerError::MissingInput(kind) | ServerError::Conflict(kind) => *kind,
            ServerError::InvalidInput(_) => "invalid input",
            ServerError::InvalidCredentials => "credentials mismatch",
            ServerError::LoginRequired => "login required",
            ServerError::Upstream(_) => "upstream error",
            ServerError::Database(_) | ServerError::Internal(_) => "internal error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadToken
            | ServerError::InvalidCredentials
            | ServerError::LoginRequired => StatusCode::UNAUTHORIZED,
            ServerError::MissingInput(_) | ServerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Upstream(_) | ServerError::Database(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let client_message = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadToken
            | ServerError::MissingInput(_)
            | ServerError::InvalidInput(_)
            | ServerError::InvalidCredentials
            | ServerError::Conflict(_)
            | ServerError::LoginRequired => self.to_string(),

            // Internal errors: log the full detail, return a generic message.
            ServerError::Upstream(e) => {
                error!(error = %e, "upstream error before streaming");
                "the model provider could not serve this request".to_owned()
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                "internal server error".to_owned()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };
        (
            self.status(),
            Json(json!({ "error": self.kind(), "message": client_message })),
        )
            .into_response()
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::InvalidInput(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_expose_kind_and_message() {
        let (status, body) = render(ServerError::BadToken).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "bad token");

        let (status, body) = render(ServerError::MissingInput("missing prompt")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing prompt");

        let (status, body) = render(ServerError::Conflict("username exists")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "username exists");
    }

    #[tokio::test]
    async fn upstream_detail_is_not_leaked() {
        let err = ServerError::from(UpstreamError::Rejected {
            status: 401,
            body: "invalid api key sk-secret".into(),
        });
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "upstream error");
        assert!(!body.to_string().contains("sk-secret"));
    }

    #[tokio::test]
    async fn internal_errors_are_generic() {
        let (status, body) = render(ServerError::Internal("disk on fire".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");
    }
}
