//! Streaming relay route.
//!
//! `GET /relay?token=…&model=…&prompt=…` validates the caller, opens one
//! upstream completion and streams it back as phase-tagged SSE events. The
//! historical path `/openai-stream` is served by the same handler.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thinkrelay_proto::ChatMessage;
use tracing::info;
use utoipa::OpenApi;

use crate::audit;
use crate::auth::UNKNOWN_USER;
use crate::error::ServerError;
use crate::relay::{into_sse, relay_events};
use crate::routes::auth::authorize;
use crate::schemas::relay::RelayQuery;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(relay))]
pub struct RelayApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay", get(relay))
        .route("/openai-stream", get(relay))
}

/// Interpret the `prompt` parameter.
///
/// A JSON array of messages is used as the conversation; anything else is
/// sent verbatim as a single user message.
pub fn parse_prompt(raw: &str) -> Vec<ChatMessage> {
    serde_json::from_str::<Vec<ChatMessage>>(raw).unwrap_or_else(|_| vec![ChatMessage::user(raw)])
}

/// Stream a completion as SSE.
///
/// Events are `data:` lines: `<think>`, reasoning chunks, `</think>`, answer
/// chunks, then `[DONE]`, or `[ERROR] <reason>` when the provider fails
/// mid-stream. Line breaks inside chunks arrive as `\n` / `\r` escapes.
#[utoipa::path(
    get,
    path = "/relay",
    tag = "relay",
    params(RelayQuery),
    responses(
        (
            status = 200,
            description = "Event stream",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 400, description = "Missing prompt or model"),
        (status = 401, description = "Bad token"),
        (status = 500, description = "Upstream error"),
    )
)]
pub async fn relay(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RelayQuery>,
) -> Result<Response, ServerError> {
    let (user_id, username) = authorize(&state, query.token.as_deref()).inspect_err(|_| {
        audit::record(UNKNOWN_USER, "relay rejected: bad token");
    })?;

    let messages = query
        .prompt
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(parse_prompt)
        .filter(|m| !m.is_empty());
    let Some(messages) = messages else {
        audit::record(&username, "relay rejected: missing prompt");
        return Err(ServerError::MissingInput("missing prompt"));
    };

    let model = query
        .model
        .filter(|m| !m.is_empty())
        .or_else(|| state.config.default_model().map(str::to_owned));
    let Some(model) = model else {
        audit::record(&username, "relay rejected: no model configured");
        return Err(ServerError::MissingInput("missing model"));
    };

    audit::record(&username, format!("relay request with model: {model}"));
    let deltas = match state.upstream.open(&model, &messages).await {
        Ok(deltas) => deltas,
        Err(e) => {
            audit::record(&username, format!("relay failed: {}", e.reason()));
            return Err(e.into());
        }
    };
    info!(user_id, %model, turns = messages.len(), "relay stream started");

    let sse = into_sse(relay_events(deltas), username);
    Ok(([(header::CONNECTION, "keep-alive")], sse).into_response())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
