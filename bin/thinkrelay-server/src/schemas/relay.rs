//! Query parameters of the relay endpoint.

use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters for `GET /relay` (and its alias `/openai-stream`).
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct RelayQuery {
    /// Session token from `/login`.
    pub token: Option<String>,
    /// Model name; the first configured model when absent.
    pub model: Option<String>,
    /// Either a JSON array of `{role, content}` messages or plain text, which
    /// is sent as a single user message.
    pub prompt: Option<String>,
}
