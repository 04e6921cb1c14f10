//! Request / response types for the model-list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for `GET /models`.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Query parameters for the legacy `GET /api` endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiQuery {
    pub token: Option<String>,
    /// Any value requests the model list.
    pub get_models: Option<String>,
}

/// Response body of `GET /models` and `GET /api?getModels`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    pub user_id: i64,
}
