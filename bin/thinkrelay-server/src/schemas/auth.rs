//! Request / response types for `/register` and `/login`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for `POST /register` and `POST /login`.
///
/// Both fields default to empty so that an absent field is reported as
/// `missing credentials` rather than as a JSON rejection.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CredentialsRequest {
    #[serde(default)]
    #[validate(length(max = 64, message = "username must be at most 64 characters"))]
    pub username: String,

    #[serde(default)]
    #[validate(length(max = 256, message = "password must be at most 256 characters"))]
    pub password: String,
}

impl CredentialsRequest {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Response body for `POST /register` (HTTP 201).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

/// Response body for a successful `POST /login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Opaque bearer token for `/relay` and `/models`.
    pub token: String,
    pub user_id: i64,
    pub username: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absent_fields_are_incomplete_not_invalid() {
        let req: CredentialsRequest = serde_json::from_str(r#"{"username":"a"}"#).unwrap();
        assert!(!req.is_complete());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn overlong_username_fails_validation() {
        let req = CredentialsRequest { username: "x".repeat(65), password: "p".into() };
        assert!(req.validate().is_err());
    }

    #[test]
    fn login_response_uses_camel_case() {
        let body = serde_json::to_value(LoginResponse {
            token: "t".into(),
            user_id: 7,
            username: "alice".into(),
            expires_in: 300,
        })
        .unwrap();
        assert_eq!(body["userId"], 7);
        assert_eq!(body["expiresIn"], 300);
    }
}
