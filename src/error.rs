use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::auth::{jwt::TokenError, repo::StoreError};

pub type AuthResult<T> = Result<T, AuthError>;

/// One rejected input field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    Validation {
        message: &'static str,
        issues: Vec<FieldIssue>,
    },

    #[error("Email already in use")]
    Conflict,

    /// Same error for unknown email and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    ExpiredToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl AuthError {
    pub fn validation(message: &'static str, issues: Vec<FieldIssue>) -> Self {
        AuthError::Validation { message, issues }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            AuthError::Storage(e) => {
                let detail = format!("{e:#}");
                tracing::error!(error = %detail, "storage error");
            }
            AuthError::Internal(e) => {
                let detail = format!("{e:#}");
                tracing::error!(error = %detail, "internal error");
            }
            AuthError::InvalidCredentials => tracing::warn!("invalid login attempt"),
            AuthError::Forbidden => tracing::warn!("role check failed"),
            _ => tracing::debug!(error = %self, "request rejected"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let body = match &self {
            AuthError::Validation { message, issues } => {
                json!({ "error": message, "issues": issues })
            }
            AuthError::Storage(_) | AuthError::Internal(_) => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        let mut res = (status, Json(body)).into_response();
        if let AuthError::Storage(e) | AuthError::Internal(e) = &self {
            res.extensions_mut().insert(ErrorDetail(format!("{e:#}")));
        }
        res
    }
}

/// Cause chain of a 500, carried on the response but not in its body.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Response mapper that copies [`ErrorDetail`] into the JSON body.
/// Only installed in development.
pub async fn expose_error_detail(mut res: Response) -> Response {
    let Some(ErrorDetail(detail)) = res.extensions_mut().remove::<ErrorDetail>() else {
        return res;
    };
    let status = res.status();
    (
        status,
        Json(json!({ "error": "Internal server error", "detail": detail })),
    )
        .into_response()
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AuthError::Conflict,
            StoreError::Backend(e) => AuthError::Storage(e),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Signing(e) => AuthError::Internal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_lists_issues() {
        let err = AuthError::validation(
            "Invalid signup data",
            vec![FieldIssue::new("email", "Invalid email address")],
        );
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid signup data");
        assert_eq!(body["issues"][0]["field"], "email");
    }

    #[tokio::test]
    async fn expired_and_invalid_tokens_look_the_same() {
        let (s1, b1) = body_json(AuthError::from(TokenError::Expired)).await;
        let (s2, b2) = body_json(AuthError::from(TokenError::Invalid)).await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s1, s2);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn storage_errors_map_to_500_without_raw_message_in_error() {
        let err = AuthError::from(StoreError::Backend(anyhow::anyhow!("connection refused")));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("detail").is_none());
    }

    #[tokio::test]
    async fn detail_is_only_added_by_the_mapper() {
        let err = AuthError::Internal(anyhow::anyhow!("pool timed out"));
        let res = expose_error_detail(err.into_response()).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "pool timed out");

        let res = expose_error_detail(AuthError::Forbidden.into_response()).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn duplicate_email_from_store_is_conflict() {
        let err = AuthError::from(StoreError::DuplicateEmail);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Email already in use");
    }
}
