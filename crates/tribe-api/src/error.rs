//! API error handling
//!
//! `AppError` is the only place error kinds become HTTP status codes. Every
//! response body it produces has the shape `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tribe_core::{Capability, RecordKind, StoreError};
use utoipa::ToSchema;

use crate::auth::jwt::CodecError;
use crate::auth::password::PasswordError;

pub const WRONG_CREDENTIALS: &str = "Wrong email/password combination";
pub const MISSING_TOKEN: &str = "Authorization token is required";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const DUPLICATE_ACCOUNT: &str = "An account with that email exist already";
pub const INVALID_BODY: &str = "Invalid request body";
const INTERNAL: &str = "Internal server error";

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
}

/// Application error type
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    /// Client input failed a payload rule
    Validation(String),
    /// Sign-in mismatch, unknown email or wrong password alike
    InvalidCredentials,
    /// No bearer credential on a protected route
    Unauthenticated,
    /// Bearer credential malformed, forged or expired
    InvalidCredential,
    Forbidden(Capability),
    Conflict(String),
    NotFound(String),
    BadRequest(String),
    /// Detail is logged, never returned
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidCredentials | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthenticated | AppError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg) => msg.clone(),
            AppError::InvalidCredentials => WRONG_CREDENTIALS.to_string(),
            AppError::Unauthenticated => MISSING_TOKEN.to_string(),
            AppError::InvalidCredential => INVALID_TOKEN.to_string(),
            AppError::Forbidden(capability) => {
                format!("Access denied: requires the {capability} capability")
            }
            AppError::Internal(_) => INTERNAL.to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Internal(detail) => write!(f, "{INTERNAL}: {detail}"),
            other => f.write_str(&other.message()),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Request failed");
        }

        let body = ErrorBody {
            error: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                kind: RecordKind::Account,
                ..
            } => AppError::Conflict(DUPLICATE_ACCOUNT.to_string()),
            StoreError::Duplicate { kind, .. } => AppError::Conflict(format!("{kind} already exists")),
            StoreError::NotFound { kind, id } => AppError::NotFound(format!("{kind} {id} not found")),
            StoreError::Backend(detail) => AppError::Internal(detail),
        }
    }
}

impl From<CodecError> for AppError {
    fn from(err: CodecError) -> Self {
        if err.is_rejection() {
            AppError::InvalidCredential
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_uniform_body_shape() {
        let (status, body) = render(AppError::Validation("Name cannot be empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Name cannot be empty"}));
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let (status, body) = render(AppError::Internal("connection refused on 10.0.0.4".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_forbidden_names_capability() {
        let (status, body) = render(AppError::Forbidden(Capability::CreateCommunity)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["error"],
            "Access denied: requires the create_community capability"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredential.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Conflict(String::new()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound(String::new()).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_store_error_mapping() {
        let duplicate = StoreError::Duplicate {
            kind: RecordKind::Account,
            detail: "johndoe@example.com".to_string(),
        };
        assert_eq!(
            AppError::from(duplicate),
            AppError::Conflict(DUPLICATE_ACCOUNT.to_string())
        );

        let backend = StoreError::Backend("pool timed out".to_string());
        assert!(matches!(AppError::from(backend), AppError::Internal(_)));
    }

    #[test]
    fn test_codec_rejections_collapse() {
        assert_eq!(AppError::from(CodecError::Expired), AppError::InvalidCredential);
        assert_eq!(AppError::from(CodecError::BadSignature), AppError::InvalidCredential);
        assert_eq!(AppError::from(CodecError::Malformed), AppError::InvalidCredential);
    }
}
