use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(anyhow::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("forbidden: {detail}")]
    Forbidden {
        detail: String,
        permission: Option<String>,
    },

    #[error("not found: {0}")]
    NotFound(anyhow::Error),

    #[error("already exists: {0}")]
    AlreadyExists(anyhow::Error),

    #[error("validation error: {0}")]
    Validation(anyhow::Error),

    #[error("conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(anyhow::Error::new(err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

/// One JSON:API error object.
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub status: String,
    pub code: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

/// JSON:API error document: `{"errors": [...]}`.
#[derive(Debug, Serialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

impl ErrorDocument {
    pub fn single(
        status: StatusCode,
        code: &str,
        title: &str,
        detail: Option<String>,
        permission: Option<String>,
    ) -> Self {
        Self {
            errors: vec![ErrorObject {
                status: status.as_u16().to_string(),
                code: code.to_string(),
                title: title.to_string(),
                detail,
                permission,
            }],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, title, detail, permission) = match self {
            // Always the same opaque body; the real reason lives in the
            // audit record only.
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Unauthorized",
                Some("invalid credentials".to_string()),
                None,
            ),
            AppError::InvalidToken(err) => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "Unauthorized",
                Some(err.to_string()),
                None,
            ),
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Unauthorized",
                Some(err.to_string()),
                None,
            ),
            AppError::Forbidden { detail, permission } => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Forbidden",
                Some(detail),
                permission,
            ),
            AppError::NotFound(err) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Not Found",
                Some(err.to_string()),
                None,
            ),
            AppError::AlreadyExists(err) => (
                StatusCode::CONFLICT,
                "already_exists",
                "Conflict",
                Some(err.to_string()),
                None,
            ),
            AppError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                "validation",
                "Bad Request",
                Some(err.to_string()),
                None,
            ),
            AppError::Conflict(err) => (
                StatusCode::CONFLICT,
                "conflict",
                "Conflict",
                Some(err.to_string()),
                None,
            ),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error",
                    None,
                    None,
                )
            }
            AppError::Config(err) => {
                tracing::error!(error = %err, "configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error",
                    None,
                    None,
                )
            }
        };

        let body = ErrorDocument::single(status, code, title, detail, permission);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_carries_permission_field() {
        let doc = ErrorDocument::single(
            StatusCode::FORBIDDEN,
            "forbidden",
            "Forbidden",
            Some("missing permission".to_string()),
            Some("users:update".to_string()),
        );
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["errors"][0]["status"], "403");
        assert_eq!(json["errors"][0]["code"], "forbidden");
        assert_eq!(json["errors"][0]["permission"], "users:update");
    }

    #[test]
    fn internal_error_hides_detail() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_credentials_body_is_constant() {
        let a = AppError::InvalidCredentials.into_response();
        let b = AppError::InvalidCredentials.into_response();
        assert_eq!(a.status(), b.status());
        assert_eq!(a.status(), StatusCode::UNAUTHORIZED);
    }
}
