//! Service layer errors.

use telhawk_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database call timed out")]
    DatabaseTimeout,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {detail}")]
    Forbidden {
        detail: String,
        permission: Option<String>,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    /// Denied-by-policy error naming the permission that was checked.
    pub fn missing_permission(permission: &str) -> Self {
        ServiceError::Forbidden {
            detail: format!("missing permission {}", permission),
            permission: Some(permission.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => {
                AppError::Internal(anyhow::anyhow!("Database error: {}", e))
            }
            ServiceError::DatabaseTimeout => {
                AppError::Internal(anyhow::anyhow!("Database call timed out"))
            }
            ServiceError::Internal(e) => AppError::Internal(e),
            ServiceError::InvalidCredentials => AppError::InvalidCredentials,
            ServiceError::InvalidToken => {
                AppError::InvalidToken(anyhow::anyhow!("invalid token"))
            }
            ServiceError::Unauthorized => {
                AppError::Unauthorized(anyhow::anyhow!("unauthorized"))
            }
            ServiceError::Forbidden { detail, permission } => {
                AppError::Forbidden { detail, permission }
            }
            ServiceError::NotFound(what) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", what))
            }
            ServiceError::AlreadyExists(what) => {
                AppError::AlreadyExists(anyhow::anyhow!("{} already exists", what))
            }
            ServiceError::Validation(msg) => AppError::Validation(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
        }
    }
}
