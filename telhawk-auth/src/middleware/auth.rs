//! Bearer extraction and principal loading.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use telhawk_core::error::AppError;

use crate::middleware::request_context;
use crate::models::User;
use crate::services::ServiceError;
use crate::AppState;

/// RBAC-enriched principal placed in the request context after validation,
/// together with the staleness information from the validate step.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
    pub permissions_version: i64,
    pub permissions_stale: bool,
}

/// Middleware: reject requests without a valid bearer credential, then load
/// the principal with its grants into the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let ctx = request_context(&req);
    let result = state
        .auth
        .validate_token(token, &ctx)
        .await
        .map_err(AppError::from)?;

    if !result.valid {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid or revoked token"
        )));
    }

    let user_id = result
        .user_id
        .as_deref()
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid subject")))?;

    let user = match state.db.get_user_with_roles(user_id).await {
        Ok(user) => user,
        Err(ServiceError::NotFound(_)) => {
            return Err(AppError::Unauthorized(anyhow::anyhow!("Unknown principal")));
        }
        Err(e) => return Err(AppError::from(e)),
    };

    req.extensions_mut().insert(CurrentUser {
        user,
        permissions_version: result.permissions_version.unwrap_or_default(),
        permissions_stale: result.permissions_stale.unwrap_or_default(),
    });

    Ok(next.run(req).await)
}

/// Extractor for the loaded principal in handlers.
pub struct AuthUser(pub CurrentUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current = parts.extensions.get::<CurrentUser>().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Principal missing from request extensions"
            ))
        })?;

        Ok(AuthUser(current.clone()))
    }
}
