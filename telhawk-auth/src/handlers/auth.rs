//! Auth endpoints: login, refresh, validate, validate-hec, revoke, scope.

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::net::SocketAddr;
use validator::Validate;

use telhawk_core::error::AppError;

use crate::dtos::auth::{
    HecValidateRequest, HecValidateResponse, LoginRequest, RefreshRequest, RevokeRequest,
    ScopeResponse, TokenResponse, ValidateRequest, ValidateResponse,
};
use crate::middleware::{client_ip, AuthUser};
use crate::services::RequestContext;
use crate::AppState;

pub(crate) fn context(headers: &HeaderMap, addr: SocketAddr) -> RequestContext {
    RequestContext {
        source_ip: client_ip(headers, Some(addr)),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_string(),
    }
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    let tokens = state.auth.login(req, &ctx).await?;
    Ok(Json(tokens))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    let tokens = state.auth.refresh(&req.refresh_token, &ctx).await?;
    Ok(Json(tokens))
}

/// POST /auth/validate, the internal token check. Always 200; failures carry
/// `{"valid": false}` and nothing else.
pub async fn validate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    let ctx = context(&headers, addr);
    let result = state.auth.validate_token(&req.token, &ctx).await?;
    Ok(Json(result))
}

/// POST /auth/validate-hec, the internal machine-token check.
pub async fn validate_hec(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<HecValidateRequest>,
) -> Result<Json<HecValidateResponse>, AppError> {
    let ctx = context(&headers, addr);
    let result = state.hec.validate(&req.token, &ctx).await?;
    Ok(Json(result))
}

/// POST /auth/revoke
pub async fn revoke(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    state.auth.revoke_token(&user.0.user, &req.token, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /auth/scope
pub async fn scope(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
) -> Result<Json<ScopeResponse>, AppError> {
    let ctx = context(&headers, addr);
    let scope = state.auth.get_user_scope(&user.0.user, &ctx).await?;
    Ok(Json(scope))
}
