//! Machine-token endpoints.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

use telhawk_core::error::AppError;

use crate::dtos::hec::{CreateHecTokenAttributes, CreateHecTokenRequest, RevokeHecTokenRequest};
use crate::dtos::jsonapi::{Collection, Document, Resource};
use crate::handlers::auth::context;
use crate::middleware::AuthUser;
use crate::models::HecTokenResponse;
use crate::AppState;

/// POST /hec/tokens. The 201 body is the only place the full secret ever
/// appears.
pub async fn create_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<CreateHecTokenRequest>,
) -> Result<(StatusCode, Json<Document<CreateHecTokenAttributes>>), AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    let (id, attributes) = state.hec.create(&user.0.user, req, &ctx).await?;
    Ok((
        StatusCode::CREATED,
        Json(Document::new("hec_token", id, attributes)),
    ))
}

/// GET /hec/tokens, masked listing.
pub async fn list_tokens(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
) -> Result<Json<Collection<HecTokenResponse>>, AppError> {
    let ctx = context(&headers, addr);
    let tokens = state.hec.list(&user.0.user, &ctx).await?;
    let data = tokens
        .into_iter()
        .map(|token| {
            let id = token.id;
            Resource::new("hec_token", id, token)
        })
        .collect();
    Ok(Json(Collection { data }))
}

/// POST/DELETE /hec/tokens/revoke: revoke by opaque value.
pub async fn revoke_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<RevokeHecTokenRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    state
        .hec
        .revoke_by_value(&user.0.user, &req.token, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE/POST /hec/tokens/:id/revoke: revoke by id.
pub async fn revoke_token_by_id(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let ctx = context(&headers, addr);
    state.hec.revoke_by_id(&user.0.user, id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
