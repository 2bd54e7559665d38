//! User administration endpoints.

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

use telhawk_core::error::AppError;

use crate::dtos::jsonapi::{Collection, Document, Resource};
use crate::dtos::users::{
    AssignRoleRequest, CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, UserAttributes,
};
use crate::handlers::auth::context;
use crate::middleware::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub organization_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
}

/// POST /users/create
pub async fn create_user(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Document<UserAttributes>>), AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    let created = state.users.create_user(&user.0.user, req, &ctx).await?;
    let doc = Document::new("user", created.id, UserAttributes::from(&created));
    Ok((StatusCode::CREATED, Json(doc)))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Collection<UserAttributes>>, AppError> {
    let users = state
        .users
        .list_users(&user.0.user, query.organization_id, query.client_id)
        .await?;
    let data = users
        .iter()
        .map(|u| Resource::new("user", u.id, UserAttributes::from(u)))
        .collect();
    Ok(Json(Collection { data }))
}

/// GET /users/get?id=
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<Document<UserAttributes>>, AppError> {
    let found = state.users.get_user(&user.0.user, query.id).await?;
    Ok(Json(Document::new(
        "user",
        found.id,
        UserAttributes::from(&found),
    )))
}

/// PUT/PATCH /users/update?id=
pub async fn update_user(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Query(query): Query<IdQuery>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<Document<UserAttributes>>, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    let updated = state
        .users
        .update_user(&user.0.user, query.id, req, &ctx)
        .await?;
    Ok(Json(Document::new(
        "user",
        updated.id,
        UserAttributes::from(&updated),
    )))
}

/// DELETE /users/delete?id=
pub async fn delete_user(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<StatusCode, AppError> {
    let ctx = context(&headers, addr);
    state.users.delete_user(&user.0.user, query.id, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/reset-password?id=
pub async fn reset_password(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Query(query): Query<IdQuery>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    state
        .users
        .reset_password(&user.0.user, query.id, req, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/assign-role
pub async fn assign_role(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    user: AuthUser,
    Json(req): Json<AssignRoleRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    let ctx = context(&headers, addr);
    state.users.assign_role(&user.0.user, req, &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}
