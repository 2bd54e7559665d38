//! TelHawk auth service
//!
//! Authentication and authorization for the TelHawk platform:
//! - Short-lived signed access tokens with stale-permission detection
//! - Opaque refresh sessions and long-lived machine (HEC) tokens
//! - Three-tier scope model (platform / organization / client) with
//!   ordinal-based role power and protected roles
//! - Signed append-only audit trail with OCSF forwarding

pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use telhawk_core::error::AppError;

use crate::config::AuthConfig;
use crate::handlers::{audit, auth, hec, users};
use crate::middleware::auth::auth_middleware;
use crate::middleware::rbac::{
    guard_audit_read, guard_tokens_collection, guard_tokens_revoke, guard_users_assign_roles,
    guard_users_create, guard_users_delete, guard_users_list, guard_users_read,
    guard_users_reset_password, guard_users_update,
};
use crate::services::{
    AuditLogger, AuthService, ContainmentIndex, Database, HecService, UserService,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub db: Database,
    pub auth: AuthService,
    pub users: UserService,
    pub hec: HecService,
    pub audit: AuditLogger,
    pub containment: Arc<ContainmentIndex>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/validate", post(auth::validate))
        .route("/auth/validate-hec", post(auth::validate_hec))
        .route("/healthz", get(health_check))
        .route("/readyz", get(readiness_check));

    let session_routes = Router::new()
        .route("/auth/revoke", post(auth::revoke))
        .route("/auth/scope", get(auth::scope));

    let user_routes = Router::new()
        .route("/users/create", post(users::create_user))
        .route_layer(from_fn(guard_users_create))
        .merge(
            Router::new()
                .route("/users", get(users::list_users))
                .route_layer(from_fn_with_state(state.clone(), guard_users_list)),
        )
        .merge(
            Router::new()
                .route("/users/get", get(users::get_user))
                .route_layer(from_fn(guard_users_read)),
        )
        .merge(
            Router::new()
                .route(
                    "/users/update",
                    put(users::update_user).patch(users::update_user),
                )
                .route_layer(from_fn(guard_users_update)),
        )
        .merge(
            Router::new()
                .route("/users/delete", delete(users::delete_user))
                .route_layer(from_fn(guard_users_delete)),
        )
        .merge(
            Router::new()
                .route("/users/reset-password", post(users::reset_password))
                .route_layer(from_fn(guard_users_reset_password)),
        )
        .merge(
            Router::new()
                .route("/users/assign-role", post(users::assign_role))
                .route_layer(from_fn(guard_users_assign_roles)),
        );

    let hec_routes = Router::new()
        .route(
            "/hec/tokens",
            post(hec::create_token).get(hec::list_tokens),
        )
        .route_layer(from_fn(guard_tokens_collection))
        .merge(
            Router::new()
                .route(
                    "/hec/tokens/revoke",
                    post(hec::revoke_token).delete(hec::revoke_token),
                )
                .route(
                    "/hec/tokens/:id/revoke",
                    delete(hec::revoke_token_by_id).post(hec::revoke_token_by_id),
                )
                .route_layer(from_fn(guard_tokens_revoke)),
        );

    let audit_routes = Router::new()
        .route("/audit/events", get(audit::list_audit_events))
        .route_layer(from_fn(guard_audit_read));

    let protected = Router::new()
        .merge(session_routes)
        .merge(user_routes)
        .merge(hec_routes)
        .merge(audit_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness probe.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.db.health_check().await.map_err(AppError::from)?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}

/// Readiness probe with per-dependency status.
pub async fn readiness_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let postgres = match state.db.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(error = %e, "readiness check failed");
            "down"
        }
    };

    let status = if postgres == "up" { "ready" } else { "degraded" };
    Json(serde_json::json!({
        "status": status,
        "checks": {
            "postgresql": postgres,
        }
    }))
}
