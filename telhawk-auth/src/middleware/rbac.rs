//! Permission predicates over the extracted principal.
//!
//! All predicates operate on the `CurrentUser` the auth middleware placed
//! in the request extensions; none re-consult the repository. The one
//! scope-aware predicate resolves containment through the service layer's
//! memoized index.

use axum::extract::Request;
use axum::http::Extensions;
use uuid::Uuid;

use telhawk_core::error::AppError;

use crate::middleware::CurrentUser;
use crate::models::{ScopeType, User};
use crate::services::rbac;
use crate::AppState;

fn current_user(extensions: &Extensions) -> Result<&CurrentUser, AppError> {
    extensions.get::<CurrentUser>().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "Principal missing from request extensions"
        ))
    })
}

fn denied(permission: &str) -> AppError {
    AppError::Forbidden {
        detail: format!("missing permission {}", permission),
        permission: Some(permission.to_string()),
    }
}

/// Require one permission.
pub fn require_permission<B>(req: &Request<B>, permission: &str) -> Result<(), AppError> {
    let current = current_user(req.extensions())?;
    if rbac::has_permission(&current.user, permission) {
        Ok(())
    } else {
        Err(denied(permission))
    }
}

/// Require at least one of the listed permissions.
pub fn require_any<B>(req: &Request<B>, permissions: &[&str]) -> Result<(), AppError> {
    let current = current_user(req.extensions())?;
    if permissions
        .iter()
        .any(|p| rbac::has_permission(&current.user, p))
    {
        Ok(())
    } else {
        Err(denied(permissions.first().copied().unwrap_or("")))
    }
}

/// Require every listed permission.
pub fn require_all<B>(req: &Request<B>, permissions: &[&str]) -> Result<(), AppError> {
    let current = current_user(req.extensions())?;
    for permission in permissions {
        if !rbac::has_permission(&current.user, permission) {
            return Err(denied(permission));
        }
    }
    Ok(())
}

/// Require the principal's strongest role to sit at or above the threshold
/// (smaller ordinal is more powerful).
pub fn require_max_ordinal<B>(req: &Request<B>, threshold: i16) -> Result<(), AppError> {
    let current = current_user(req.extensions())?;
    if rbac::lowest_ordinal(&current.user) <= threshold {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            detail: "insufficient role power".to_string(),
            permission: None,
        })
    }
}

/// Require the principal's scope tier to be in the allow-list.
pub fn require_scope_tier<B>(req: &Request<B>, allowed: &[ScopeType]) -> Result<(), AppError> {
    let current = current_user(req.extensions())?;
    if allowed.contains(&current.user.scope_type()) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            detail: "scope tier not permitted".to_string(),
            permission: None,
        })
    }
}

/// Scope-aware predicate: evaluate the permission against a target scope
/// pulled out of the request by the extractor.
pub async fn require_scoped_permission(
    state: &AppState,
    current: &User,
    permission: &str,
    organization_id: Option<Uuid>,
    client_id: Option<Uuid>,
) -> Result<(), AppError> {
    // Containment is only consulted when an organization-tier actor
    // targets a client scope; resolve that single fact up front.
    let mut contained = false;
    if current.scope_type() == ScopeType::Organization {
        if let (Some(own_org), Some(client)) = (current.organization_id, client_id) {
            contained = state
                .containment
                .belongs(client, own_org)
                .await
                .map_err(AppError::from)?;
        }
    }

    if rbac::can_act_in_scope(
        current,
        permission,
        organization_id,
        client_id,
        |_, _| contained,
    ) {
        Ok(())
    } else {
        Err(denied(permission))
    }
}

/// Pull an explicit target scope out of the query string
/// (`organization_id=...&client_id=...`).
pub fn scope_from_query(query: &str) -> (Option<Uuid>, Option<Uuid>) {
    let mut organization_id = None;
    let mut client_id = None;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            match key {
                "organization_id" => organization_id = Uuid::parse_str(value).ok(),
                "client_id" => client_id = Uuid::parse_str(value).ok(),
                _ => {}
            }
        }
    }
    (organization_id, client_id)
}

// Named route guards wired into the router.

use axum::extract::State;
use axum::middleware::Next;
use axum::response::Response;

use crate::services::rbac::{
    PERM_AUDIT_READ, PERM_TOKENS_CREATE, PERM_TOKENS_READ, PERM_TOKENS_REVOKE,
    PERM_USERS_ASSIGN_ROLES, PERM_USERS_CREATE, PERM_USERS_DELETE, PERM_USERS_READ,
    PERM_USERS_RESET_PASSWORD, PERM_USERS_UPDATE,
};

macro_rules! permission_guard {
    ($name:ident, $permission:expr) => {
        pub async fn $name(req: Request, next: Next) -> Result<Response, AppError> {
            require_permission(&req, $permission)?;
            Ok(next.run(req).await)
        }
    };
}

permission_guard!(guard_users_create, PERM_USERS_CREATE);
permission_guard!(guard_users_read, PERM_USERS_READ);
permission_guard!(guard_users_update, PERM_USERS_UPDATE);
permission_guard!(guard_users_delete, PERM_USERS_DELETE);
permission_guard!(guard_users_reset_password, PERM_USERS_RESET_PASSWORD);
permission_guard!(guard_users_assign_roles, PERM_USERS_ASSIGN_ROLES);
permission_guard!(guard_tokens_create, PERM_TOKENS_CREATE);
permission_guard!(guard_tokens_read, PERM_TOKENS_READ);
permission_guard!(guard_tokens_revoke, PERM_TOKENS_REVOKE);
permission_guard!(guard_audit_read, PERM_AUDIT_READ);

/// The machine-token collection route splits by method: creation needs
/// `tokens:create`, listing needs `tokens:read`.
pub async fn guard_tokens_collection(req: Request, next: Next) -> Result<Response, AppError> {
    let permission = if req.method() == axum::http::Method::GET {
        PERM_TOKENS_READ
    } else {
        PERM_TOKENS_CREATE
    };
    require_permission(&req, permission)?;
    Ok(next.run(req).await)
}

/// Scope-aware guard for the user listing: an explicit
/// `organization_id`/`client_id` query pair is authorized against the
/// caller's tier; without one the caller's own primary scope is the target.
pub async fn guard_users_list(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = current_user(req.extensions())?.user.clone();

    let explicit = req
        .uri()
        .query()
        .map(scope_from_query)
        .unwrap_or((None, None));
    let (organization_id, client_id) = match explicit {
        (None, None) => (current.organization_id, current.client_id),
        scope => scope,
    };

    require_scoped_permission(
        &state,
        &current,
        PERM_USERS_READ,
        organization_id,
        client_id,
    )
    .await?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, Role, RoleGrant, User};
    use crate::utils::new_id;
    use axum::body::Body;

    fn request_with_user(permissions: &[&str], ordinal: i16) -> Request<Body> {
        let mut user = User::new(
            "tester".to_string(),
            "tester@example.com".to_string(),
            "$2b$04$hash".to_string(),
            vec![],
            None,
            None,
            None,
        );
        let role = Role {
            id: new_id(),
            version_id: new_id(),
            organization_id: None,
            client_id: None,
            name: "Role".to_string(),
            slug: "role".to_string(),
            ordinal,
            protected: false,
            system: false,
            template: false,
            deleted_at: None,
            permissions: permissions
                .iter()
                .map(|key| {
                    let (resource, action) = key.split_once(':').expect("resource:action");
                    Permission {
                        id: new_id(),
                        resource: resource.to_string(),
                        action: action.to_string(),
                    }
                })
                .collect(),
        };
        user.grants = vec![RoleGrant::new(user.id, role, None, None)];

        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(CurrentUser {
            user,
            permissions_version: 1,
            permissions_stale: false,
        });
        req
    }

    #[test]
    fn single_permission_predicate() {
        let req = request_with_user(&["users:read"], 50);
        assert!(require_permission(&req, "users:read").is_ok());
        assert!(require_permission(&req, "users:update").is_err());
    }

    #[test]
    fn any_and_all_predicates() {
        let req = request_with_user(&["users:read", "tokens:read"], 50);
        assert!(require_any(&req, &["users:update", "tokens:read"]).is_ok());
        assert!(require_any(&req, &["users:update", "users:delete"]).is_err());
        assert!(require_all(&req, &["users:read", "tokens:read"]).is_ok());
        assert!(require_all(&req, &["users:read", "users:update"]).is_err());
    }

    #[test]
    fn denial_names_the_permission() {
        let req = request_with_user(&[], 50);
        match require_permission(&req, "users:update") {
            Err(AppError::Forbidden { permission, .. }) => {
                assert_eq!(permission.as_deref(), Some("users:update"));
            }
            _ => panic!("expected Forbidden with a permission field"),
        }
    }

    #[test]
    fn ordinal_threshold_predicate() {
        let req = request_with_user(&[], 20);
        assert!(require_max_ordinal(&req, 20).is_ok());
        assert!(require_max_ordinal(&req, 10).is_err());
    }

    #[test]
    fn scope_tier_predicate() {
        let req = request_with_user(&[], 50);
        assert!(require_scope_tier(&req, &[ScopeType::Platform]).is_ok());
        assert!(require_scope_tier(&req, &[ScopeType::Client]).is_err());
    }

    #[test]
    fn query_scope_extraction() {
        let org = new_id();
        let client = new_id();
        let query = format!("organization_id={}&client_id={}&limit=10", org, client);
        assert_eq!(scope_from_query(&query), (Some(org), Some(client)));
        assert_eq!(scope_from_query("limit=10"), (None, None));
        assert_eq!(scope_from_query("organization_id=not-a-uuid"), (None, None));
    }

    #[test]
    fn missing_principal_is_an_internal_error() {
        let req = Request::new(Body::empty());
        assert!(matches!(
            require_permission(&req, "users:read"),
            Err(AppError::Internal(_))
        ));
    }
}
