//! RBAC evaluator.
//!
//! Pure functions over a principal loaded with its active grants, roles, and
//! permissions. Decisions are computed from in-memory state; the one injected
//! lookup is the `client_belongs_to` containment predicate, consulted only
//! when an organization-tier actor targets a client scope.

use uuid::Uuid;

use crate::models::{Role, ScopeType, User, NO_ROLE_ORDINAL};

pub const PERM_USERS_CREATE: &str = "users:create";
pub const PERM_USERS_READ: &str = "users:read";
pub const PERM_USERS_UPDATE: &str = "users:update";
pub const PERM_USERS_DELETE: &str = "users:delete";
pub const PERM_USERS_RESET_PASSWORD: &str = "users:reset_password";
pub const PERM_USERS_ASSIGN_ROLES: &str = "users:assign_roles";
pub const PERM_TOKENS_CREATE: &str = "tokens:create";
pub const PERM_TOKENS_READ: &str = "tokens:read";
pub const PERM_TOKENS_REVOKE: &str = "tokens:revoke";
pub const PERM_AUDIT_READ: &str = "audit:read";

/// A principal holding any protected role at ordinal 0 passes every
/// permission check. Applied before the grant scan.
fn holds_protected_apex(user: &User) -> bool {
    user.active_grants()
        .any(|g| g.role.protected && g.role.ordinal == 0)
}

/// Does any active grant hold a protected role?
pub fn holds_protected_role(user: &User) -> bool {
    user.active_grants().any(|g| g.role.protected)
}

/// True if the principal has an active grant of a role whose permission set
/// contains the literal `resource:action` pair.
pub fn has_permission(user: &User, permission: &str) -> bool {
    if holds_protected_apex(user) {
        return true;
    }
    user.active_grants().any(|g| g.role.grants(permission))
}

/// Minimum ordinal across active grants; `NO_ROLE_ORDINAL` when the
/// principal holds none.
pub fn lowest_ordinal(user: &User) -> i16 {
    user.active_grants()
        .map(|g| g.role.ordinal)
        .min()
        .unwrap_or(NO_ROLE_ORDINAL)
}

/// An actor may hand out a role iff the role is not protected, the actor
/// holds `users:assign_roles`, and the role is no more powerful than the
/// actor's own strongest role.
pub fn can_assign_role(actor: &User, role: &Role) -> bool {
    !role.protected
        && has_permission(actor, PERM_USERS_ASSIGN_ROLES)
        && role.ordinal >= lowest_ordinal(actor)
}

/// Scope-aware permission evaluation.
///
/// A higher-tier actor may act inside its subtree; a lower-tier actor never
/// escalates upward; same-tier cross-branch motion is forbidden. The
/// containment predicate is consulted only where an organization-tier actor
/// targets a client scope.
pub fn can_act_in_scope<F>(
    actor: &User,
    permission: &str,
    organization_id: Option<Uuid>,
    client_id: Option<Uuid>,
    client_belongs_to: F,
) -> bool
where
    F: Fn(Uuid, Uuid) -> bool,
{
    match actor.scope_type() {
        ScopeType::Platform => has_permission(actor, permission),
        ScopeType::Organization => {
            let Some(own_org) = actor.organization_id else {
                return false;
            };
            match (organization_id, client_id) {
                (Some(org), None) => org == own_org && has_permission(actor, permission),
                (Some(org), Some(client)) => {
                    org == own_org
                        && client_belongs_to(client, own_org)
                        && has_permission(actor, permission)
                }
                _ => false,
            }
        }
        ScopeType::Client => {
            let (Some(own_org), Some(own_client)) = (actor.organization_id, actor.client_id)
            else {
                return false;
            };
            match (organization_id, client_id) {
                (Some(org), Some(client)) => {
                    org == own_org && client == own_client && has_permission(actor, permission)
                }
                _ => false,
            }
        }
    }
}

/// Shared gate for administrative operations on another principal: the
/// target must hold no protected role, the actor must hold the permission,
/// must be at least as powerful, and must reach the target's primary scope.
pub fn can_administer<F>(
    actor: &User,
    target: &User,
    permission: &str,
    client_belongs_to: F,
) -> bool
where
    F: Fn(Uuid, Uuid) -> bool,
{
    // A target holding any protected role is unmanageable through the API.
    if holds_protected_role(target) {
        return false;
    }
    if !has_permission(actor, permission) {
        return false;
    }
    if lowest_ordinal(actor) > lowest_ordinal(target) {
        return false;
    }
    can_act_in_scope(
        actor,
        permission,
        target.organization_id,
        target.client_id,
        client_belongs_to,
    )
}

/// May the actor modify the target principal?
pub fn can_manage<F>(actor: &User, target: &User, client_belongs_to: F) -> bool
where
    F: Fn(Uuid, Uuid) -> bool,
{
    can_administer(actor, target, PERM_USERS_UPDATE, client_belongs_to)
}

/// May the actor set a new password on the target principal?
pub fn can_reset_password<F>(actor: &User, target: &User, client_belongs_to: F) -> bool
where
    F: Fn(Uuid, Uuid) -> bool,
{
    can_administer(actor, target, PERM_USERS_RESET_PASSWORD, client_belongs_to)
}
