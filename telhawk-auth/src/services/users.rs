//! User administration: create, read, update, soft delete, password reset,
//! and role assignment.

use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::users::{
    AssignRoleRequest, CreateUserRequest, ResetPasswordRequest, UpdateUserRequest,
};
use crate::models::{AuditOutcome, RoleGrant, ScopeType, User};
use crate::services::rbac::{
    self, PERM_USERS_ASSIGN_ROLES, PERM_USERS_CREATE, PERM_USERS_DELETE, PERM_USERS_READ,
    PERM_USERS_RESET_PASSWORD, PERM_USERS_UPDATE,
};
use crate::services::{
    AuditLogger, ContainmentIndex, Database, RequestContext, ServiceError, ACTION_PASSWORD_RESET,
    ACTION_ROLE_ASSIGN, ACTION_USER_CREATE, ACTION_USER_DELETE, ACTION_USER_UPDATE,
};
use crate::utils::ids::new_id;
use crate::utils::password::{hash_password, Password};

/// Default role tag applied when a create request names none.
const DEFAULT_ROLE_TAG: &str = "viewer";

#[derive(Clone)]
pub struct UserService {
    db: Database,
    audit: AuditLogger,
    containment: Arc<ContainmentIndex>,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(
        db: Database,
        audit: AuditLogger,
        containment: Arc<ContainmentIndex>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            db,
            audit,
            containment,
            bcrypt_cost,
        }
    }

    /// Resolve the single containment fact `can_act_in_scope` may consult:
    /// whether the target client sits under the actor's own organization.
    async fn resolved_containment(
        &self,
        actor: &User,
        client_id: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        if actor.scope_type() == ScopeType::Organization {
            if let (Some(own_org), Some(client)) = (actor.organization_id, client_id) {
                return self.containment.belongs(client, own_org).await;
            }
        }
        Ok(false)
    }

    async fn authorize_scope(
        &self,
        actor: &User,
        permission: &str,
        organization_id: Option<Uuid>,
        client_id: Option<Uuid>,
    ) -> Result<bool, ServiceError> {
        let contained = self.resolved_containment(actor, client_id).await?;
        Ok(rbac::can_act_in_scope(
            actor,
            permission,
            organization_id,
            client_id,
            |_, _| contained,
        ))
    }

    /// Create a principal. The role list defaults to `viewer`; the fresh id
    /// doubles as the initial version id.
    pub async fn create_user(
        &self,
        actor: &User,
        req: CreateUserRequest,
        ctx: &RequestContext,
    ) -> Result<User, ServiceError> {
        if req.client_id.is_some() && req.organization_id.is_none() {
            return Err(ServiceError::Validation(
                "client_id requires organization_id".to_string(),
            ));
        }
        if let (Some(org), Some(client)) = (req.organization_id, req.client_id) {
            if !self.containment.belongs(client, org).await? {
                return Err(ServiceError::Validation(
                    "client does not belong to organization".to_string(),
                ));
            }
        }

        if !self
            .authorize_scope(actor, PERM_USERS_CREATE, req.organization_id, req.client_id)
            .await?
        {
            self.audit_user_failure(
                actor,
                ACTION_USER_CREATE,
                "",
                "outside actor scope",
                ctx,
            )
            .await;
            return Err(ServiceError::missing_permission(PERM_USERS_CREATE));
        }

        let password = Password::new(req.password);
        let hash = hash_password(&password, self.bcrypt_cost)?;

        let roles = if req.roles.is_empty() {
            vec![DEFAULT_ROLE_TAG.to_string()]
        } else {
            req.roles
        };

        let user = User::new(
            req.username,
            req.email,
            hash.into_string(),
            roles,
            req.organization_id,
            req.client_id,
            Some(actor.id),
        );

        match self.db.create_user(&user).await {
            Ok(()) => {}
            Err(ServiceError::AlreadyExists(what)) => {
                self.audit_user_failure(
                    actor,
                    ACTION_USER_CREATE,
                    &user.username,
                    "username already exists",
                    ctx,
                )
                .await;
                return Err(ServiceError::AlreadyExists(what));
            }
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %user.id, username = %user.username, "user created");

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_USER_CREATE,
                "user",
                &user.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "username": user.username }),
            )
            .await;

        Ok(user)
    }

    /// Fetch one principal inside the actor's reach.
    pub async fn get_user(&self, actor: &User, id: Uuid) -> Result<User, ServiceError> {
        let user = self.db.find_user_by_id(id).await?;
        if !self
            .authorize_scope(actor, PERM_USERS_READ, user.organization_id, user.client_id)
            .await?
        {
            return Err(ServiceError::missing_permission(PERM_USERS_READ));
        }
        Ok(user)
    }

    /// Principals visible from the actor's tier, or within an explicitly
    /// requested scope the middleware has already authorized.
    pub async fn list_users(
        &self,
        actor: &User,
        organization_id: Option<Uuid>,
        client_id: Option<Uuid>,
    ) -> Result<Vec<User>, ServiceError> {
        match (organization_id, client_id) {
            (Some(org), Some(client)) => {
                self.db
                    .list_users_by_scope(ScopeType::Client, Some(org), Some(client))
                    .await
            }
            (Some(org), None) => self.db.list_users_in_organization(org).await,
            _ => match actor.scope_type() {
                ScopeType::Platform => self.db.list_users().await,
                ScopeType::Organization => {
                    let Some(org_id) = actor.organization_id else {
                        return Ok(Vec::new());
                    };
                    self.db.list_users_in_organization(org_id).await
                }
                ScopeType::Client => {
                    self.db
                        .list_users_by_scope(
                            ScopeType::Client,
                            actor.organization_id,
                            actor.client_id,
                        )
                        .await
                }
            },
        }
    }

    /// Modify a principal. Changes to role tags or primary scope bump the
    /// permissions-version counter; every update writes a fresh version id.
    pub async fn update_user(
        &self,
        actor: &User,
        id: Uuid,
        req: UpdateUserRequest,
        ctx: &RequestContext,
    ) -> Result<User, ServiceError> {
        let mut target = self.db.get_user_with_roles(id).await?;

        let contained = self.resolved_containment(actor, target.client_id).await?;
        if !rbac::can_manage(actor, &target, |_, _| contained) {
            self.audit_user_failure(
                actor,
                ACTION_USER_UPDATE,
                &target.username,
                "insufficient privileges",
                ctx,
            )
            .await;
            return Err(ServiceError::missing_permission(PERM_USERS_UPDATE));
        }

        let mut permissions_changed = false;

        if let Some(email) = req.email {
            target.email = email;
        }
        if let Some(roles) = req.roles {
            if roles != target.roles {
                target.roles = roles;
                permissions_changed = true;
            }
        }
        if let Some(org) = req.organization_id {
            if target.organization_id != Some(org) {
                target.organization_id = Some(org);
                permissions_changed = true;
            }
        }
        if let Some(client) = req.client_id {
            if target.client_id != Some(client) {
                let org = target.organization_id.ok_or_else(|| {
                    ServiceError::Validation("client_id requires organization_id".to_string())
                })?;
                if !self.containment.belongs(client, org).await? {
                    return Err(ServiceError::Validation(
                        "client does not belong to organization".to_string(),
                    ));
                }
                target.client_id = Some(client);
                permissions_changed = true;
            }
        }
        if let Some(disabled) = req.disabled {
            match (disabled, target.disabled_at) {
                (true, None) => target.disabled_at = Some(chrono::Utc::now()),
                (false, Some(_)) => target.disabled_at = None,
                _ => {}
            }
        }

        if permissions_changed {
            target.permissions_version += 1;
        }
        target.version_id = new_id();
        target.updated_by = Some(actor.id);

        self.db.update_user(&target).await?;

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_USER_UPDATE,
                "user",
                &target.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "permissions_changed": permissions_changed }),
            )
            .await;

        Ok(target)
    }

    /// Soft delete a principal.
    pub async fn delete_user(
        &self,
        actor: &User,
        id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        let target = self.db.get_user_with_roles(id).await?;

        let contained = self.resolved_containment(actor, target.client_id).await?;
        if !rbac::can_administer(actor, &target, PERM_USERS_DELETE, |_, _| contained) {
            self.audit_user_failure(
                actor,
                ACTION_USER_DELETE,
                &target.username,
                "insufficient privileges",
                ctx,
            )
            .await;
            return Err(ServiceError::missing_permission(PERM_USERS_DELETE));
        }

        self.db.delete_user(id, actor.id).await?;

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_USER_DELETE,
                "user",
                &id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "username": target.username }),
            )
            .await;

        Ok(())
    }

    /// Set a new password hash on the target principal.
    pub async fn reset_password(
        &self,
        actor: &User,
        id: Uuid,
        req: ResetPasswordRequest,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        let mut target = self.db.get_user_with_roles(id).await?;

        let contained = self.resolved_containment(actor, target.client_id).await?;
        if !rbac::can_reset_password(actor, &target, |_, _| contained) {
            self.audit_user_failure(
                actor,
                ACTION_PASSWORD_RESET,
                &target.username,
                "insufficient privileges",
                ctx,
            )
            .await;
            return Err(ServiceError::missing_permission(PERM_USERS_RESET_PASSWORD));
        }

        let hash = hash_password(&Password::new(req.password), self.bcrypt_cost)?;
        target.password_hash = hash.into_string();
        target.version_id = new_id();
        target.updated_by = Some(actor.id);

        self.db.update_user(&target).await?;

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_PASSWORD_RESET,
                "user",
                &target.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;

        Ok(())
    }

    /// Grant a role to a principal and bump its permissions-version.
    pub async fn assign_role(
        &self,
        actor: &User,
        req: AssignRoleRequest,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        let role = self.db.find_role_by_id(req.role_id).await?;
        let mut target = self.db.get_user_with_roles(req.user_id).await?;

        let authorized = rbac::can_assign_role(actor, &role)
            && self
                .authorize_scope(
                    actor,
                    PERM_USERS_ASSIGN_ROLES,
                    target.organization_id,
                    target.client_id,
                )
                .await?;
        if !authorized {
            self.audit_user_failure(
                actor,
                ACTION_ROLE_ASSIGN,
                &target.username,
                "insufficient privileges",
                ctx,
            )
            .await;
            return Err(ServiceError::missing_permission(PERM_USERS_ASSIGN_ROLES));
        }

        let role_id = role.id;
        let grant = RoleGrant::new(
            target.id,
            role,
            req.organization_id.or(target.organization_id),
            req.client_id.or(target.client_id),
        );
        self.db.create_role_grant(&grant).await?;

        target.permissions_version += 1;
        target.version_id = new_id();
        target.updated_by = Some(actor.id);
        self.db.update_user(&target).await?;

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_ROLE_ASSIGN,
                "user",
                &target.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "role_id": role_id }),
            )
            .await;

        Ok(())
    }

    async fn audit_user_failure(
        &self,
        actor: &User,
        action: &str,
        target_username: &str,
        reason: &str,
        ctx: &RequestContext,
    ) {
        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                action,
                "user",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Failure,
                Some(reason.to_string()),
                serde_json::json!({ "target": target_username }),
            )
            .await;
    }
}
