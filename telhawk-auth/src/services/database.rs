//! PostgreSQL repository for the auth service.
//!
//! The only component that talks to the durable store. Versioned tables
//! (`users`, `roles`, `organizations`, `clients`) are read with
//! `DISTINCT ON (id) ... ORDER BY id, version_id DESC`; append-only tables
//! (`sessions`, `hec_tokens`, `user_roles`, `audit_log`) are never updated
//! except for their revocation markers. Every call carries its own statement
//! timeout so a runaway query cannot stall a worker past the request
//! deadline.

use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{
    AuditRecord, Client, HecToken, Organization, Permission, Role, RoleGrant, ScopeType, Session,
    User,
};
use crate::services::ServiceError;

/// Per-call budget for a single statement, independent of the caller's
/// deadline.
const STATEMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL repository wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

/// Run one statement under the repository's own timeout.
async fn bounded<T, F>(fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STATEMENT_TIMEOUT, fut).await {
        Ok(result) => result.map_err(ServiceError::Database),
        Err(_) => Err(ServiceError::DatabaseTimeout),
    }
}

/// Map a unique-constraint violation (SQLSTATE 23505) to `AlreadyExists`.
fn map_unique_violation(err: ServiceError, what: &'static str) -> ServiceError {
    if let ServiceError::Database(sqlx::Error::Database(ref db_err)) = err {
        if db_err.code().as_deref() == Some("23505") {
            return ServiceError::AlreadyExists(what);
        }
    }
    err
}

impl Database {
    /// Create a new repository from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check - ping the database.
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        bounded(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }

    // ==================== User Operations ====================

    /// Insert a new principal. Fails with `AlreadyExists` when the username
    /// collides with a live principal.
    pub async fn create_user(&self, user: &User) -> Result<(), ServiceError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO users (id, version_id, username, email, password_hash, roles,
                                   organization_id, client_id, permissions_version,
                                   disabled_at, deleted_at, created_by, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(user.id)
            .bind(user.version_id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.roles)
            .bind(user.organization_id)
            .bind(user.client_id)
            .bind(user.permissions_version)
            .bind(user.disabled_at)
            .bind(user.deleted_at)
            .bind(user.created_by)
            .bind(user.updated_by)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| map_unique_violation(e, "user"))?;
        Ok(())
    }

    /// Latest live version by username.
    pub async fn find_user_by_username(&self, username: &str) -> Result<User, ServiceError> {
        bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE username = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("user"))
    }

    /// Latest version by username including deleted principals, preferring
    /// a live row when one exists. Login uses this to tell a deleted
    /// account apart from an unknown one in its audit trail.
    pub async fn find_user_by_username_any(&self, username: &str) -> Result<User, ServiceError> {
        bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT *
                FROM users
                WHERE username = $1
                ORDER BY (deleted_at IS NULL) DESC, version_id DESC
                LIMIT 1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("user"))
    }

    /// Latest live version by stable id.
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<User, ServiceError> {
        bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("user"))
    }

    /// Load a principal together with every active grant, each grant's role,
    /// and each role's permissions, in one traversal.
    pub async fn get_user_with_roles(&self, id: Uuid) -> Result<User, ServiceError> {
        let mut user = self.find_user_by_id(id).await?;

        let rows = bounded(
            sqlx::query_as::<_, GrantRow>(
                r#"
                SELECT
                    g.id              AS grant_id,
                    g.organization_id AS grant_organization_id,
                    g.client_id       AS grant_client_id,
                    r.id              AS role_id,
                    r.version_id      AS role_version_id,
                    r.organization_id AS role_organization_id,
                    r.client_id       AS role_client_id,
                    r.name            AS role_name,
                    r.slug            AS role_slug,
                    r.ordinal         AS role_ordinal,
                    r.protected       AS role_protected,
                    r.system          AS role_system,
                    r.template        AS role_template,
                    p.id              AS permission_id,
                    p.resource        AS permission_resource,
                    p.action          AS permission_action
                FROM user_roles g
                JOIN LATERAL (
                    SELECT DISTINCT ON (id) *
                    FROM roles
                    WHERE id = g.role_id AND deleted_at IS NULL
                    ORDER BY id, version_id DESC
                ) r ON TRUE
                LEFT JOIN role_permissions rp ON rp.role_id = r.id
                LEFT JOIN permissions p ON p.id = rp.permission_id
                WHERE g.user_id = $1 AND g.revoked_at IS NULL
                ORDER BY g.id, p.id
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool),
        )
        .await?;

        user.grants = group_grant_rows(id, rows);
        Ok(user)
    }

    /// Fast path for validation: only the permissions-version counter.
    pub async fn get_permissions_version(&self, id: Uuid) -> Result<i64, ServiceError> {
        let version: Option<(i64,)> = bounded(
            sqlx::query_as(
                r#"
                SELECT permissions_version
                FROM users
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY version_id DESC
                LIMIT 1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?;
        version
            .map(|(v,)| v)
            .ok_or(ServiceError::NotFound("user"))
    }

    /// Rewrite the latest version row in place. Callers intending a new
    /// version supply a fresh `version_id` on the model.
    pub async fn update_user(&self, user: &User) -> Result<(), ServiceError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE users
                SET version_id = $2, username = $3, email = $4, password_hash = $5,
                    roles = $6, organization_id = $7, client_id = $8,
                    permissions_version = $9, disabled_at = $10, deleted_at = $11,
                    updated_by = $12
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(user.id)
            .bind(user.version_id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.roles)
            .bind(user.organization_id)
            .bind(user.client_id)
            .bind(user.permissions_version)
            .bind(user.disabled_at)
            .bind(user.deleted_at)
            .bind(user.updated_by)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| map_unique_violation(e, "user"))?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("user"));
        }
        Ok(())
    }

    /// All live principals, newest first.
    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE deleted_at IS NULL
                ORDER BY id DESC, version_id DESC
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Principals whose primary scope matches the tier exactly.
    pub async fn list_users_by_scope(
        &self,
        scope: ScopeType,
        organization_id: Option<Uuid>,
        client_id: Option<Uuid>,
    ) -> Result<Vec<User>, ServiceError> {
        let query = match scope {
            ScopeType::Platform => sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE deleted_at IS NULL
                  AND organization_id IS NULL AND client_id IS NULL
                ORDER BY id DESC, version_id DESC
                "#,
            ),
            ScopeType::Organization => sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE deleted_at IS NULL
                  AND organization_id = $1 AND client_id IS NULL
                ORDER BY id DESC, version_id DESC
                "#,
            )
            .bind(organization_id),
            ScopeType::Client => sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE deleted_at IS NULL
                  AND organization_id = $1 AND client_id = $2
                ORDER BY id DESC, version_id DESC
                "#,
            )
            .bind(organization_id)
            .bind(client_id),
        };

        bounded(query.fetch_all(&self.pool)).await
    }

    /// All live principals whose primary organization matches, at any tier
    /// below it.
    pub async fn list_users_in_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<User>, ServiceError> {
        bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM users
                WHERE deleted_at IS NULL AND organization_id = $1
                ORDER BY id DESC, version_id DESC
                "#,
            )
            .bind(organization_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Soft delete: set `deleted_at` on the live row.
    pub async fn delete_user(&self, id: Uuid, deleted_by: Uuid) -> Result<(), ServiceError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE users
                SET deleted_at = NOW(), updated_by = $2
                WHERE id = $1 AND deleted_at IS NULL
                "#,
            )
            .bind(id)
            .bind(deleted_by)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("user"));
        }
        Ok(())
    }

    // ==================== Session Operations ====================

    /// Append a new session row.
    pub async fn create_session(&self, session: &Session) -> Result<(), ServiceError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO sessions (id, user_id, access_token, refresh_token,
                                      expires_at, revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(session.id)
            .bind(session.user_id)
            .bind(&session.access_token)
            .bind(&session.refresh_token)
            .bind(session.expires_at)
            .bind(session.revoked_at)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| map_unique_violation(e, "session"))?;
        Ok(())
    }

    /// Lookup by the opaque refresh token.
    pub async fn find_session_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Session, ServiceError> {
        bounded(
            sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE refresh_token = $1",
            )
            .bind(refresh_token)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("session"))
    }

    /// Lookup by the exact access-token string. Required by the validation
    /// path.
    pub async fn find_session_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Session, ServiceError> {
        bounded(
            sqlx::query_as::<_, Session>(
                r#"
                SELECT * FROM sessions
                WHERE access_token = $1
                ORDER BY id DESC
                LIMIT 1
                "#,
            )
            .bind(access_token)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("session"))
    }

    /// Swap the stored access-token string after a refresh exchange. The
    /// session row itself is not rotated.
    pub async fn update_session_access_token(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<(), ServiceError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE sessions
                SET access_token = $2
                WHERE refresh_token = $1 AND revoked_at IS NULL
                "#,
            )
            .bind(refresh_token)
            .bind(access_token)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("session"));
        }
        Ok(())
    }

    /// Set the revocation marker. Idempotent: re-revoking keeps the original
    /// timestamp; `NotFound` only when no such session exists.
    pub async fn revoke_session(&self, refresh_token: &str) -> Result<(), ServiceError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE sessions
                SET revoked_at = COALESCE(revoked_at, NOW())
                WHERE refresh_token = $1
                "#,
            )
            .bind(refresh_token)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("session"));
        }
        Ok(())
    }

    // ==================== Machine Token Operations ====================

    /// Append a new machine token row.
    pub async fn create_hec_token(&self, token: &HecToken) -> Result<(), ServiceError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO hec_tokens (id, token, name, user_id, client_id, created_by,
                                        expires_at, disabled_at, revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(token.id)
            .bind(&token.token)
            .bind(&token.name)
            .bind(token.user_id)
            .bind(token.client_id)
            .bind(token.created_by)
            .bind(token.expires_at)
            .bind(token.disabled_at)
            .bind(token.revoked_at)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| map_unique_violation(e, "machine token"))?;
        Ok(())
    }

    /// Lookup by the opaque token value.
    pub async fn find_hec_token_by_value(&self, value: &str) -> Result<HecToken, ServiceError> {
        bounded(
            sqlx::query_as::<_, HecToken>("SELECT * FROM hec_tokens WHERE token = $1")
                .bind(value)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("machine token"))
    }

    /// Lookup by id.
    pub async fn find_hec_token_by_id(&self, id: Uuid) -> Result<HecToken, ServiceError> {
        bounded(
            sqlx::query_as::<_, HecToken>("SELECT * FROM hec_tokens WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("machine token"))
    }

    /// Tokens owned by one principal, newest first.
    pub async fn list_hec_tokens_by_owner(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<HecToken>, ServiceError> {
        bounded(
            sqlx::query_as::<_, HecToken>(
                "SELECT * FROM hec_tokens WHERE user_id = $1 ORDER BY id DESC",
            )
            .bind(user_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Every machine token, newest first.
    pub async fn list_hec_tokens(&self) -> Result<Vec<HecToken>, ServiceError> {
        bounded(
            sqlx::query_as::<_, HecToken>("SELECT * FROM hec_tokens ORDER BY id DESC")
                .fetch_all(&self.pool),
        )
        .await
    }

    /// Set the revocation marker on a machine token. Same idempotence rule
    /// as sessions.
    pub async fn revoke_hec_token(&self, value: &str) -> Result<(), ServiceError> {
        let result = bounded(
            sqlx::query(
                r#"
                UPDATE hec_tokens
                SET revoked_at = COALESCE(revoked_at, NOW())
                WHERE token = $1
                "#,
            )
            .bind(value)
            .execute(&self.pool),
        )
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("machine token"));
        }
        Ok(())
    }

    // ==================== Audit Operations ====================

    /// Append one audit record. Records are never mutated.
    pub async fn append_audit_record(&self, record: &AuditRecord) -> Result<(), ServiceError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO audit_log (id, created_at, actor_type, actor_id, actor_username,
                                       action, resource_type, resource_id, source_ip,
                                       user_agent, result, reason, metadata, signature)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(record.id)
            .bind(record.created_at)
            .bind(&record.actor_type)
            .bind(record.actor_id)
            .bind(&record.actor_username)
            .bind(&record.action)
            .bind(&record.resource_type)
            .bind(&record.resource_id)
            .bind(&record.source_ip)
            .bind(&record.user_agent)
            .bind(&record.result)
            .bind(&record.reason)
            .bind(&record.metadata)
            .bind(&record.signature)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Newest-first audit page for operators.
    pub async fn list_audit_records(&self, limit: i64) -> Result<Vec<AuditRecord>, ServiceError> {
        bounded(
            sqlx::query_as::<_, AuditRecord>(
                "SELECT * FROM audit_log ORDER BY id DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }

    // ==================== Organization / Client Operations ====================

    /// Latest live organization version.
    pub async fn find_organization_by_id(&self, id: Uuid) -> Result<Organization, ServiceError> {
        bounded(
            sqlx::query_as::<_, Organization>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM organizations
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("organization"))
    }

    /// All live organizations.
    pub async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        bounded(
            sqlx::query_as::<_, Organization>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM organizations
                WHERE deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Latest live client version.
    pub async fn find_client_by_id(&self, id: Uuid) -> Result<Client, ServiceError> {
        bounded(
            sqlx::query_as::<_, Client>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM clients
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("client"))
    }

    /// Live clients owned by one organization.
    pub async fn list_clients_by_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Vec<Client>, ServiceError> {
        bounded(
            sqlx::query_as::<_, Client>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM clients
                WHERE organization_id = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(organization_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Containment check: does the client's latest live version belong to
    /// the organization?
    pub async fn client_belongs_to(
        &self,
        client_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let row: Option<(Uuid,)> = bounded(
            sqlx::query_as(
                r#"
                SELECT organization_id
                FROM clients
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY version_id DESC
                LIMIT 1
                "#,
            )
            .bind(client_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(|(owner,)| owner == organization_id).unwrap_or(false))
    }

    // ==================== Role Operations ====================

    /// Latest live role version with its permission set.
    pub async fn find_role_by_id(&self, id: Uuid) -> Result<Role, ServiceError> {
        let mut role = bounded(
            sqlx::query_as::<_, Role>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM roles
                WHERE id = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("role"))?;

        role.permissions = self.role_permissions(role.id).await?;
        Ok(role)
    }

    /// Latest live role version by slug.
    pub async fn find_role_by_slug(&self, slug: &str) -> Result<Role, ServiceError> {
        let mut role = bounded(
            sqlx::query_as::<_, Role>(
                r#"
                SELECT DISTINCT ON (id) *
                FROM roles
                WHERE slug = $1 AND deleted_at IS NULL
                ORDER BY id, version_id DESC
                "#,
            )
            .bind(slug)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(ServiceError::NotFound("role"))?;

        role.permissions = self.role_permissions(role.id).await?;
        Ok(role)
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, ServiceError> {
        bounded(
            sqlx::query_as::<_, Permission>(
                r#"
                SELECT p.id, p.resource, p.action
                FROM role_permissions rp
                JOIN permissions p ON p.id = rp.permission_id
                WHERE rp.role_id = $1
                ORDER BY p.id
                "#,
            )
            .bind(role_id)
            .fetch_all(&self.pool),
        )
        .await
    }

    /// Append a role grant.
    pub async fn create_role_grant(&self, grant: &RoleGrant) -> Result<(), ServiceError> {
        bounded(
            sqlx::query(
                r#"
                INSERT INTO user_roles (id, user_id, role_id, organization_id, client_id,
                                        revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(grant.id)
            .bind(grant.user_id)
            .bind(grant.role_id)
            .bind(grant.organization_id)
            .bind(grant.client_id)
            .bind(grant.revoked_at)
            .execute(&self.pool),
        )
        .await
        .map_err(|e| map_unique_violation(e, "role grant"))?;
        Ok(())
    }
}

/// Flat row of the grant-graph join, one row per permission.
#[derive(Debug, FromRow)]
struct GrantRow {
    grant_id: Uuid,
    grant_organization_id: Option<Uuid>,
    grant_client_id: Option<Uuid>,
    role_id: Uuid,
    role_version_id: Uuid,
    role_organization_id: Option<Uuid>,
    role_client_id: Option<Uuid>,
    role_name: String,
    role_slug: String,
    role_ordinal: i16,
    role_protected: bool,
    role_system: bool,
    role_template: bool,
    permission_id: Option<Uuid>,
    permission_resource: Option<String>,
    permission_action: Option<String>,
}

/// Group join rows by grant id, preserving first-seen order. The grant owns
/// its role, the role owns its permission list.
fn group_grant_rows(user_id: Uuid, rows: Vec<GrantRow>) -> Vec<RoleGrant> {
    let mut grants: Vec<RoleGrant> = Vec::new();

    for row in rows {
        let idx = match grants.iter().position(|g| g.id == row.grant_id) {
            Some(idx) => idx,
            None => {
                grants.push(RoleGrant {
                    id: row.grant_id,
                    user_id,
                    role_id: row.role_id,
                    organization_id: row.grant_organization_id,
                    client_id: row.grant_client_id,
                    revoked_at: None,
                    role: Role {
                        id: row.role_id,
                        version_id: row.role_version_id,
                        organization_id: row.role_organization_id,
                        client_id: row.role_client_id,
                        name: row.role_name.clone(),
                        slug: row.role_slug.clone(),
                        ordinal: row.role_ordinal,
                        protected: row.role_protected,
                        system: row.role_system,
                        template: row.role_template,
                        deleted_at: None,
                        permissions: Vec::new(),
                    },
                });
                grants.len() - 1
            }
        };

        if let (Some(id), Some(resource), Some(action)) = (
            row.permission_id,
            row.permission_resource,
            row.permission_action,
        ) {
            grants[idx]
                .role
                .permissions
                .push(Permission { id, resource, action });
        }
    }

    grants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::new_id;

    fn row(grant_id: Uuid, role_id: Uuid, permission: Option<(&str, &str)>) -> GrantRow {
        GrantRow {
            grant_id,
            grant_organization_id: None,
            grant_client_id: None,
            role_id,
            role_version_id: role_id,
            role_organization_id: None,
            role_client_id: None,
            role_name: "Analyst".to_string(),
            role_slug: "analyst".to_string(),
            role_ordinal: 50,
            role_protected: false,
            role_system: false,
            role_template: false,
            permission_id: permission.map(|_| new_id()),
            permission_resource: permission.map(|(r, _)| r.to_string()),
            permission_action: permission.map(|(_, a)| a.to_string()),
        }
    }

    #[test]
    fn grant_rows_group_by_grant_preserving_order() {
        let user_id = new_id();
        let (g1, g2) = (new_id(), new_id());
        let (r1, r2) = (new_id(), new_id());

        let rows = vec![
            row(g1, r1, Some(("users", "read"))),
            row(g1, r1, Some(("users", "update"))),
            row(g2, r2, Some(("tokens", "create"))),
        ];

        let grants = group_grant_rows(user_id, rows);
        assert_eq!(grants.len(), 2);
        assert_eq!(grants[0].id, g1);
        assert_eq!(grants[0].role.permissions.len(), 2);
        assert_eq!(grants[1].role.permissions.len(), 1);
        assert_eq!(grants[1].role.permissions[0].key(), "tokens:create");
    }

    #[test]
    fn permissionless_role_yields_empty_permission_list() {
        let grants = group_grant_rows(new_id(), vec![row(new_id(), new_id(), None)]);
        assert_eq!(grants.len(), 1);
        assert!(grants[0].role.permissions.is_empty());
    }
}
