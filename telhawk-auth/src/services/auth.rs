//! Credential lifecycle: login, refresh, validate, revoke, scope.

use uuid::Uuid;

use crate::dtos::auth::{
    LoginRequest, ScopeClient, ScopeOrganization, ScopeResponse, TokenResponse, ValidateResponse,
};
use crate::models::{AuditOutcome, Client, ScopeType, Session, User};
use crate::services::{
    AuditLogger, Database, RequestContext, ServiceError, TokenService, ACTION_LOGIN,
    ACTION_SCOPE_READ, ACTION_TOKEN_REFRESH, ACTION_TOKEN_REVOKE, ACTION_TOKEN_VALIDATE,
    ACTOR_ANONYMOUS,
};
use crate::utils::password::{self, Password, PasswordHashString};

#[derive(Clone)]
pub struct AuthService {
    db: Database,
    tokens: TokenService,
    audit: AuditLogger,
    refresh_token_ttl_days: i64,
}

impl AuthService {
    pub fn new(
        db: Database,
        tokens: TokenService,
        audit: AuditLogger,
        refresh_token_ttl_days: i64,
    ) -> Self {
        Self {
            db,
            tokens,
            audit,
            refresh_token_ttl_days,
        }
    }

    /// Exchange username/password for a token pair.
    ///
    /// Every failure mode returns the same opaque `InvalidCredentials`; the
    /// distinct reason appears only in the audit record. The not-found
    /// branch burns a bcrypt verification against a fixed hash so its
    /// runtime matches the wrong-password branch.
    pub async fn login(
        &self,
        req: LoginRequest,
        ctx: &RequestContext,
    ) -> Result<TokenResponse, ServiceError> {
        let password = Password::new(req.password);

        // The deleted-inclusive lookup lets the audit trail tell a removed
        // account apart from an unknown username.
        let user = match self.db.find_user_by_username_any(&req.username).await {
            Ok(user) => user,
            Err(ServiceError::NotFound(_)) => {
                password::equalize_verification(&password);
                self.audit_login_failure(&req.username, "user not found", ctx)
                    .await;
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !user.is_active() {
            password::equalize_verification(&password);
            self.audit_login_failure(&req.username, "account disabled or deleted", ctx)
                .await;
            return Err(ServiceError::InvalidCredentials);
        }

        let hash = PasswordHashString::new(user.password_hash.clone());
        if !password::verify_password(&password, &hash) {
            self.audit_login_failure(&req.username, "invalid password", ctx)
                .await;
            return Err(ServiceError::InvalidCredentials);
        }

        let access_token = self.tokens.generate_access_token(&user)?;
        let refresh_token = self.tokens.generate_opaque_token()?;
        let session = Session::new(
            user.id,
            access_token.clone(),
            refresh_token.clone(),
            self.refresh_token_ttl_days,
        );
        self.db.create_session(&session).await?;

        tracing::info!(user_id = %user.id, "login succeeded");

        self.audit
            .log(
                user.scope_type().as_str(),
                Some(user.id),
                &user.username,
                ACTION_LOGIN,
                "session",
                &session.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl_seconds(),
        })
    }

    /// Exchange a refresh token for a fresh access token. The refresh token
    /// is returned unchanged; the session row is updated in place with the
    /// new access-token string so validation keeps working, but not rotated.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        ctx: &RequestContext,
    ) -> Result<TokenResponse, ServiceError> {
        let session = match self.db.find_session_by_refresh_token(refresh_token).await {
            Ok(session) => session,
            Err(ServiceError::NotFound(_)) => {
                self.audit_refresh_failure(None, "session not found", ctx).await;
                return Err(ServiceError::InvalidToken);
            }
            Err(e) => return Err(e),
        };

        if !session.is_active() {
            self.audit_refresh_failure(Some(session.user_id), "session revoked or expired", ctx)
                .await;
            return Err(ServiceError::InvalidToken);
        }

        let user = match self.db.find_user_by_id(session.user_id).await {
            Ok(user) if user.is_active() => user,
            Ok(_) | Err(ServiceError::NotFound(_)) => {
                self.audit_refresh_failure(
                    Some(session.user_id),
                    "account disabled or deleted",
                    ctx,
                )
                .await;
                return Err(ServiceError::InvalidToken);
            }
            Err(e) => return Err(e),
        };

        let access_token = self.tokens.generate_access_token(&user)?;
        self.db
            .update_session_access_token(&session.refresh_token, &access_token)
            .await?;

        self.audit
            .log(
                user.scope_type().as_str(),
                Some(user.id),
                &user.username,
                ACTION_TOKEN_REFRESH,
                "session",
                &session.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;

        Ok(TokenResponse {
            access_token,
            refresh_token: session.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.tokens.access_token_ttl_seconds(),
        })
    }

    /// Check an access token: signature and expiry, then a live session for
    /// this exact token string. Any failure yields `{valid: false}` with no
    /// further information. On success the current permissions-version is
    /// fetched and compared against the embedded one.
    pub async fn validate_token(
        &self,
        token: &str,
        ctx: &RequestContext,
    ) -> Result<ValidateResponse, ServiceError> {
        let claims = match self.tokens.validate_access_token(token) {
            Ok(claims) => claims,
            Err(_) => {
                self.audit_validate_failure(None, "invalid or expired token", ctx)
                    .await;
                return Ok(ValidateResponse::invalid());
            }
        };

        let subject = match Uuid::parse_str(&claims.sub) {
            Ok(subject) => subject,
            Err(_) => {
                self.audit_validate_failure(None, "malformed subject claim", ctx)
                    .await;
                return Ok(ValidateResponse::invalid());
            }
        };

        let session = match self.db.find_session_by_access_token(token).await {
            Ok(session) => session,
            Err(ServiceError::NotFound(_)) => {
                self.audit_validate_failure(Some(subject), "no session for token", ctx)
                    .await;
                return Ok(ValidateResponse::invalid());
            }
            Err(e) => return Err(e),
        };

        if !session.is_active() {
            self.audit_validate_failure(Some(subject), "session revoked or expired", ctx)
                .await;
            return Ok(ValidateResponse::invalid());
        }

        let current_version = match self.db.get_permissions_version(subject).await {
            Ok(version) => version,
            Err(ServiceError::NotFound(_)) => {
                self.audit_validate_failure(Some(subject), "account deleted", ctx)
                    .await;
                return Ok(ValidateResponse::invalid());
            }
            Err(e) => return Err(e),
        };

        self.audit
            .log(
                ACTOR_ANONYMOUS,
                Some(subject),
                "",
                ACTION_TOKEN_VALIDATE,
                "session",
                &session.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;

        Ok(ValidateResponse {
            valid: true,
            user_id: Some(claims.sub),
            roles: Some(claims.roles),
            permissions_version: Some(current_version),
            token_permissions_version: Some(claims.permissions_version),
            permissions_stale: Some(current_version != claims.permissions_version),
            organization_id: claims.organization_id,
            client_id: claims.client_id,
        })
    }

    /// Set the revocation timestamp on the session named by the refresh
    /// token.
    pub async fn revoke_token(
        &self,
        actor: &User,
        refresh_token: &str,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        match self.db.revoke_session(refresh_token).await {
            Ok(()) => {}
            Err(ServiceError::NotFound(_)) => {
                self.audit
                    .log(
                        actor.scope_type().as_str(),
                        Some(actor.id),
                        &actor.username,
                        ACTION_TOKEN_REVOKE,
                        "session",
                        "",
                        &ctx.source_ip,
                        &ctx.user_agent,
                        AuditOutcome::Failure,
                        Some("session not found".to_string()),
                        serde_json::json!({}),
                    )
                    .await;
                return Err(ServiceError::InvalidToken);
            }
            Err(e) => return Err(e),
        }

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_TOKEN_REVOKE,
                "session",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;
        Ok(())
    }

    /// The organizations and clients the caller may target. Platform
    /// callers see every active organization with its clients; scoped
    /// callers see only their own subtree.
    pub async fn get_user_scope(
        &self,
        actor: &User,
        ctx: &RequestContext,
    ) -> Result<ScopeResponse, ServiceError> {
        let organizations = match actor.scope_type() {
            ScopeType::Platform => {
                let mut out = Vec::new();
                for org in self.db.list_organizations().await? {
                    let clients = self.db.list_clients_by_organization(org.id).await?;
                    out.push(scope_organization(org.id, org.name, org.slug, clients));
                }
                out
            }
            ScopeType::Organization => {
                let Some(org_id) = actor.organization_id else {
                    return Err(ServiceError::Internal(anyhow::anyhow!(
                        "organization-tier principal without organization"
                    )));
                };
                let org = self.db.find_organization_by_id(org_id).await?;
                let clients = self.db.list_clients_by_organization(org.id).await?;
                vec![scope_organization(org.id, org.name, org.slug, clients)]
            }
            ScopeType::Client => {
                let (Some(org_id), Some(client_id)) = (actor.organization_id, actor.client_id)
                else {
                    return Err(ServiceError::Internal(anyhow::anyhow!(
                        "client-tier principal without scope references"
                    )));
                };
                let org = self.db.find_organization_by_id(org_id).await?;
                let client = self.db.find_client_by_id(client_id).await?;
                vec![scope_organization(org.id, org.name, org.slug, vec![client])]
            }
        };

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_SCOPE_READ,
                "scope",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;

        Ok(ScopeResponse {
            scope_type: actor.scope_type(),
            organizations,
        })
    }

    async fn audit_login_failure(&self, username: &str, reason: &str, ctx: &RequestContext) {
        self.audit
            .log(
                ACTOR_ANONYMOUS,
                None,
                username,
                ACTION_LOGIN,
                "session",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Failure,
                Some(reason.to_string()),
                serde_json::json!({}),
            )
            .await;
    }

    async fn audit_refresh_failure(
        &self,
        user_id: Option<Uuid>,
        reason: &str,
        ctx: &RequestContext,
    ) {
        self.audit
            .log(
                ACTOR_ANONYMOUS,
                user_id,
                "",
                ACTION_TOKEN_REFRESH,
                "session",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Failure,
                Some(reason.to_string()),
                serde_json::json!({}),
            )
            .await;
    }

    async fn audit_validate_failure(
        &self,
        user_id: Option<Uuid>,
        reason: &str,
        ctx: &RequestContext,
    ) {
        self.audit
            .log(
                ACTOR_ANONYMOUS,
                user_id,
                "",
                ACTION_TOKEN_VALIDATE,
                "session",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Failure,
                Some(reason.to_string()),
                serde_json::json!({}),
            )
            .await;
    }
}

fn scope_organization(
    id: Uuid,
    name: String,
    slug: String,
    clients: Vec<Client>,
) -> ScopeOrganization {
    ScopeOrganization {
        id,
        name,
        slug,
        clients: clients
            .into_iter()
            .map(|c| ScopeClient {
                id: c.id,
                name: c.name,
                slug: c.slug,
            })
            .collect(),
    }
}
