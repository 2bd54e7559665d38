//! Machine-token lifecycle: issue, validate, list, revoke.

use std::collections::HashMap;
use uuid::Uuid;

use crate::dtos::auth::HecValidateResponse;
use crate::dtos::hec::{CreateHecTokenAttributes, CreateHecTokenRequest};
use crate::models::{AuditOutcome, HecToken, HecTokenResponse, ScopeType, User};
use crate::services::{
    AuditLogger, Database, RequestContext, ServiceError, TokenService, ACTION_HEC_TOKEN_CREATE,
    ACTION_HEC_TOKEN_LIST, ACTION_HEC_TOKEN_REVOKE, ACTION_HEC_TOKEN_VALIDATE, ACTOR_MACHINE,
};

#[derive(Clone)]
pub struct HecService {
    db: Database,
    tokens: TokenService,
    audit: AuditLogger,
}

impl HecService {
    pub fn new(db: Database, tokens: TokenService, audit: AuditLogger) -> Self {
        Self { db, tokens, audit }
    }

    /// Check an opaque machine token. Every call is audited; the audit
    /// logger keeps these events out of the forward pipeline.
    pub async fn validate(
        &self,
        value: &str,
        ctx: &RequestContext,
    ) -> Result<HecValidateResponse, ServiceError> {
        let token = match self.db.find_hec_token_by_value(value).await {
            Ok(token) => token,
            Err(ServiceError::NotFound(_)) => {
                self.audit_validate(None, AuditOutcome::Failure, Some("token not found"), ctx)
                    .await;
                return Ok(HecValidateResponse::invalid());
            }
            Err(e) => return Err(e),
        };

        if !token.is_active() {
            self.audit_validate(
                Some(&token),
                AuditOutcome::Failure,
                Some("token disabled, revoked, or expired"),
                ctx,
            )
            .await;
            return Ok(HecValidateResponse::invalid());
        }

        self.audit_validate(Some(&token), AuditOutcome::Success, None, ctx)
            .await;

        Ok(HecValidateResponse {
            valid: true,
            token_id: Some(token.id),
            client_id: Some(token.client_id),
            name: Some(token.name),
        })
    }

    /// Issue a machine token. The full secret appears in this response and
    /// nowhere else; later reads expose the masked form only.
    pub async fn create(
        &self,
        actor: &User,
        req: CreateHecTokenRequest,
        ctx: &RequestContext,
    ) -> Result<(Uuid, CreateHecTokenAttributes), ServiceError> {
        // The client reference pins the token's data-isolation scope.
        self.db.find_client_by_id(req.client_id).await.map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::Validation("unknown client".to_string()),
            other => other,
        })?;

        let value = self.tokens.generate_opaque_token()?;
        let token = HecToken::new(
            value.clone(),
            req.name,
            actor.id,
            req.client_id,
            actor.id,
            req.expires_at,
        );
        self.db.create_hec_token(&token).await?;

        tracing::info!(token_id = %token.id, client_id = %token.client_id, "machine token issued");

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_HEC_TOKEN_CREATE,
                "hec_token",
                &token.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "name": token.name, "client_id": token.client_id }),
            )
            .await;

        Ok((
            token.id,
            CreateHecTokenAttributes {
                token: value,
                name: token.name,
                client_id: token.client_id,
                expires_at: token.expires_at,
            },
        ))
    }

    /// Revoke by opaque value. Only the owner may revoke; any failure is the
    /// same generic `Unauthorized`.
    pub async fn revoke_by_value(
        &self,
        actor: &User,
        value: &str,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        let token = match self.db.find_hec_token_by_value(value).await {
            Ok(token) => token,
            Err(ServiceError::NotFound(_)) => {
                self.audit_revoke_failure(actor, "", "token not found", ctx).await;
                return Err(ServiceError::Unauthorized);
            }
            Err(e) => return Err(e),
        };
        self.revoke_owned(actor, token, ctx).await
    }

    /// Revoke by id. Same ownership rule as revocation by value.
    pub async fn revoke_by_id(
        &self,
        actor: &User,
        id: Uuid,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        let token = match self.db.find_hec_token_by_id(id).await {
            Ok(token) => token,
            Err(ServiceError::NotFound(_)) => {
                self.audit_revoke_failure(actor, &id.to_string(), "token not found", ctx)
                    .await;
                return Err(ServiceError::Unauthorized);
            }
            Err(e) => return Err(e),
        };
        self.revoke_owned(actor, token, ctx).await
    }

    async fn revoke_owned(
        &self,
        actor: &User,
        token: HecToken,
        ctx: &RequestContext,
    ) -> Result<(), ServiceError> {
        if token.user_id != actor.id {
            self.audit_revoke_failure(actor, &token.id.to_string(), "not token owner", ctx)
                .await;
            return Err(ServiceError::Unauthorized);
        }

        self.db.revoke_hec_token(&token.token).await?;

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_HEC_TOKEN_REVOKE,
                "hec_token",
                &token.id.to_string(),
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({}),
            )
            .await;
        Ok(())
    }

    /// List machine tokens, masked. Platform callers see every token with
    /// owner usernames resolved once per owner; other callers see only
    /// their own.
    pub async fn list(
        &self,
        actor: &User,
        ctx: &RequestContext,
    ) -> Result<Vec<HecTokenResponse>, ServiceError> {
        let is_admin = actor.scope_type() == ScopeType::Platform;

        let tokens = if is_admin {
            self.db.list_hec_tokens().await?
        } else {
            self.db.list_hec_tokens_by_owner(actor.id).await?
        };

        let mut owners: HashMap<Uuid, Option<String>> = HashMap::new();
        if is_admin {
            for token in &tokens {
                if !owners.contains_key(&token.user_id) {
                    let username = match self.db.find_user_by_id(token.user_id).await {
                        Ok(user) => Some(user.username),
                        Err(ServiceError::NotFound(_)) => None,
                        Err(e) => return Err(e),
                    };
                    owners.insert(token.user_id, username);
                }
            }
        }

        let responses = tokens
            .iter()
            .map(|token| {
                let owner = if is_admin {
                    owners.get(&token.user_id).cloned().flatten()
                } else {
                    None
                };
                HecTokenResponse::masked(token, owner)
            })
            .collect();

        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_HEC_TOKEN_LIST,
                "hec_token",
                "",
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Success,
                None,
                serde_json::json!({ "count": tokens.len() }),
            )
            .await;

        Ok(responses)
    }

    async fn audit_validate(
        &self,
        token: Option<&HecToken>,
        outcome: AuditOutcome,
        reason: Option<&str>,
        ctx: &RequestContext,
    ) {
        self.audit
            .log(
                ACTOR_MACHINE,
                token.map(|t| t.user_id),
                token.map(|t| t.name.as_str()).unwrap_or(""),
                ACTION_HEC_TOKEN_VALIDATE,
                "hec_token",
                &token.map(|t| t.id.to_string()).unwrap_or_default(),
                &ctx.source_ip,
                &ctx.user_agent,
                outcome,
                reason.map(|r| r.to_string()),
                serde_json::json!({}),
            )
            .await;
    }

    async fn audit_revoke_failure(
        &self,
        actor: &User,
        token_id: &str,
        reason: &str,
        ctx: &RequestContext,
    ) {
        self.audit
            .log(
                actor.scope_type().as_str(),
                Some(actor.id),
                &actor.username,
                ACTION_HEC_TOKEN_REVOKE,
                "hec_token",
                token_id,
                &ctx.source_ip,
                &ctx.user_agent,
                AuditOutcome::Failure,
                Some(reason.to_string()),
                serde_json::json!({}),
            )
            .await;
    }
}
