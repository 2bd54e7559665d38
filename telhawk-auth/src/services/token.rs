//! Token codec: signed access tokens and opaque refresh tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::models::User;
use crate::services::ServiceError;

/// Bytes of entropy behind each opaque token.
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Claims carried by an access token. Validation never consults the
/// repository; the session check in the auth service does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (principal id)
    pub sub: String,
    /// Legacy role tags
    pub roles: Vec<String>,
    /// Permissions-version counter at issuance
    pub permissions_version: i64,
    /// Primary organization, when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Primary client, when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Token service for access-token signing and opaque-token generation.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl_minutes: i64,
}

impl TokenService {
    /// Create a new token service from the HS256 access secret.
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            access_token_ttl_minutes: config.access_token_ttl_minutes,
        }
    }

    /// Access-token lifetime in seconds, for `expires_in` responses.
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_minutes * 60
    }

    /// Sign an access token embedding the principal's current
    /// permissions-version and scope references.
    pub fn generate_access_token(&self, user: &User) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_ttl_minutes);

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            roles: user.roles.clone(),
            permissions_version: user.permissions_version,
            organization_id: user.organization_id.map(|id| id.to_string()),
            client_id: user.client_id.map(|id| id.to_string()),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to sign access token: {}", e)))
    }

    /// Check signature, expiry, and structural integrity. Does not consult
    /// the repository.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| ServiceError::InvalidToken)
    }

    /// Generate an opaque token: 32 bytes of CSPRNG output, base64url
    /// encoded. Used for refresh tokens and machine tokens.
    pub fn generate_opaque_token(&self) -> Result<String, ServiceError> {
        let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("entropy source failure: {}", e)))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::new_id;

    fn service() -> TokenService {
        TokenService::new(&JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
        })
    }

    fn user() -> User {
        User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "$2b$04$hash".to_string(),
            vec!["viewer".to_string()],
            Some(new_id()),
            None,
            None,
        )
    }

    #[test]
    fn issued_token_validates_within_ttl() {
        let service = service();
        let user = user();

        let token = service.generate_access_token(&user).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.roles, vec!["viewer".to_string()]);
        assert_eq!(claims.permissions_version, 1);
        assert_eq!(
            claims.organization_id,
            user.organization_id.map(|id| id.to_string())
        );
        assert!(claims.client_id.is_none());
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = service();
        let token = service.generate_access_token(&user()).unwrap();

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

        assert!(matches!(
            service.validate_access_token(&tampered),
            Err(ServiceError::InvalidToken)
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let service = service();
        let other = TokenService::new(&JwtConfig {
            access_secret: "a-different-secret".to_string(),
            refresh_secret: String::new(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
        });

        let token = other.generate_access_token(&user()).unwrap();
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(service().validate_access_token("not-a-jwt").is_err());
    }

    #[test]
    fn opaque_tokens_are_unique_and_url_safe() {
        let service = service();
        let a = service.generate_opaque_token().unwrap();
        let b = service.generate_opaque_token().unwrap();

        assert_ne!(a, b);
        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
