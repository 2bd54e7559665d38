use serde::Deserialize;
use std::env;
use telhawk_core::config as core_config;
use telhawk_core::error::AppError;

/// Top-level configuration for the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub audit: AuditConfig,
    pub forward: ForwardConfig,
    pub security: SecurityConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 signing key for access tokens.
    pub access_secret: String,
    /// Reserved for deployments that sign refresh tokens instead of
    /// treating them as opaque.
    pub refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// HMAC key for audit record signatures.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    pub enabled: bool,
    pub url: String,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub read_timeout_seconds: u64,
    pub write_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let config = AuthConfig {
            common,
            service_name: get_env("SERVICE_NAME", Some("telhawk-auth"))?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")))?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None)?,
                max_connections: parse_env("DB_MAX_CONNECTIONS", "25")?,
                min_connections: parse_env("DB_MIN_CONNECTIONS", "5")?,
            },
            jwt: JwtConfig {
                access_secret: get_env("JWT_ACCESS_SECRET", None)?,
                refresh_secret: get_env("JWT_REFRESH_SECRET", None)?,
                access_token_ttl_minutes: parse_env("ACCESS_TOKEN_TTL_MINUTES", "15")?,
                refresh_token_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS", "7")?,
            },
            audit: AuditConfig {
                secret: get_env("AUDIT_SECRET", None)?,
            },
            forward: ForwardConfig {
                enabled: parse_env("FORWARD_ENABLED", "false")?,
                url: get_env("FORWARD_URL", Some(""))?,
                token: get_env("FORWARD_TOKEN", Some(""))?,
            },
            security: SecurityConfig {
                bcrypt_cost: parse_env("BCRYPT_COST", "12")?,
            },
            server: ServerConfig {
                read_timeout_seconds: parse_env("SERVER_READ_TIMEOUT_SECONDS", "30")?,
                write_timeout_seconds: parse_env("SERVER_WRITE_TIMEOUT_SECONDS", "30")?,
                idle_timeout_seconds: parse_env("SERVER_IDLE_TIMEOUT_SECONDS", "120")?,
            },
        };

        if config.forward.enabled && config.forward.url.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "FORWARD_URL is required when FORWARD_ENABLED is true"
            )));
        }

        Ok(config)
    }
}

/// Read an environment variable, falling back to the default when one is
/// given. Variables without a default are required.
fn get_env(name: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(name) {
        Ok(value) => Ok(value),
        Err(_) => match default {
            Some(value) => Ok(value.to_string()),
            None => Err(AppError::Config(anyhow::anyhow!(
                "missing required environment variable {}",
                name
            ))),
        },
    }
}

fn parse_env<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(name, Some(default))?.parse().map_err(|e| {
        AppError::Config(anyhow::anyhow!("invalid value for {}: {}", name, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let value: u32 = parse_env("TELHAWK_TEST_UNSET_VAR", "25").unwrap();
        assert_eq!(value, 25);
    }

    #[test]
    fn missing_required_variable_errors() {
        assert!(get_env("TELHAWK_TEST_MISSING_REQUIRED", None).is_err());
    }

    #[test]
    fn unparsable_value_errors() {
        env::set_var("TELHAWK_TEST_BAD_NUMBER", "not-a-number");
        let result: Result<u32, _> = parse_env("TELHAWK_TEST_BAD_NUMBER", "1");
        assert!(result.is_err());
        env::remove_var("TELHAWK_TEST_BAD_NUMBER");
    }
}
