//! Server configuration from environment variables.
//!
//!   DATABASE_URL           - Postgres connection string (unset: in-memory store)
//!   DATABASE_POOL_SIZE     - pool size (default: 10)
//!   CLAIMS_BIND_ADDR       - listen address (default: 0.0.0.0:8000)
//!   CLAIMS_JWT_SECRET      - JWT HMAC secret
//!   CLAIMS_LOGIN_URL       - redirect target for unauthenticated requests
//!   CLAIMS_RUN_MIGRATIONS  - apply embedded migrations at startup (default: true)

use claims_core::DatabaseConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_LOGIN_URL: &str = "/accounts/login/";
const DEV_JWT_SECRET: &str = "claims-dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database: Option<DatabaseConfig>,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub login_url: String,
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let jwt_secret = match std::env::var("CLAIMS_JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("CLAIMS_JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        Self {
            database: DatabaseConfig::from_env(),
            bind_addr: std::env::var("CLAIMS_BIND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDR.into()),
            jwt_secret,
            login_url: std::env::var("CLAIMS_LOGIN_URL")
                .unwrap_or_else(|_| DEFAULT_LOGIN_URL.into()),
            run_migrations: std::env::var("CLAIMS_RUN_MIGRATIONS")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(" OFF "));
        assert!(!parse_flag("0"));
    }
}
