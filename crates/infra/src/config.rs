//! Process configuration from the environment (and an optional `.env`).

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use stylehub_observability::LogFormat;
use stylehub_sales::TransitionPolicy;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} is set but {1} is missing")]
    Incomplete(&'static str, &'static str),
}

/// Seed account created at startup when absent.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Upper bound on one sale transaction (also used as lock/statement timeout).
    pub sale_tx_timeout: Duration,
    pub status_policy: TransitionPolicy,
    pub admin: Option<AdminSeed>,
    pub log_format: LogFormat,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database_url.as_ref().map(|_| "postgres"))
            .field("db_max_connections", &self.db_max_connections)
            .field("token_ttl", &self.token_ttl)
            .field("sale_tx_timeout", &self.sale_tx_timeout)
            .field("status_policy", &self.status_policy)
            .field("admin", &self.admin)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    /// In-memory, permissive, 5 s sale bound. Used by tests.
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            db_max_connections: 10,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl: Duration::from_secs(60 * 60),
            sale_tx_timeout: Duration::from_millis(5000),
            status_policy: TransitionPolicy::Permissive,
            admin: None,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDR", e))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 10u32)?;
        if db_max_connections == 0 {
            return Err(invalid("DB_MAX_CONNECTIONS", "must be > 0"));
        }

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEFAULT_JWT_SECRET.to_string()
        });

        let ttl_minutes = parse_or("TOKEN_TTL_MINUTES", get("TOKEN_TTL_MINUTES"), 60u64)?;
        if ttl_minutes == 0 {
            return Err(invalid("TOKEN_TTL_MINUTES", "must be > 0"));
        }

        let tx_millis = parse_or("SALE_TX_TIMEOUT_MS", get("SALE_TX_TIMEOUT_MS"), 5000u64)?;
        if tx_millis == 0 {
            return Err(invalid("SALE_TX_TIMEOUT_MS", "must be > 0"));
        }

        let strict = parse_or("STRICT_STATUS_TRANSITIONS", get("STRICT_STATUS_TRANSITIONS"), false)?;

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            (Some(_), None) => return Err(ConfigError::Incomplete("ADMIN_EMAIL", "ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("ADMIN_PASSWORD", "ADMIN_EMAIL")),
            (None, None) => None,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().map_err(|e| invalid("LOG_FORMAT", e))?,
            None => LogFormat::Json,
        };

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            jwt_secret,
            token_ttl: Duration::from_secs(ttl_minutes * 60),
            sale_tx_timeout: Duration::from_millis(tx_millis),
            status_policy: if strict {
                TransitionPolicy::Strict
            } else {
                TransitionPolicy::Permissive
            },
            admin,
            log_format,
        })
    }
}

fn invalid(var: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: ToString,
{
    match raw {
        Some(v) => v.trim().parse::<T>().map_err(|e| invalid(var, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_select_in_memory_and_permissive() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.bind_addr.port(), 8080);
        assert_eq!(cfg.sale_tx_timeout, Duration::from_millis(5000));
        assert_eq!(cfg.status_policy, TransitionPolicy::Permissive);
        assert_eq!(cfg.jwt_secret, "dev-secret");
        assert!(cfg.admin.is_none());
    }

    #[test]
    fn reads_overrides() {
        let cfg = from(&[
            ("BIND_ADDR", "127.0.0.1:3000"),
            ("DATABASE_URL", "postgres://localhost/stylehub"),
            ("SALE_TX_TIMEOUT_MS", "250"),
            ("STRICT_STATUS_TRANSITIONS", "true"),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "changeme"),
            ("LOG_FORMAT", "pretty"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 3000);
        assert!(cfg.database_url.is_some());
        assert_eq!(cfg.sale_tx_timeout, Duration::from_millis(250));
        assert_eq!(cfg.status_policy, TransitionPolicy::Strict);
        assert_eq!(cfg.admin.unwrap().name, "Administrator");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            from(&[("SALE_TX_TIMEOUT_MS", "soon")]),
            Err(ConfigError::Invalid { var: "SALE_TX_TIMEOUT_MS", .. })
        ));
        assert!(matches!(
            from(&[("STRICT_STATUS_TRANSITIONS", "maybe")]),
            Err(ConfigError::Invalid { .. })
        ));
        assert_eq!(
            from(&[("ADMIN_EMAIL", "root@example.com")]).unwrap_err(),
            ConfigError::Incomplete("ADMIN_EMAIL", "ADMIN_PASSWORD")
        );
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = from(&[
            ("JWT_SECRET", "top-secret-value"),
            ("ADMIN_EMAIL", "root@example.com"),
            ("ADMIN_PASSWORD", "hunter22"),
        ])
        .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("top-secret-value"));
        assert!(!dbg.contains("hunter22"));
    }
}
