//! Startup wiring: store selection, schema bootstrap and admin seeding.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use stylehub_auth::{NewUser, PasswordError, Role, hash_password};
use stylehub_core::DomainError;

use crate::config::{AdminSeed, AppConfig};
use crate::store::{InMemoryStore, PostgresStore, SalesStore, StoreError, USER_EMAIL_CONSTRAINT};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("invalid admin account: {0}")]
    InvalidAdmin(DomainError),
}

/// Postgres when `DATABASE_URL` is set (schema created if missing), in-memory otherwise.
pub async fn connect_store(config: &AppConfig) -> Result<Arc<dyn SalesStore>, BootstrapError> {
    match &config.database_url {
        Some(url) => {
            let store =
                PostgresStore::connect(url, config.db_max_connections, config.sale_tx_timeout)
                    .await?;
            store.bootstrap_schema().await?;
            tracing::info!(max_connections = config.db_max_connections, "using postgres store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

/// Create the admin account unless a user with that email already exists.
///
/// Returns `true` when an account was created.
pub async fn seed_admin(store: &dyn SalesStore, seed: &AdminSeed) -> Result<bool, BootstrapError> {
    if store.find_user_by_email(&seed.email).await?.is_some() {
        tracing::debug!(email = %seed.email, "admin account already present");
        return Ok(false);
    }

    let new_user = NewUser {
        name: seed.name.clone(),
        email: seed.email.clone(),
        password: seed.password.clone(),
        phone: None,
    };
    new_user.validate().map_err(BootstrapError::InvalidAdmin)?;

    let hash = hash_password(&seed.password)?;
    let account = new_user.into_account(Role::ADMIN, hash, Utc::now());

    match store.insert_user(&account).await {
        Ok(()) => {
            tracing::info!(user_id = %account.id, "admin account created");
            Ok(true)
        }
        // Another instance seeded it first.
        Err(e) if e.is_unique_violation_of(USER_EMAIL_CONSTRAINT) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> AdminSeed {
        AdminSeed {
            email: "Root@Example.com".to_string(),
            password: "changeme".to_string(),
            name: "Root".to_string(),
        }
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let store = InMemoryStore::new();

        assert!(seed_admin(&store, &seed()).await.unwrap());
        assert!(!seed_admin(&store, &seed()).await.unwrap());

        let admin = store
            .find_user_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::ADMIN);
        assert_ne!(admin.password_hash, "changeme");
    }

    #[tokio::test]
    async fn invalid_admin_email_is_reported() {
        let store = InMemoryStore::new();
        let mut bad = seed();
        bad.email = "root".to_string();
        assert!(matches!(
            seed_admin(&store, &bad).await,
            Err(BootstrapError::InvalidAdmin(_))
        ));
    }

    #[tokio::test]
    async fn in_memory_store_without_database_url() {
        let config = AppConfig::default();
        assert!(connect_store(&config).await.is_ok());
    }
}
