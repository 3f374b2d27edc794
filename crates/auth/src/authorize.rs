use std::collections::HashSet;

use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract.
///
/// Implement this on requests that require permissions; the API layer checks
/// them before calling into the store.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use stylehub_core::UserId;

    #[test]
    fn wildcard_allows_everything() {
        let admin = Principal::from_roles(UserId::new(), vec![Role::ADMIN]);
        assert!(authorize(&admin, &Permission::SALES_UPDATE_STATUS).is_ok());
        assert!(authorize(&admin, &Permission::new("anything.at.all")).is_ok());
    }

    #[test]
    fn customer_cannot_read_all_sales() {
        let customer = Principal::from_roles(UserId::new(), vec![Role::CUSTOMER]);
        assert!(authorize(&customer, &Permission::SALES_CREATE).is_ok());
        assert_eq!(
            authorize(&customer, &Permission::SALES_READ),
            Err(AuthzError::Forbidden("sales.read".to_string()))
        );
    }
}
