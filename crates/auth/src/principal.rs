use stylehub_core::UserId;

use crate::{Permission, Role, permissions_for_roles};

/// A fully resolved principal for authorization decisions.
///
/// Built from verified token claims; carries the effective permission set so
/// checks do not need to consult the role policy again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let permissions = permissions_for_roles(&roles);
        Self {
            user_id,
            roles,
            permissions,
        }
    }
}
