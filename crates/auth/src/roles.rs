use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: Role = Role(Cow::Borrowed("admin"));
    pub const CUSTOMER: Role = Role(Cow::Borrowed("customer"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role→permission policy.
///
/// `admin` holds the wildcard. `customer` may place sales. Unknown roles get nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    if roles.iter().any(|r| r == &Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    let mut perms = Vec::new();
    if roles.iter().any(|r| r == &Role::CUSTOMER) {
        perms.push(Permission::SALES_CREATE);
    }
    perms
}
