use stylehub_auth::Role;
use stylehub_core::UserId;

/// Principal context for a request (authenticated identity + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    email: String,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, email: String, roles: Vec<Role>) -> Self {
        Self {
            user_id,
            email,
            roles,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
