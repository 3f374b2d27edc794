//! API-side authorization guard, checked before any store call.

use stylehub_auth::{AuthzError, CommandAuthorization, Principal, authorize};

use crate::context::PrincipalContext;

pub fn authorize_command<C: CommandAuthorization>(
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal::from_roles(principal.user_id(), principal.roles().to_vec());

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}
