//! `stylehub-auth`: authentication and authorization boundary.
//!
//! Roles, permissions and the policy check are pure. Token signing and
//! password hashing wrap `jsonwebtoken` and `argon2`. Nothing here knows about
//! HTTP or storage.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod token;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use password::{PasswordError, hash_password, verify_password};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, permissions_for_roles};
pub use token::{Hs256JwtValidator, JwtValidator, TokenError};
pub use user::{NewUser, UserAccount, avatar_url};
