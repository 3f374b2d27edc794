//! HS256 token issue and verification.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use stylehub_core::UserId;

use crate::{JwtClaims, Role, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies bearer tokens and yields their claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Shared-secret HS256 signer/validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Hs256JwtValidator {
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(&secret),
            decoding: DecodingKey::from_secret(&secret),
            ttl,
        }
    }

    /// Sign a fresh token for `user_id`, valid for the configured ttl from `now`.
    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        roles: Vec<Role>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = JwtClaims {
            sub: user_id,
            email: email.to_string(),
            roles,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding,
        )?)
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        // Expiry lives in `expires_at`, checked by `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(secret: &str) -> Hs256JwtValidator {
        Hs256JwtValidator::new(secret.as_bytes().to_vec(), Duration::minutes(30))
    }

    #[test]
    fn issued_token_validates() {
        let v = validator("s3cret");
        let now = Utc::now();
        let user = UserId::new();
        let token = v.issue(user, "ana@example.com", vec![Role::CUSTOMER], now).unwrap();

        let claims = v.validate(&token, now).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.roles, vec![Role::CUSTOMER]);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = validator("one")
            .issue(UserId::new(), "a@b.c", vec![], now)
            .unwrap();
        assert!(matches!(
            validator("two").validate(&token, now),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let v = validator("s3cret");
        let issued = Utc::now() - Duration::hours(2);
        let token = v.issue(UserId::new(), "a@b.c", vec![], issued).unwrap();
        assert!(matches!(
            v.validate(&token, Utc::now()),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }
}
