//! User accounts and registration rules.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stylehub_core::{DomainError, DomainResult, UserId};

use crate::Role;

const AVATAR_BASE: &str = "https://ui-avatars.com/api/?name=";
const MIN_PASSWORD_LEN: usize = 6;

/// A stored user. `password_hash` never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: Role,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

/// Registration input, before hashing.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        if !looks_like_email(&self.email) {
            return Err(DomainError::validation("email is not valid"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }

    /// Build the account. Emails are stored lowercased.
    pub fn into_account(self, role: Role, password_hash: String, now: DateTime<Utc>) -> UserAccount {
        let name = self.name.trim().to_string();
        UserAccount {
            id: UserId::new(),
            avatar: avatar_url(&name),
            email: normalize_email(&self.email),
            name,
            password_hash,
            phone: self.phone.filter(|p| !p.trim().is_empty()),
            role,
            created_at: now,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Generated avatar for a display name.
pub fn avatar_url(name: &str) -> String {
    let mut out = String::from(AVATAR_BASE);
    for b in name.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
