//! Order number generation.
//!
//! `ORD-<unix millis>-<6 uppercase alphanumerics>`. Collisions are unlikely but
//! possible; the store's unique constraint on `order_number` is what actually
//! guarantees uniqueness, and the sale's id is its identity.

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

const PREFIX: &str = "ORD";
const SUFFIX_LEN: usize = 6;

/// Human-facing order reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>) -> Self {
        Self::generate_with(now, &mut rand::rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Self {
        let suffix: String = rng
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(|b| char::from(b).to_ascii_uppercase())
            .collect();
        Self(format!("{PREFIX}-{}-{suffix}", now.timestamp_millis()))
    }

    /// Wrap a value read back from the store.
    pub fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
