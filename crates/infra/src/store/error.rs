use thiserror::Error;

use stylehub_core::{DomainError, ProductId};

/// Constraint name guarding order-number uniqueness.
pub const ORDER_NUMBER_CONSTRAINT: &str = "sales_order_number_key";
/// Constraint name guarding email uniqueness.
pub const USER_EMAIL_CONSTRAINT: &str = "users_email_key";

/// Storage-layer failure.
///
/// Messages may contain database detail; they are for logs, never for HTTP bodies.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    #[error("check constraint violated: {0}")]
    CheckViolation(String),

    /// Lock wait or statement exceeded its bound.
    #[error("store timeout: {0}")]
    Timeout(String),

    #[error("not found")]
    NotFound,

    /// A guarded debit found less stock than requested.
    #[error("insufficient stock for product {0}")]
    InsufficientStock(ProductId),

    /// The domain refused the change (e.g. a disallowed status transition).
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_unique_violation_of(&self, name: &str) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint == name)
    }
}

/// Map a sqlx error by SQLSTATE.
///
/// | SQLSTATE | meaning | StoreError |
/// |---|---|---|
/// | `23505` | unique violation | `UniqueViolation` |
/// | `23514` | check violation | `CheckViolation` |
/// | `55P03` | lock not available | `Timeout` |
/// | `57014` | query canceled (statement timeout) | `Timeout` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());

            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                },
                Some("23514") => StoreError::CheckViolation(msg),
                Some("55P03") | Some("57014") => StoreError::Timeout(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        _ => StoreError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_matches_by_constraint_name() {
        let err = StoreError::UniqueViolation {
            constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
        };
        assert!(err.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT));
        assert!(!err.is_unique_violation_of(USER_EMAIL_CONSTRAINT));
        assert!(!StoreError::NotFound.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT));
    }

    #[test]
    fn pool_errors_are_mapped() {
        assert!(matches!(
            map_sqlx_error("op", sqlx::Error::PoolTimedOut),
            StoreError::Timeout(_)
        ));
        assert_eq!(map_sqlx_error("op", sqlx::Error::RowNotFound), StoreError::NotFound);
    }
}
