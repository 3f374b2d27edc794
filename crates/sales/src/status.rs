use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stylehub_core::DomainError;

/// Sale status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl SaleStatus {
    pub const ALL: [SaleStatus; 4] = [
        SaleStatus::Pending,
        SaleStatus::Completed,
        SaleStatus::Cancelled,
        SaleStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
            SaleStatus::Refunded => "refunded",
        }
    }

    /// Edges of the strict lifecycle.
    fn strict_successors(&self) -> &'static [SaleStatus] {
        match self {
            SaleStatus::Pending => &[SaleStatus::Completed, SaleStatus::Cancelled],
            SaleStatus::Completed => &[SaleStatus::Refunded, SaleStatus::Cancelled],
            SaleStatus::Cancelled | SaleStatus::Refunded => &[],
        }
    }
}

impl core::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SaleStatus::Pending),
            "completed" => Ok(SaleStatus::Completed),
            "cancelled" => Ok(SaleStatus::Cancelled),
            "refunded" => Ok(SaleStatus::Refunded),
            other => Err(DomainError::validation(format!(
                "invalid status '{other}': must be one of pending, completed, cancelled, refunded"
            ))),
        }
    }
}

/// How status updates are checked against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Any status may move to any other status.
    #[default]
    Permissive,
    /// pending -> completed|cancelled, completed -> refunded|cancelled;
    /// cancelled and refunded are terminal.
    Strict,
}

impl TransitionPolicy {
    /// Check a requested change. Re-applying the current status is always allowed.
    pub fn ensure_allowed(&self, from: SaleStatus, to: SaleStatus) -> Result<(), DomainError> {
        if from == to || *self == TransitionPolicy::Permissive {
            return Ok(());
        }
        if from.strict_successors().contains(&to) {
            Ok(())
        } else {
            Err(DomainError::invariant(format!(
                "cannot change sale status from {from} to {to}"
            )))
        }
    }
}
