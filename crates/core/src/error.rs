//! Domain error model.

use thiserror::Error;

use crate::money::Money;

/// Result type used across the domain layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Domain-level error.
///
/// Every failure the engine can produce is one of these variants; nothing in
/// the engine is fatal to the process. The external API layer maps `code()`
/// to transport status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A monetary amount was zero or negative where a positive one is required.
    #[error("amount must be positive")]
    InvalidAmount,

    /// The limit-adjusted balance cannot cover the requested debit.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// No account matches the given id or number.
    #[error("account not found")]
    AccountNotFound,

    /// The caller does not own the account it is operating on.
    #[error("unauthorized")]
    Unauthorized,

    /// Transfer source and destination are the same account.
    #[error("cannot transfer to the same account")]
    SameAccountTransfer,

    /// Credit limits are monotonically non-decreasing.
    #[error("limit may not be lowered (current {current}, requested {requested})")]
    LimitDecreaseRejected { current: Money, requested: Money },

    /// The cross-owner fee would consume the whole transferred amount.
    #[error("fee leaves nothing to credit")]
    FeeMakesAmountNonPositive,

    /// Optimistic concurrency check failed; the caller may retry the intent.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Account number space near-exhausted; generation retries were capped.
    #[error("account number generation exhausted after {attempts} attempts")]
    ResourceExhausted { attempts: u32 },

    /// Closing an account that still carries a balance is disabled by policy.
    #[error("account balance must be zero before closing")]
    BalanceNotZero,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The store layer failed for a non-domain reason (I/O, pool, timeout).
    #[error("store unavailable: {0}")]
    Store(String),
}

impl LedgerError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Stable machine-readable code for the API layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::InsufficientFunds => "insufficient_funds",
            Self::AccountNotFound => "account_not_found",
            Self::Unauthorized => "unauthorized",
            Self::SameAccountTransfer => "same_account_transfer",
            Self::LimitDecreaseRejected { .. } => "limit_decrease_rejected",
            Self::FeeMakesAmountNonPositive => "fee_makes_amount_non_positive",
            Self::Conflict(_) => "conflict",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::BalanceNotZero => "balance_not_zero",
            Self::InvalidId(_) => "invalid_id",
            Self::Store(_) => "store_unavailable",
        }
    }

    /// Whether retrying the whole intent can succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(LedgerError::InsufficientFunds.code(), "insufficient_funds");
        assert_eq!(
            LedgerError::conflict("version mismatch").code(),
            "conflict"
        );
        assert_eq!(
            LedgerError::ResourceExhausted { attempts: 16 }.code(),
            "resource_exhausted"
        );
    }

    #[test]
    fn only_infrastructure_failures_are_retryable() {
        assert!(LedgerError::conflict("x").is_retryable());
        assert!(LedgerError::store("pool closed").is_retryable());
        assert!(!LedgerError::InvalidAmount.is_retryable());
        assert!(!LedgerError::Unauthorized.is_retryable());
    }
}
