//! Optimistic concurrency tokens for conditional account writes.

use crate::error::{LedgerError, LedgerResult};

/// Version expectation for a conditional account update.
///
/// Same-account operations must be serializable; the store rejects a write
/// whose expectation no longer matches the persisted row version.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (migrations, test seeding).
    Any,
    /// Require the row to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> LedgerResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(LedgerError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
