//! Fixed-point money.
//!
//! Amounts, balances and limits are integer cents (scaled by 100), never
//! binary floating point, so fee and bonus computations cannot drift.

use serde::{Deserialize, Serialize};

/// A signed monetary amount in the smallest currency unit (cents).
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units, no fractional part.
    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating-free addition; `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Apply a rate expressed in basis points (1 bps = 0.01%).
    ///
    /// Computed in i128 and truncated toward zero, so `amount - rate(amount)`
    /// always reconciles exactly against the original amount.
    pub fn rate_bps(self, bps: u32) -> Money {
        let scaled = (self.0 as i128 * bps as i128) / 10_000;
        Money(scaled as i64)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
