//! Ledger policy: the tunable numbers and flags of the engine.

use serde::Deserialize;

/// Engine configuration. All fields have production defaults so a policy can
/// be deserialized from a partial config file or constructed with
/// `LedgerPolicy::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerPolicy {
    /// Deposit bonus rate in basis points, applied when the owner's total
    /// balance across all accounts is below the deposited amount.
    pub deposit_bonus_bps: u32,
    /// Cross-owner transfer fee rate in basis points.
    pub transfer_fee_bps: u32,
    /// Cap on account-number generation attempts before giving up with
    /// `ResourceExhausted` instead of looping on a near-exhausted space.
    pub max_number_attempts: u32,
    /// Whether an account may be closed while its balance is non-zero.
    pub allow_closing_with_balance: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            deposit_bonus_bps: 1_000,
            transfer_fee_bps: 1_000,
            max_number_attempts: 16,
            allow_closing_with_balance: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_ten_percent_rates() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.deposit_bonus_bps, 1_000);
        assert_eq!(policy.transfer_fee_bps, 1_000);
        assert_eq!(policy.max_number_attempts, 16);
        assert!(!policy.allow_closing_with_balance);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let policy: LedgerPolicy =
            serde_json::from_str(r#"{ "transfer_fee_bps": 250 }"#).unwrap();
        assert_eq!(policy.transfer_fee_bps, 250);
        assert_eq!(policy.deposit_bonus_bps, 1_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<LedgerPolicy>(r#"{ "interest_rate": 1 }"#);
        assert!(err.is_err());
    }
}
