use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use contabank_core::{AccountId, EntryId, LedgerError, LedgerResult, Money};

/// Kind of monetary movement. Closed set: unknown kinds cannot be
/// constructed, and the sign of the movement is implied by the kind
/// (amounts are always stored as positive magnitudes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Credit,
    Debit,
    LimitAdjustment,
    Bonus,
    TransferCredit,
    TransferDebit,
    Fee,
}

impl EntryKind {
    /// Effect on the account balance: +1 credit side, -1 debit side,
    /// 0 for limit adjustments (they touch `limit`, not `balance`).
    pub fn balance_effect(self) -> i64 {
        match self {
            Self::Credit | Self::TransferCredit | Self::Bonus => 1,
            Self::Debit | Self::TransferDebit | Self::Fee => -1,
            Self::LimitAdjustment => 0,
        }
    }

    /// Stable machine code, as serialized on the wire.
    pub fn code(self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
            Self::LimitAdjustment => "LIMIT_ADJUSTMENT",
            Self::Bonus => "BONUS",
            Self::TransferCredit => "TRANSFER_CREDIT",
            Self::TransferDebit => "TRANSFER_DEBIT",
            Self::Fee => "FEE",
        }
    }

    /// Human-readable statement label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Credit => "Depósito em conta",
            Self::Debit => "Saque em conta",
            Self::LimitAdjustment => "Ajuste de Limite",
            Self::Bonus => "Bônus de Depósito",
            Self::TransferCredit => "Transferência Recebida",
            Self::TransferDebit => "Transferência Enviada",
            Self::Fee => "Taxa de Transferência",
        }
    }
}

impl core::str::FromStr for EntryKind {
    type Err = LedgerError;

    /// Parse a stored machine code. Unknown kinds are rejected: the set is
    /// closed and loosely-tagged labels never enter the ledger.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            "LIMIT_ADJUSTMENT" => Ok(Self::LimitAdjustment),
            "BONUS" => Ok(Self::Bonus),
            "TRANSFER_CREDIT" => Ok(Self::TransferCredit),
            "TRANSFER_DEBIT" => Ok(Self::TransferDebit),
            "FEE" => Ok(Self::Fee),
            other => Err(LedgerError::invalid_id(format!("entry kind '{other}'"))),
        }
    }
}

/// One immutable monetary movement against one account.
///
/// Created exclusively by the engine as a byproduct of a successful
/// mutation; never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    /// Positive magnitude; the sign is implied by `kind`. For
    /// `LimitAdjustment` this holds the new limit value.
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl LedgerEntry {
    /// Record a movement, rejecting amounts the kind does not permit:
    /// monetary movements must be strictly positive, limit adjustments
    /// non-negative (the amount is the new limit, which may stay zero).
    pub fn record(
        account_id: AccountId,
        kind: EntryKind,
        amount: Money,
        occurred_at: DateTime<Utc>,
        description: Option<String>,
    ) -> LedgerResult<Self> {
        let amount_ok = match kind {
            EntryKind::LimitAdjustment => !amount.is_negative(),
            _ => amount.is_positive(),
        };
        if !amount_ok {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(Self {
            id: EntryId::new(),
            account_id,
            kind,
            amount,
            occurred_at,
            description,
        })
    }

    /// Amount in cents, signed by kind (zero for limit adjustments).
    pub fn signed_cents(&self) -> i64 {
        self.amount.cents() * self.kind.balance_effect()
    }
}

/// A statement row: the entry plus its display annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub label: &'static str,
}

impl From<LedgerEntry> for StatementLine {
    fn from(entry: LedgerEntry) -> Self {
        let label = entry.kind.label();
        Self { entry, label }
    }
}
