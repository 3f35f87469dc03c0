//! Entity traits: identity + ownership.

use crate::error::{LedgerError, LedgerResult};
use crate::id::ClientId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Entity owned by a client.
///
/// Every intent except crediting a transfer destination requires the caller
/// to own the touched entity; `ensure_owned_by` is that single check.
pub trait OwnedEntity: Entity {
    /// The owning client (immutable after creation).
    fn owner(&self) -> ClientId;

    /// Fails with `Unauthorized` when `caller` is not the owner.
    fn ensure_owned_by(&self, caller: ClientId) -> LedgerResult<()> {
        if self.owner() == caller {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized)
        }
    }
}
