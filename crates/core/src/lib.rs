//! `contabank-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod version;

pub use entity::{Entity, OwnedEntity};
pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, ClientId, EntryId};
pub use money::Money;
pub use version::ExpectedVersion;
