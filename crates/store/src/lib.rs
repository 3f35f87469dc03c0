//! `contabank-store` — `LedgerStore` implementations.
//!
//! Two backends: [`MemoryStore`] for tests and development, and
//! [`PostgresStore`] for production state behind a sqlx connection pool.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
