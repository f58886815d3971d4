//! Persistence for the fulfillment engine.
//!
//! Every read and write happens inside a [`Transaction`] obtained from a
//! [`Store`]. A transaction either commits all of its writes or none of them,
//! and a commit that raced with another writer fails with
//! [`StoreError::Conflict`] so the caller can retry the whole unit of work.
//!
//! Two implementations are provided:
//! - [`InMemoryStore`]: staged writes validated against record versions at commit
//! - [`PostgresStore`]: `SERIALIZABLE` transactions with single-statement
//!   conditional stock updates

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use repository::{MovementOutcome, OrderRepository, StockRepository, Store, Transaction};
