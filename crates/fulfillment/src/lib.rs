//! Inventory coordination and order workflows.
//!
//! [`InventoryCoordinator`] is the single choke point for stock changes.
//! [`OrderOrchestrator`] composes its reservations and releases with order
//! persistence so that each create, update, cancel or delete commits as one
//! unit of work, retrying transparently when it loses a write race.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod inventory;
pub mod orchestrator;
pub mod retry;
mod transaction;
pub mod view;

pub use collaborators::{
    InMemoryProductCatalog, InMemoryUserDirectory, LookupError, Product, ProductCatalog, User,
    UserDirectory,
};
pub use config::{FulfillmentConfig, RetryConfig};
pub use error::{FulfillmentError, Result};
pub use inventory::InventoryCoordinator;
pub use orchestrator::{FAILING_TRANSACTION_PREFIX, OrderOrchestrator};
pub use retry::retry_on_conflict;
pub use view::{OrderItemView, OrderView, UNKNOWN_PRODUCT, UNKNOWN_USER};
