//! External collaborators consumed by the order workflows, with in-memory
//! implementations for tests and demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, UserId};
use domain::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A user as seen through the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    pub fn new(id: UserId, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// A catalog product. Read-only from the fulfillment side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub active: bool,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("not found")]
    NotFound,

    #[error("lookup unavailable: {0}")]
    Unavailable(String),
}

/// `getUserById`.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<User, LookupError>;
}

/// `getProductById`.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find_product(&self, id: &ProductId) -> Result<Product, LookupError>;
}

#[async_trait]
impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    async fn find_user(&self, id: UserId) -> Result<User, LookupError> {
        (**self).find_user(id).await
    }
}

#[async_trait]
impl<T: ProductCatalog + ?Sized> ProductCatalog for Arc<T> {
    async fn find_product(&self, id: &ProductId) -> Result<Product, LookupError> {
        (**self).find_product(id).await
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<UserId, User>,
    unavailable: bool,
}

/// In-memory user directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    /// Makes every lookup fail with [`LookupError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, id: UserId) -> Result<User, LookupError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(LookupError::Unavailable("user directory offline".to_string()));
        }
        state.users.get(&id).cloned().ok_or(LookupError::NotFound)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    unavailable: bool,
}

/// In-memory product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Makes every lookup fail with [`LookupError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn find_product(&self, id: &ProductId) -> Result<Product, LookupError> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(LookupError::Unavailable("product catalog offline".to_string()));
        }
        state.products.get(id).cloned().ok_or(LookupError::NotFound)
    }
}
