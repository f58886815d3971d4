//! Demo data for running the server without external user or product services.

use common::{ProductId, UserId};
use domain::Money;
use fulfillment::{
    FulfillmentError, InMemoryProductCatalog, InMemoryUserDirectory, InventoryCoordinator,
    Product, User,
};
use store::Store;

const PRODUCTS: [(&str, &str, i64, u32); 4] = [
    ("LAPTOP-15", "15\" Laptop", 129_900, 25),
    ("MOUSE-WL", "Wireless Mouse", 2_499, 200),
    ("KEYB-MECH", "Mechanical Keyboard", 8_900, 8),
    ("MON-27", "27\" Monitor", 32_900, 0),
];

const USERS: [(&str, &str); 2] = [("Ada", "Lovelace"), ("Alan", "Turing")];

/// Registers demo users and products and creates their stock records.
/// Stock records that already exist are left untouched.
pub async fn seed<S: Store>(
    users: &InMemoryUserDirectory,
    products: &InMemoryProductCatalog,
    inventory: &InventoryCoordinator<S>,
) -> Result<Vec<UserId>, FulfillmentError> {
    let mut user_ids = Vec::with_capacity(USERS.len());
    for (first, last) in USERS {
        let user = User::new(UserId::new(), first, last);
        user_ids.push(user.id);
        users.insert(user).await;
    }

    for (id, name, cents, quantity) in PRODUCTS {
        let product_id = ProductId::new(id);
        products
            .insert(Product::new(id, name, Money::from_cents(cents)))
            .await;

        match inventory.create_stock(&product_id, quantity, 0, None).await {
            Ok(_) | Err(FulfillmentError::AlreadyExists { .. }) => {}
            Err(err) => return Err(err),
        }
    }

    tracing::info!(
        users = user_ids.len(),
        products = PRODUCTS.len(),
        "seeded demo data"
    );
    Ok(user_ids)
}

#[cfg(test)]
mod tests {
    use fulfillment::{ProductCatalog, RetryConfig, UserDirectory};
    use store::InMemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_seed_is_idempotent_for_stock() {
        let store = InMemoryStore::new();
        let inventory = InventoryCoordinator::new(store.clone(), RetryConfig::default());
        let users = InMemoryUserDirectory::new();
        let products = InMemoryProductCatalog::new();

        let ids = seed(&users, &products, &inventory).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(users.find_user(ids[0]).await.is_ok());
        assert!(
            products
                .find_product(&ProductId::new("MOUSE-WL"))
                .await
                .is_ok()
        );
        assert_eq!(store.stock_level(&ProductId::new("MOUSE-WL")).await, Some(200));

        inventory
            .reserve_stock(&ProductId::new("MOUSE-WL"), 5)
            .await
            .unwrap();
        seed(&users, &products, &inventory).await.unwrap();
        assert_eq!(store.stock_level(&ProductId::new("MOUSE-WL")).await, Some(195));
    }
}
