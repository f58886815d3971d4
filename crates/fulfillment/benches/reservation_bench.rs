use criterion::{Criterion, criterion_group, criterion_main};
use domain::ProductId;
use fulfillment::{InventoryCoordinator, RetryConfig};
use store::InMemoryStore;

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let inventory = InventoryCoordinator::new(InMemoryStore::new(), RetryConfig::default());
    let product_id = ProductId::new("SKU-BENCH");
    rt.block_on(async {
        inventory
            .create_stock(&product_id, 1_000, 10, None)
            .await
            .unwrap()
    });

    c.bench_function("inventory/reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                inventory.reserve_stock(&product_id, 1).await.unwrap();
                inventory.release_stock(&product_id, 1).await.unwrap();
            });
        });
    });
}

fn bench_contended_reservations(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("inventory/contended_reserve_x8", |b| {
        b.iter(|| {
            rt.block_on(async {
                let inventory = InventoryCoordinator::new(
                    InMemoryStore::new(),
                    RetryConfig::default().with_max_attempts(16),
                );
                let product_id = ProductId::new("SKU-HOT");
                inventory
                    .create_stock(&product_id, 8, 1, None)
                    .await
                    .unwrap();

                let mut handles = Vec::new();
                for _ in 0..8 {
                    let inventory = inventory.clone();
                    let product_id = product_id.clone();
                    handles.push(tokio::spawn(async move {
                        inventory.reserve_stock(&product_id, 1).await.is_ok()
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(benches, bench_reserve_release, bench_contended_reservations);
criterion_main!(benches);
