//! Paginated order reads over a live store

use std::sync::Arc;
use std::time::Duration;

use dine_sync::{DocumentStore, MemoryStore, PaginatedOrders, PaginatedOrdersOptions};
use shared::{Order, OrderStatus};

fn order(id: &str, owner: &str, created_at: i64) -> Order {
    Order {
        id: id.to_string(),
        tenant_id: owner.to_string(),
        sub_scope: None,
        table_number: 1,
        items: vec![],
        total: 0.0,
        status: OrderStatus::Pending,
        created_at,
        resolved_at: None,
    }
}

async fn seeded_store(n: usize) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for i in 0..n {
        store
            .create_order(order(&format!("o1-{i}"), "o1", 1_000 + i as i64))
            .await
            .unwrap();
    }
    // Noise from another tenant
    store.create_order(order("other", "o2", 5_000)).await.unwrap();
    store
}

#[tokio::test]
async fn test_five_documents_page_size_two() {
    let store = seeded_store(5).await;
    let pager =
        PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("o1").with_page_size(2)).await;

    assert_eq!(pager.len(), 2);
    assert!(pager.has_more());

    assert!(pager.load_more().await);
    assert_eq!(pager.len(), 4);
    assert!(pager.has_more());

    assert!(pager.load_more().await);
    assert_eq!(pager.len(), 5);
    assert!(!pager.has_more());

    let reads = store.read_count();
    assert!(!pager.load_more().await);
    assert_eq!(store.read_count(), reads);
    assert_eq!(pager.len(), 5);

    // Newest first, no duplicates across pages
    let ids: Vec<String> = pager.orders().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, ["o1-4", "o1-3", "o1-2", "o1-1", "o1-0"]);
}

#[tokio::test]
async fn test_refresh_restarts_from_first_page() {
    let store = seeded_store(5).await;
    let pager =
        PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("o1").with_page_size(2)).await;
    pager.load_more().await;
    assert_eq!(pager.len(), 4);

    pager.refresh().await;
    assert_eq!(pager.len(), 2);
    assert!(pager.has_more());
}

#[tokio::test(start_paused = true)]
async fn test_load_in_flight_blocks_second_load() {
    let store = seeded_store(5).await;
    let pager = Arc::new(
        PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("o1").with_page_size(2)).await,
    );
    store.set_latency(Some(Duration::from_millis(100)));

    let p = pager.clone();
    let first = tokio::spawn(async move { p.load_more().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(pager.is_loading());
    assert!(!pager.load_more().await);

    assert!(first.await.unwrap());
    assert_eq!(pager.len(), 4);
    assert!(!pager.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_results_after_unmount_are_dropped() {
    let store = seeded_store(5).await;
    let pager = Arc::new(
        PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("o1").with_page_size(2)).await,
    );
    store.set_latency(Some(Duration::from_millis(100)));

    let p = pager.clone();
    let in_flight = tokio::spawn(async move { p.load_more().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    pager.unmount();

    in_flight.await.unwrap();
    assert_eq!(pager.len(), 2);
    assert!(!pager.load_more().await);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_discards_page_loaded_before_it() {
    let store = seeded_store(5).await;
    let pager = Arc::new(
        PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("o1").with_page_size(2)).await,
    );
    store.set_latency(Some(Duration::from_millis(100)));

    let p = pager.clone();
    let older = tokio::spawn(async move { p.load_more().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(pager.is_loading());

    pager.refresh().await;
    assert!(older.await.unwrap());

    // Only the first page from the refresh survives
    let ids: Vec<String> = pager.orders().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, ["o1-4", "o1-3"]);
    assert!(pager.has_more());
    assert!(!pager.is_loading());
}
