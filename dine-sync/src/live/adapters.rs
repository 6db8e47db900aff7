//! Live subscription adapters
//!
//! Thin layer between [`DocumentStore`] change streams and watchers. Every
//! callback receives the full current list matching the filter, never only
//! the delta. The order variant also tags the first delivery after
//! subscribing as the baseline snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use shared::{Order, WaiterCall};

use crate::backend::{
    BackendResult, ChangeSet, DocumentStore, OrderFilter, Subscription, WaiterCallFilter,
};

/// Pending waiter calls of `tenant_id`, full list on every change
pub fn subscribe_waiter_calls<F>(
    store: &dyn DocumentStore,
    tenant_id: &str,
    on_change: F,
) -> BackendResult<Subscription>
where
    F: Fn(Vec<WaiterCall>) + Send + Sync + 'static,
{
    let filter = WaiterCallFilter::pending(tenant_id);
    store.subscribe_waiter_calls(
        filter,
        Arc::new(move |set: ChangeSet<WaiterCall>| on_change(set.docs)),
    )
}

/// Orders matching `filter`, full list on every change
pub fn subscribe_orders<F>(
    store: &dyn DocumentStore,
    filter: OrderFilter,
    on_change: F,
) -> BackendResult<Subscription>
where
    F: Fn(Vec<Order>) + Send + Sync + 'static,
{
    store.subscribe_orders(
        filter,
        Arc::new(move |set: ChangeSet<Order>| on_change(set.docs)),
    )
}

/// One delivery on the order feed
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFeedEvent {
    /// Full current list
    pub orders: Vec<Order>,
    pub added: Vec<Order>,
    pub modified: Vec<Order>,
    /// First delivery after subscribing: replay of existing documents
    pub is_baseline: bool,
}

/// Order change feed distinguishing added/modified documents
pub fn subscribe_order_events<F>(
    store: &dyn DocumentStore,
    filter: OrderFilter,
    on_event: F,
) -> BackendResult<Subscription>
where
    F: Fn(OrderFeedEvent) + Send + Sync + 'static,
{
    let seen_baseline = AtomicBool::new(false);
    store.subscribe_orders(
        filter,
        Arc::new(move |set: ChangeSet<Order>| {
            let is_baseline = !seen_baseline.swap(true, Ordering::SeqCst);
            let added = set.added().cloned().collect();
            let modified = set.modified().cloned().collect();
            on_event(OrderFeedEvent {
                orders: set.docs,
                added,
                modified,
                is_baseline,
            });
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use parking_lot::Mutex;
    use shared::{OrderPatch, OrderStatus, WaiterCallPatch};

    fn order(id: &str, created_at: i64) -> Order {
        Order {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            sub_scope: None,
            table_number: 1,
            items: vec![],
            total: 0.0,
            status: OrderStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn test_waiter_calls_full_list_and_dispose() {
        let store = MemoryStore::new();
        store
            .create_waiter_call(WaiterCall::new("w1", "t1", 5, 100))
            .await
            .unwrap();

        let log: Arc<Mutex<Vec<Vec<WaiterCall>>>> = Arc::default();
        let sink = log.clone();
        let sub = subscribe_waiter_calls(&store, "t1", move |calls| sink.lock().push(calls)).unwrap();

        store
            .create_waiter_call(WaiterCall::new("w2", "t1", 6, 200))
            .await
            .unwrap();
        store
            .update_waiter_call("w1", &WaiterCallPatch::resolve(300))
            .await
            .unwrap();

        {
            let log = log.lock();
            assert_eq!(log.len(), 3);
            assert_eq!(log[0].len(), 1);
            assert_eq!(log[1].len(), 2);
            // 已处理的呼叫离开 pending 列表
            assert_eq!(log[2].len(), 1);
            assert_eq!(log[2][0].id, "w2");
        }

        sub.dispose();
        assert_eq!(store.waiter_call_listener_count(), 0);
        store
            .create_waiter_call(WaiterCall::new("w3", "t1", 7, 400))
            .await
            .unwrap();
        assert_eq!(log.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_order_feed_tags_baseline() {
        let store = MemoryStore::new();
        store.create_order(order("o1", 1)).await.unwrap();

        let events: Arc<Mutex<Vec<OrderFeedEvent>>> = Arc::default();
        let sink = events.clone();
        let _sub = subscribe_order_events(&store, OrderFilter::tenant("t1"), move |e| {
            sink.lock().push(e)
        })
        .unwrap();

        store.create_order(order("o2", 2)).await.unwrap();
        store
            .update_order("o1", &OrderPatch::status(OrderStatus::Accepted, 3))
            .await
            .unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 3);

        assert!(events[0].is_baseline);
        assert_eq!(events[0].added.len(), 1);

        assert!(!events[1].is_baseline);
        assert_eq!(events[1].added[0].id, "o2");
        assert_eq!(events[1].orders.len(), 2);

        assert!(!events[2].is_baseline);
        assert!(events[2].added.is_empty());
        assert_eq!(events[2].modified[0].status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_empty_baseline_still_counts() {
        let store = MemoryStore::new();
        let events: Arc<Mutex<Vec<OrderFeedEvent>>> = Arc::default();
        let sink = events.clone();
        let _sub = subscribe_order_events(&store, OrderFilter::tenant("t1"), move |e| {
            sink.lock().push(e)
        })
        .unwrap();
        store.create_order(order("o1", 1)).await.unwrap();

        let events = events.lock();
        assert!(events[0].is_baseline && events[0].orders.is_empty());
        assert!(!events[1].is_baseline);
        assert_eq!(events[1].added.len(), 1);
    }
}
