//! In-process document store
//!
//! Mirrors the behavior the sync core relies on from the managed backend:
//!
//! - writes fan out to every listener whose filter matches the old or new
//!   version of the document
//! - each listener receives the full materialized result set plus the delta
//! - a new listener immediately receives a baseline snapshot in which every
//!   matching document appears as `added`
//!
//! Fault injection (`fail_next`) and simulated latency let tests exercise
//! retry and unmount paths.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use shared::{Order, OrderPatch, WaiterCall, WaiterCallPatch};

use super::{
    BackendError, BackendResult, ChangeCallback, ChangeKind, ChangeSet, Cursor, Document,
    DocumentChange, DocumentStore, Filter, OrderFilter, OrderQuery, Subscription,
    WaiterCallFilter,
};

// ============================================================================
// Collection
// ============================================================================

struct Listener<D, F> {
    filter: F,
    callback: ChangeCallback<D>,
    /// Matching documents as of the last delivery (delta base)
    last_seen: Mutex<HashMap<String, D>>,
    /// Held from snapshot read through callback; deliveries never interleave.
    /// Reentrant: a callback may write to the same collection.
    delivery: ReentrantMutex<()>,
}

impl<D: Document, F: Filter<D>> Listener<D, F> {
    /// Deliver the current view if it differs from the last delivery
    fn notify(&self, read: impl FnOnce() -> Vec<D>) {
        let _delivery = self.delivery.lock();
        let all_docs = read();
        let mut docs: Vec<D> = all_docs
            .iter()
            .filter(|d| self.filter.matches(d))
            .cloned()
            .collect();
        sort_desc(&mut docs);

        let changes = {
            let mut last_seen = self.last_seen.lock();
            let mut changes = Vec::new();
            for doc in &docs {
                match last_seen.get(doc.id()) {
                    None => changes.push(DocumentChange {
                        kind: ChangeKind::Added,
                        doc: doc.clone(),
                    }),
                    Some(prev) if prev != doc => changes.push(DocumentChange {
                        kind: ChangeKind::Modified,
                        doc: doc.clone(),
                    }),
                    Some(_) => {}
                }
            }
            for (id, prev) in last_seen.iter() {
                if !docs.iter().any(|d| d.id() == id) {
                    changes.push(DocumentChange {
                        kind: ChangeKind::Removed,
                        doc: prev.clone(),
                    });
                }
            }
            if !changes.is_empty() {
                *last_seen = docs.iter().map(|d| (d.id().to_string(), d.clone())).collect();
            }
            changes
        };

        if changes.is_empty() {
            return;
        }
        (self.callback)(ChangeSet { docs, changes });
    }

    /// First delivery: every matching document as `added`, even when empty
    fn baseline(&self, all_docs: &[D]) {
        let mut docs: Vec<D> = all_docs
            .iter()
            .filter(|d| self.filter.matches(d))
            .cloned()
            .collect();
        sort_desc(&mut docs);
        *self.last_seen.lock() = docs.iter().map(|d| (d.id().to_string(), d.clone())).collect();
        let changes = docs
            .iter()
            .map(|d| DocumentChange {
                kind: ChangeKind::Added,
                doc: d.clone(),
            })
            .collect();
        (self.callback)(ChangeSet { docs, changes });
    }
}

/// `created_at` descending, id descending as tiebreak
fn sort_desc<D: Document>(docs: &mut [D]) {
    docs.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(a.id()))
    });
}

struct Collection<D, F> {
    name: &'static str,
    docs: RwLock<HashMap<String, D>>,
    listeners: Arc<DashMap<u64, Arc<Listener<D, F>>>>,
    next_listener_id: AtomicU64,
}

impl<D: Document, F: Filter<D>> Collection<D, F> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            docs: RwLock::new(HashMap::new()),
            listeners: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    fn get(&self, id: &str) -> Option<D> {
        self.docs.read().get(id).cloned()
    }

    fn snapshot(&self) -> Vec<D> {
        self.docs.read().values().cloned().collect()
    }

    fn insert(&self, doc: D) -> BackendResult<()> {
        {
            let mut docs = self.docs.write();
            if docs.contains_key(doc.id()) {
                return Err(BackendError::new(
                    super::BackendErrorKind::AlreadyExists,
                    format!("{} {} already exists", self.name, doc.id()),
                ));
            }
            docs.insert(doc.id().to_string(), doc);
        }
        self.fan_out();
        Ok(())
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut D)) -> BackendResult<()> {
        {
            let mut docs = self.docs.write();
            let doc = docs
                .get_mut(id)
                .ok_or_else(|| BackendError::not_found(format!("{} {}", self.name, id)))?;
            apply(doc);
        }
        self.fan_out();
        Ok(())
    }

    /// Notify listeners outside the collection locks so callbacks may read the store
    fn fan_out(&self) {
        let listeners: Vec<_> = self.listeners.iter().map(|e| e.value().clone()).collect();
        for listener in listeners {
            listener.notify(|| self.snapshot());
        }
    }

    fn subscribe(&self, filter: F, callback: ChangeCallback<D>) -> Subscription {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener = Arc::new(Listener {
            filter,
            callback,
            last_seen: Mutex::new(HashMap::new()),
            delivery: ReentrantMutex::new(()),
        });
        {
            // 注册与 baseline 之间的写入必须排在 baseline 之后
            let _delivery = listener.delivery.lock();
            self.listeners.insert(id, listener.clone());
            tracing::debug!(collection = self.name, listener_id = id, "Listener attached");
            listener.baseline(&self.snapshot());
        }

        let registry: Weak<DashMap<u64, Arc<Listener<D, F>>>> = Arc::downgrade(&self.listeners);
        let name = self.name;
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(&id);
                tracing::debug!(collection = name, listener_id = id, "Listener detached");
            }
        })
    }

    fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory [`DocumentStore`]
pub struct MemoryStore {
    orders: Collection<Order, OrderFilter>,
    waiter_calls: Collection<WaiterCall, WaiterCallFilter>,
    faults: Mutex<VecDeque<BackendError>>,
    latency: RwLock<Option<Duration>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            orders: Collection::new("order"),
            waiter_calls: Collection::new("waiter_call"),
            faults: Mutex::new(VecDeque::new()),
            latency: RwLock::new(None),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Fail the next call (read or write) with `err`
    pub fn fail_next(&self, err: BackendError) {
        self.faults.lock().push_back(err);
    }

    /// Fail the next `n` calls with `err`
    pub fn fail_next_n(&self, err: BackendError, n: usize) {
        let mut faults = self.faults.lock();
        for _ in 0..n {
            faults.push_back(err.clone());
        }
    }

    /// Delay every read/write by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Number of read calls attempted (including failed ones)
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls attempted (including failed ones)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn order_listener_count(&self) -> usize {
        self.orders.listener_count()
    }

    pub fn waiter_call_listener_count(&self) -> usize {
        self.waiter_calls.listener_count()
    }

    async fn enter(&self, counter: &AtomicUsize) -> BackendResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.faults.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn query_orders(&self, query: &OrderQuery) -> BackendResult<Vec<Order>> {
        self.enter(&self.reads).await?;

        let mut docs: Vec<Order> = self
            .orders
            .snapshot()
            .into_iter()
            .filter(|o| query.filter.matches(o))
            .collect();
        sort_desc(&mut docs);

        let start = match &query.start_after {
            Some(Cursor { id, created_at }) => docs
                .iter()
                .position(|o| (o.created_at, o.id.as_str()) < (*created_at, id.as_str()))
                .unwrap_or(docs.len()),
            None => 0,
        };
        Ok(docs.into_iter().skip(start).take(query.limit).collect())
    }

    async fn get_order(&self, id: &str) -> BackendResult<Option<Order>> {
        self.enter(&self.reads).await?;
        Ok(self.orders.get(id))
    }

    async fn create_order(&self, order: Order) -> BackendResult<()> {
        self.enter(&self.writes).await?;
        self.orders.insert(order)
    }

    async fn update_order(&self, id: &str, patch: &OrderPatch) -> BackendResult<()> {
        self.enter(&self.writes).await?;
        self.orders.update(id, |order| order.apply(patch))
    }

    async fn get_waiter_call(&self, id: &str) -> BackendResult<Option<WaiterCall>> {
        self.enter(&self.reads).await?;
        Ok(self.waiter_calls.get(id))
    }

    async fn create_waiter_call(&self, call: WaiterCall) -> BackendResult<()> {
        self.enter(&self.writes).await?;
        self.waiter_calls.insert(call)
    }

    async fn update_waiter_call(&self, id: &str, patch: &WaiterCallPatch) -> BackendResult<()> {
        self.enter(&self.writes).await?;
        self.waiter_calls.update(id, |call| call.apply(patch))
    }

    fn subscribe_orders(
        &self,
        filter: OrderFilter,
        on_change: ChangeCallback<Order>,
    ) -> BackendResult<Subscription> {
        Ok(self.orders.subscribe(filter, on_change))
    }

    fn subscribe_waiter_calls(
        &self,
        filter: WaiterCallFilter,
        on_change: ChangeCallback<WaiterCall>,
    ) -> BackendResult<Subscription> {
        Ok(self.waiter_calls.subscribe(filter, on_change))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;
    use shared::{OrderStatus, WaiterCallStatus};

    fn order(id: &str, tenant: &str, created_at: i64) -> Order {
        Order {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            sub_scope: None,
            table_number: 1,
            items: vec![],
            total: 0.0,
            status: OrderStatus::Pending,
            created_at,
            resolved_at: None,
        }
    }

    fn recorder<T: Send + 'static>() -> (ChangeCallback<T>, Arc<Mutex<Vec<ChangeSet<T>>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (Arc::new(move |set| sink.lock().push(set)), log)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_deliver_in_order() {
        let store = Arc::new(MemoryStore::new());
        let (callback, log) = recorder::<Order>();
        let _sub = store
            .subscribe_orders(OrderFilter::tenant("t1"), callback)
            .unwrap();

        let writers: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .create_order(order(&format!("o{i:02}"), "t1", i))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for w in writers {
            w.await.unwrap();
        }

        let sizes: Vec<usize> = log.lock().iter().map(|set| set.docs.len()).collect();
        assert_eq!(sizes.first(), Some(&0));
        assert_eq!(sizes.last(), Some(&32));
        // 每次投递都比上一次新
        assert!(sizes.windows(2).all(|w| w[0] < w[1]), "{sizes:?}");
    }

    #[tokio::test]
    async fn test_query_orders_pages_with_cursor() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.create_order(order(&format!("o{i}"), "t1", 100 + i)).await.unwrap();
        }
        store.create_order(order("other", "t2", 500)).await.unwrap();

        let mut query = OrderQuery {
            filter: OrderFilter::tenant("t1"),
            limit: 2,
            start_after: None,
        };
        let page = store.query_orders(&query).await.unwrap();
        let ids: Vec<_> = page.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o4", "o3"]);

        query.start_after = Some(Cursor::after(page.last().unwrap()));
        let page = store.query_orders(&query).await.unwrap();
        let ids: Vec<_> = page.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o2", "o1"]);

        query.start_after = Some(Cursor::after(page.last().unwrap()));
        let page = store.query_orders(&query).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "o0");
    }

    #[tokio::test]
    async fn test_baseline_then_deltas() {
        let store = MemoryStore::new();
        store
            .create_waiter_call(WaiterCall::new("c1", "t1", 5, 10))
            .await
            .unwrap();

        let (callback, log) = recorder();
        let sub = store
            .subscribe_waiter_calls(WaiterCallFilter::pending("t1"), callback)
            .unwrap();

        {
            let log = log.lock();
            assert_eq!(log.len(), 1);
            assert_eq!(log[0].docs.len(), 1);
            assert_eq!(log[0].added().count(), 1);
        }

        store
            .create_waiter_call(WaiterCall::new("c2", "t1", 6, 20))
            .await
            .unwrap();
        store
            .update_waiter_call("c1", &WaiterCallPatch::resolve(30))
            .await
            .unwrap();

        {
            let log = log.lock();
            assert_eq!(log.len(), 3);
            assert_eq!(log[1].docs.len(), 2);
            assert_eq!(log[1].changes.len(), 1);
            assert_eq!(log[1].changes[0].kind, ChangeKind::Added);
            assert_eq!(log[2].docs.len(), 1);
            assert_eq!(log[2].changes[0].kind, ChangeKind::Removed);
            assert_eq!(log[2].changes[0].doc.id, "c1");
        }

        sub.dispose();
        assert_eq!(store.waiter_call_listener_count(), 0);
        store
            .create_waiter_call(WaiterCall::new("c3", "t1", 7, 40))
            .await
            .unwrap();
        assert_eq!(log.lock().len(), 3);

        let call = store.get_waiter_call("c1").await.unwrap().unwrap();
        assert_eq!(call.status, WaiterCallStatus::Resolved);
    }

    #[tokio::test]
    async fn test_unrelated_writes_are_not_delivered() {
        let store = MemoryStore::new();
        let (callback, log) = recorder();
        let _sub = store.subscribe_orders(OrderFilter::tenant("t1"), callback).unwrap();
        store.create_order(order("x", "t2", 1)).await.unwrap();
        // Baseline only; the t2 write produced no delta for this listener
        assert_eq!(log.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_modified_event() {
        let store = MemoryStore::new();
        store.create_order(order("o1", "t1", 1)).await.unwrap();
        let (callback, log) = recorder();
        let _sub = store.subscribe_orders(OrderFilter::tenant("t1"), callback).unwrap();

        store
            .update_order("o1", &OrderPatch::status(OrderStatus::Accepted, 2))
            .await
            .unwrap();
        let log = log.lock();
        assert_eq!(log[1].modified().count(), 1);
        assert_eq!(log[1].docs[0].status, OrderStatus::Accepted);
    }

    #[tokio::test]
    async fn test_fault_injection_and_errors() {
        let store = MemoryStore::new();
        store.fail_next(BackendError::unavailable("down"));
        let err = store.get_order("o1").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Unavailable);
        assert!(store.get_order("o1").await.unwrap().is_none());
        assert_eq!(store.read_count(), 2);

        let err = store
            .update_order("missing", &OrderPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::NotFound);

        store.create_order(order("o1", "t1", 1)).await.unwrap();
        let err = store.create_order(order("o1", "t1", 1)).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::AlreadyExists);
    }
}
