//! Paginated order reads
//!
//! Cursor-based, forward-only. One extra document is requested per page to
//! learn whether another page exists. Results arriving after `unmount()` or
//! after a newer `refresh()` are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use shared::error::AppError;
use shared::{Order, OrderStatus};

use crate::backend::{Cursor, DocumentStore, OrderFilter, OrderQuery};
use crate::retry::{RetryConfig, with_retry};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedOrdersOptions {
    pub tenant_id: String,
    pub sub_scope: Option<String>,
    pub status: Option<OrderStatus>,
    pub page_size: usize,
}

impl PaginatedOrdersOptions {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            sub_scope: None,
            status: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_sub_scope(mut self, sub_scope: impl Into<String>) -> Self {
        self.sub_scope = Some(sub_scope.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn filter(&self) -> OrderFilter {
        OrderFilter {
            tenant_id: self.tenant_id.clone(),
            sub_scope: self.sub_scope.clone(),
            status: self.status,
            table_number: None,
        }
    }
}

#[derive(Default)]
struct PageState {
    orders: Vec<Order>,
    cursor: Option<Cursor>,
    has_more: bool,
    error: Option<AppError>,
}

/// Forward-only paged view over a tenant's orders
pub struct PaginatedOrders {
    store: Arc<dyn DocumentStore>,
    options: PaginatedOrdersOptions,
    retry: RetryConfig,
    state: Mutex<PageState>,
    loading: AtomicBool,
    mounted: AtomicBool,
    /// Bumped by every refresh; stale page results are discarded
    generation: AtomicU64,
}

impl PaginatedOrders {
    /// Mount and load the first page
    pub async fn mount(store: Arc<dyn DocumentStore>, options: PaginatedOrdersOptions) -> Self {
        Self::mount_with_retry(store, options, RetryConfig::read()).await
    }

    pub async fn mount_with_retry(
        store: Arc<dyn DocumentStore>,
        options: PaginatedOrdersOptions,
        retry: RetryConfig,
    ) -> Self {
        let pager = Self {
            store,
            options,
            retry,
            state: Mutex::new(PageState::default()),
            loading: AtomicBool::new(false),
            mounted: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        };
        pager.refresh().await;
        pager
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state.lock().orders.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Last failure, mapped for display
    pub fn error(&self) -> Option<AppError> {
        self.state.lock().error.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Append the next page
    ///
    /// No-op (returns `false`) while a load is in flight, when no further
    /// page exists, or after unmount.
    pub async fn load_more(&self) -> bool {
        if !self.is_mounted() || !self.has_more() {
            return false;
        }
        if self.loading.swap(true, Ordering::SeqCst) {
            tracing::debug!("load_more ignored, load already in flight");
            return false;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let cursor = self.state.lock().cursor.clone();
        self.fetch(cursor, generation, false).await;
        true
    }

    /// Drop the cursor and reload the first page, replacing the list
    pub async fn refresh(&self) {
        if !self.is_mounted() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.loading.store(true, Ordering::SeqCst);
        self.fetch(None, generation, true).await;
    }

    /// Stop applying results; in-flight reads finish but are ignored
    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    async fn fetch(&self, cursor: Option<Cursor>, generation: u64, replace: bool) {
        let page_size = self.options.page_size;
        let query = OrderQuery {
            filter: self.options.filter(),
            limit: page_size + 1,
            start_after: cursor,
        };

        let store = self.store.clone();
        let outcome = with_retry(&self.retry, || {
            let store = store.clone();
            let query = query.clone();
            async move { store.query_orders(&query).await }
        })
        .await;

        if !self.is_mounted() {
            tracing::debug!(tenant_id = %self.options.tenant_id, "Page arrived after unmount, dropped");
            self.loading.store(false, Ordering::SeqCst);
            return;
        }
        // 被更新的 refresh 取代, loading 由它负责复位
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Stale page dropped after refresh");
            return;
        }

        {
            let mut state = self.state.lock();
            match outcome.result {
                Ok(mut docs) => {
                    state.has_more = docs.len() > page_size;
                    docs.truncate(page_size);
                    if let Some(last) = docs.last() {
                        state.cursor = Some(Cursor::after(last));
                    } else if replace {
                        state.cursor = None;
                    }
                    if replace {
                        state.orders = docs;
                    } else {
                        state.orders.extend(docs);
                    }
                    state.error = None;
                    tracing::debug!(
                        tenant_id = %self.options.tenant_id,
                        loaded = state.orders.len(),
                        has_more = state.has_more,
                        "Orders page loaded"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        tenant_id = %self.options.tenant_id,
                        attempts = outcome.attempts,
                        error = %e,
                        "Failed to load orders page"
                    );
                    if replace {
                        state.has_more = false;
                    }
                    state.error = Some(AppError::from(e));
                }
            }
        }
        self.loading.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryStore};

    fn order(id: &str, tenant: &str, created_at: i64, status: OrderStatus) -> Order {
        Order {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            sub_scope: None,
            table_number: 1,
            items: vec![],
            total: 0.0,
            status,
            created_at,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn test_exact_page_has_no_more() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..3 {
            store
                .create_order(order(&format!("o{i}"), "t1", i, OrderStatus::Pending))
                .await
                .unwrap();
        }
        let pager =
            PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("t1").with_page_size(3)).await;
        assert_eq!(pager.len(), 3);
        assert!(!pager.has_more());
        assert!(!pager.load_more().await);
    }

    #[tokio::test]
    async fn test_status_filter_and_refresh_replaces() {
        let store = Arc::new(MemoryStore::new());
        store.create_order(order("a", "t1", 1, OrderStatus::Ready)).await.unwrap();
        store.create_order(order("b", "t1", 2, OrderStatus::Pending)).await.unwrap();
        store.create_order(order("c", "t2", 3, OrderStatus::Ready)).await.unwrap();

        let pager = PaginatedOrders::mount(
            store.clone(),
            PaginatedOrdersOptions::new("t1").with_status(OrderStatus::Ready),
        )
        .await;
        assert_eq!(pager.orders().iter().map(|o| o.id.as_str()).collect::<Vec<_>>(), ["a"]);

        store.create_order(order("d", "t1", 4, OrderStatus::Ready)).await.unwrap();
        pager.refresh().await;
        assert_eq!(
            pager.orders().iter().map(|o| o.id.as_str()).collect::<Vec<_>>(),
            ["d", "a"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_surfaces_error() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_n(BackendError::unavailable("down"), 3);
        let pager = PaginatedOrders::mount(store.clone(), PaginatedOrdersOptions::new("t1")).await;
        // read 预设: 3 次尝试
        assert_eq!(store.read_count(), 3);
        let err = pager.error().unwrap();
        assert_eq!(err.user_message(), "Network error, please check your connection");
        assert!(!pager.is_loading());

        pager.refresh().await;
        assert!(pager.error().is_none());
    }
}
