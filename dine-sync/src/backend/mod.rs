//! Document-store boundary
//!
//! The managed backend (persistence + real-time change streams) is an
//! external collaborator. Everything the sync core needs from it is
//! expressed by [`DocumentStore`]:
//!
//! - **Read query**: equality filters, `created_at` descending, limit and an
//!   opaque forward [`Cursor`]
//! - **Change subscription**: filter + callback, returns a [`Subscription`]
//!   that detaches the listener on `dispose()` or drop
//! - **Write calls**: create / partial update by document id
//!
//! [`MemoryStore`] is the in-process implementation used by tests and the
//! demo binary.

mod error;
mod memory;

pub use error::{BackendError, BackendErrorKind};
pub use memory::MemoryStore;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{Order, OrderPatch, OrderStatus, WaiterCall, WaiterCallPatch, WaiterCallStatus};

pub type BackendResult<T> = Result<T, BackendError>;

/// Callback invoked with the materialized result set on every change
pub type ChangeCallback<T> = Arc<dyn Fn(ChangeSet<T>) + Send + Sync>;

// ============================================================================
// Documents and filters
// ============================================================================

/// A document stored in a backend collection
pub trait Document: Clone + PartialEq + Send + Sync + 'static {
    fn id(&self) -> &str;
    /// Creation time, used for the default `created_at desc` ordering
    fn created_at(&self) -> i64;
}

impl Document for Order {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl Document for WaiterCall {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> i64 {
        self.created_at
    }
}

/// Equality predicate over a document type
pub trait Filter<D>: Clone + Send + Sync + 'static {
    fn matches(&self, doc: &D) -> bool;
}

/// Order filter: tenant equality plus optional sub-scope / status / table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub tenant_id: String,
    pub sub_scope: Option<String>,
    pub status: Option<OrderStatus>,
    pub table_number: Option<u32>,
}

impl OrderFilter {
    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_sub_scope(mut self, sub_scope: impl Into<String>) -> Self {
        self.sub_scope = Some(sub_scope.into());
        self
    }
}

impl Filter<Order> for OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        order.tenant_id == self.tenant_id
            && self
                .sub_scope
                .as_ref()
                .is_none_or(|s| order.sub_scope.as_ref() == Some(s))
            && self.status.is_none_or(|s| order.status == s)
            && self.table_number.is_none_or(|t| order.table_number == t)
    }
}

/// Waiter call filter: tenant equality plus optional status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaiterCallFilter {
    pub tenant_id: String,
    pub status: Option<WaiterCallStatus>,
}

impl WaiterCallFilter {
    /// Pending calls of one tenant
    pub fn pending(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            status: Some(WaiterCallStatus::Pending),
        }
    }
}

impl Filter<WaiterCall> for WaiterCallFilter {
    fn matches(&self, call: &WaiterCall) -> bool {
        call.tenant_id == self.tenant_id && self.status.is_none_or(|s| call.status == s)
    }
}

// ============================================================================
// Query
// ============================================================================

/// Opaque forward cursor: the last document seen on the previous page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    pub created_at: i64,
}

impl Cursor {
    pub fn after<D: Document>(doc: &D) -> Self {
        Self {
            id: doc.id().to_string(),
            created_at: doc.created_at(),
        }
    }
}

/// Order read query (ordered by `created_at` descending, id as tiebreak)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub filter: OrderFilter,
    pub limit: usize,
    pub start_after: Option<Cursor>,
}

// ============================================================================
// Change stream
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange<T> {
    pub kind: ChangeKind,
    pub doc: T,
}

/// One delivery on a change stream
///
/// `docs` is the full current result set matching the filter; `changes` is
/// the delta since the previous delivery. The first delivery after
/// subscribing replays every matching document as [`ChangeKind::Added`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    pub docs: Vec<T>,
    pub changes: Vec<DocumentChange<T>>,
}

impl<T> ChangeSet<T> {
    pub fn added(&self) -> impl Iterator<Item = &T> {
        self.changes_of(ChangeKind::Added)
    }

    pub fn modified(&self) -> impl Iterator<Item = &T> {
        self.changes_of(ChangeKind::Modified)
    }

    fn changes_of(&self, kind: ChangeKind) -> impl Iterator<Item = &T> {
        self.changes
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| &c.doc)
    }
}

/// Live listener handle
///
/// Scoped resource: the listener is detached on [`dispose`](Self::dispose)
/// or when the handle is dropped, on every exit path.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Detach the listener now
    pub fn dispose(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Managed document backend
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Ordered, paged read over a tenant's orders
    async fn query_orders(&self, query: &OrderQuery) -> BackendResult<Vec<Order>>;

    async fn get_order(&self, id: &str) -> BackendResult<Option<Order>>;

    /// Create an order document under its own id
    async fn create_order(&self, order: Order) -> BackendResult<()>;

    async fn update_order(&self, id: &str, patch: &OrderPatch) -> BackendResult<()>;

    async fn get_waiter_call(&self, id: &str) -> BackendResult<Option<WaiterCall>>;

    async fn create_waiter_call(&self, call: WaiterCall) -> BackendResult<()>;

    async fn update_waiter_call(&self, id: &str, patch: &WaiterCallPatch) -> BackendResult<()>;

    /// Attach a change listener over orders matching `filter`
    fn subscribe_orders(
        &self,
        filter: OrderFilter,
        on_change: ChangeCallback<Order>,
    ) -> BackendResult<Subscription>;

    /// Attach a change listener over waiter calls matching `filter`
    fn subscribe_waiter_calls(
        &self,
        filter: WaiterCallFilter,
        on_change: ChangeCallback<WaiterCall>,
    ) -> BackendResult<Subscription>;
}
