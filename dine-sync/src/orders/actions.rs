//! Order and waiter call writes
//!
//! Every write is validated locally first, then sent through the retry
//! executor. The returned document is informational; watchers take their
//! state from the change stream.

use std::sync::Arc;

use shared::error::{AppError, AppResult, ErrorCode};
use shared::order::validate_new_order;
use shared::util::document_id;
use shared::{NewOrder, Order, OrderPatch, OrderStatus, WaiterCall, WaiterCallPatch};

use crate::backend::{BackendError, BackendErrorKind, DocumentStore};
use crate::retry::{RetryConfig, RetryOutcome, with_retry};
use crate::utils::{SharedClock, system_clock};

/// Write-side entry point for orders and waiter calls
pub struct OrderActions {
    store: Arc<dyn DocumentStore>,
    clock: SharedClock,
    /// Guest order placement
    place_retry: RetryConfig,
    /// Staff status changes and waiter calls
    write_retry: RetryConfig,
    read_retry: RetryConfig,
}

impl OrderActions {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            clock: system_clock(),
            place_retry: RetryConfig::critical(),
            write_retry: RetryConfig::write(),
            read_retry: RetryConfig::read(),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Override every retry policy (tests, demo)
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.place_retry = retry.clone();
        self.write_retry = retry.clone();
        self.read_retry = retry;
        self
    }

    /// Validate and create a guest order
    ///
    /// Invalid submissions (empty, bad items, total off by more than the
    /// tolerance) are rejected before any backend call.
    pub async fn place_order(&self, new: NewOrder) -> AppResult<Order> {
        if let Err(e) = validate_new_order(&new) {
            tracing::warn!(
                tenant_id = %new.tenant_id,
                table = new.table_number,
                code = %e.code,
                "Order rejected: {}",
                e.message
            );
            return Err(e);
        }

        let order = Order::from_new(document_id(), new, self.clock.now_millis());
        let store = self.store.clone();
        let outcome = with_retry(&self.place_retry, || {
            let store = store.clone();
            let order = order.clone();
            async move { store.create_order(order).await }
        })
        .await;

        accept_replayed_create(outcome)?;
        tracing::info!(
            order_id = %order.id,
            tenant_id = %order.tenant_id,
            table = order.table_number,
            total = order.total,
            "Order placed"
        );
        Ok(order)
    }

    /// Move an order to `status`, enforcing the status state machine
    ///
    /// Re-applying the current status returns the order without writing.
    pub async fn update_status(&self, order_id: &str, status: OrderStatus) -> AppResult<Order> {
        let mut order = self.load_order(order_id).await?;
        order.status.check_transition(order_id, status)?;
        if order.status == status {
            tracing::debug!(order_id, status = %status, "Status unchanged, skipping write");
            return Ok(order);
        }

        let patch = OrderPatch::status(status, self.clock.now_millis());
        let store = self.store.clone();
        let outcome = with_retry(&self.write_retry, || {
            let store = store.clone();
            let patch = patch.clone();
            let id = order_id.to_string();
            async move { store.update_order(&id, &patch).await }
        })
        .await;
        outcome.into_result().map_err(AppError::from)?;

        tracing::info!(order_id, from = %order.status, to = %status, "Order status updated");
        order.apply(&patch);
        Ok(order)
    }

    pub async fn cancel_order(&self, order_id: &str) -> AppResult<Order> {
        self.update_status(order_id, OrderStatus::Cancelled).await
    }

    /// Guest "call a waiter" for a table
    pub async fn create_waiter_call(&self, tenant_id: &str, table_number: u32) -> AppResult<WaiterCall> {
        if tenant_id.trim().is_empty() {
            return Err(AppError::new(ErrorCode::TenantNotSelected));
        }
        let call = WaiterCall::new(document_id(), tenant_id, table_number, self.clock.now_millis());
        let store = self.store.clone();
        let outcome = with_retry(&self.write_retry, || {
            let store = store.clone();
            let call = call.clone();
            async move { store.create_waiter_call(call).await }
        })
        .await;

        accept_replayed_create(outcome)?;
        tracing::info!(call_id = %call.id, tenant_id, table = table_number, "Waiter call created");
        Ok(call)
    }

    /// Resolve a waiter call outside a watcher
    ///
    /// Resolving an already resolved call is a no-op.
    pub async fn resolve_waiter_call(&self, call_id: &str) -> AppResult<WaiterCall> {
        let store = self.store.clone();
        let outcome = with_retry(&self.read_retry, || {
            let store = store.clone();
            let id = call_id.to_string();
            async move { store.get_waiter_call(&id).await }
        })
        .await;
        let mut call = outcome
            .into_result()
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::with_message(ErrorCode::WaiterCallNotFound, call_id))?;

        if !call.status.is_pending() {
            tracing::debug!(call_id, "Waiter call already resolved");
            return Ok(call);
        }

        let patch = WaiterCallPatch::resolve(self.clock.now_millis());
        let outcome = with_retry(&self.write_retry, || {
            let store = store.clone();
            let patch = patch.clone();
            let id = call_id.to_string();
            async move { store.update_waiter_call(&id, &patch).await }
        })
        .await;
        outcome.into_result().map_err(AppError::from)?;
        call.apply(&patch);
        Ok(call)
    }

    async fn load_order(&self, order_id: &str) -> AppResult<Order> {
        let store = self.store.clone();
        let outcome = with_retry(&self.read_retry, || {
            let store = store.clone();
            let id = order_id.to_string();
            async move { store.get_order(&id).await }
        })
        .await;
        outcome
            .into_result()
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::order(ErrorCode::OrderNotFound, order_id, "order not found"))
    }
}

/// A create retried after an ambiguous failure may hit its own first write
fn accept_replayed_create(outcome: RetryOutcome<()>) -> AppResult<()> {
    match outcome.result {
        Ok(()) => Ok(()),
        Err(BackendError {
            kind: BackendErrorKind::AlreadyExists,
            ..
        }) if outcome.attempts > 1 => {
            tracing::debug!(attempts = outcome.attempts, "Create already applied by an earlier attempt");
            Ok(())
        }
        Err(e) => Err(AppError::from(e)),
    }
}
