//! Order notification watcher
//!
//! Keeps the live order list of a tenant and turns change events into a
//! bounded notification log:
//!
//! - added after the baseline → `NewOrder` notification + toast + chime
//! - modified with a different status → `StatusChanged` notification + toast
//!
//! The baseline replay never alerts.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use shared::error::{AppError, AppResult};
use shared::{Order, OrderStatus};
use tokio::sync::broadcast;

use super::adapters::{OrderFeedEvent, subscribe_order_events};
use super::alerts::{Toast, ToastKind};
use super::{EVENT_CHANNEL_CAPACITY, WatcherOptions};
use crate::backend::{DocumentStore, OrderFilter, Subscription};

/// Notification log bound; oldest entries are dropped first
pub const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    StatusChanged { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderNotification {
    pub id: String,
    pub kind: NotificationKind,
    pub order_id: String,
    pub table_number: u32,
    pub message: String,
    pub created_at: i64,
    pub read: bool,
}

#[derive(Default)]
struct FeedState {
    orders: Vec<Order>,
    /// Newest first
    notifications: VecDeque<OrderNotification>,
}

struct Shared {
    filter: OrderFilter,
    options: WatcherOptions,
    state: Mutex<FeedState>,
    events: broadcast::Sender<OrderNotification>,
}

impl Shared {
    fn on_event(&self, event: OrderFeedEvent) {
        let now = self.options.clock.now_millis();
        let mut fresh = Vec::new();
        {
            let mut state = self.state.lock();
            if !event.is_baseline {
                let previous: HashMap<&str, OrderStatus> = state
                    .orders
                    .iter()
                    .map(|o| (o.id.as_str(), o.status))
                    .collect();

                for order in &event.added {
                    fresh.push(notification(
                        NotificationKind::NewOrder,
                        order,
                        format!("New order from table {}", order.table_number),
                        now,
                    ));
                }
                for order in &event.modified {
                    let Some(&from) = previous.get(order.id.as_str()) else {
                        continue;
                    };
                    if from != order.status {
                        fresh.push(notification(
                            NotificationKind::StatusChanged {
                                from,
                                to: order.status,
                            },
                            order,
                            format!("Table {} order is now {}", order.table_number, order.status),
                            now,
                        ));
                    }
                }
            }

            state.orders = event.orders;
            for n in &fresh {
                state.notifications.push_front(n.clone());
            }
            state.notifications.truncate(MAX_NOTIFICATIONS);
        }

        if event.is_baseline {
            tracing::debug!(filter = ?self.filter, "Order baseline received, alerts suppressed");
            return;
        }
        if fresh.is_empty() {
            return;
        }

        let mut has_new = false;
        for n in &fresh {
            has_new |= n.kind == NotificationKind::NewOrder;
            if let Some(alerts) = &self.options.alerts {
                alerts.sink.show(&Toast {
                    kind: match n.kind {
                        NotificationKind::NewOrder => ToastKind::NewOrder,
                        NotificationKind::StatusChanged { .. } => ToastKind::StatusChanged,
                    },
                    title: format!("Table {}", n.table_number),
                    message: n.message.clone(),
                    table_number: n.table_number,
                    reference_id: n.order_id.clone(),
                });
            }
        }
        if has_new && let Some(alerts) = &self.options.alerts {
            alerts.chime.ring();
        }
        tracing::debug!(count = fresh.len(), "Order notifications raised");
        for n in fresh {
            let _ = self.events.send(n);
        }
    }
}

fn notification(kind: NotificationKind, order: &Order, message: String, now: i64) -> OrderNotification {
    OrderNotification {
        id: shared::util::document_id(),
        kind,
        order_id: order.id.clone(),
        table_number: order.table_number,
        message,
        created_at: now,
        read: false,
    }
}

/// Live orders plus notification log for one tenant
pub struct OrderNotifier {
    shared: Arc<Shared>,
    subscription: Mutex<Option<Subscription>>,
}

impl OrderNotifier {
    pub fn mount(
        store: Arc<dyn DocumentStore>,
        filter: OrderFilter,
        options: WatcherOptions,
    ) -> AppResult<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            filter: filter.clone(),
            options,
            state: Mutex::new(FeedState::default()),
            events,
        });

        let sink = shared.clone();
        let subscription =
            subscribe_order_events(store.as_ref(), filter.clone(), move |e| sink.on_event(e))
                .map_err(|e| {
                    tracing::error!(tenant_id = %filter.tenant_id, error = %e, "Order subscription failed");
                    AppError::from(e)
                })?;
        tracing::info!(tenant_id = %filter.tenant_id, "Order notifier mounted");

        Ok(Self {
            shared,
            subscription: Mutex::new(Some(subscription)),
        })
    }

    /// Current live orders (newest first)
    pub fn orders(&self) -> Vec<Order> {
        self.shared.state.lock().orders.clone()
    }

    /// Notification log, newest first
    pub fn notifications(&self) -> Vec<OrderNotification> {
        self.shared
            .state
            .lock()
            .notifications
            .iter()
            .cloned()
            .collect()
    }

    pub fn unread_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn mark_all_read(&self) {
        for n in self.shared.state.lock().notifications.iter_mut() {
            n.read = true;
        }
    }

    pub fn clear(&self) {
        self.shared.state.lock().notifications.clear();
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrderNotification> {
        self.shared.events.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn unmount(&self) {
        if let Some(sub) = self.subscription.lock().take() {
            sub.dispose();
            tracing::info!(tenant_id = %self.shared.filter.tenant_id, "Order notifier unmounted");
        }
    }
}

impl Drop for OrderNotifier {
    fn drop(&mut self) {
        self.unmount();
    }
}
