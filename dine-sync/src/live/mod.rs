//! Live subscriptions and reconciliation watchers
//!
//! ```text
//! DocumentStore change stream
//!       │ ChangeSet (full list + delta)
//!       ▼
//! adapters  ── subscribe_waiter_calls / subscribe_order_events
//!       │ full list (+ baseline tag)
//!       ▼
//! watchers ── WaiterCallWatcher / OrderNotifier
//!   ├── 本地状态 (仅由回调写入, 乐观删除除外)
//!   ├── alerts: toast + chime (baseline 不提醒)
//!   └── broadcast: 状态变更事件
//! ```

pub mod adapters;
pub mod alerts;
pub mod order_notifications;
pub mod waiter_calls;

pub use adapters::{OrderFeedEvent, subscribe_order_events, subscribe_orders, subscribe_waiter_calls};
pub use alerts::{
    AlertSink, Alerts, AudioGate, Chime, ChimePlayer, RecordingAlertSink, RecordingChime,
    Toast, ToastKind, Tone, TracingAlertSink, TracingChime, TwoToneChime,
};
pub use order_notifications::{
    MAX_NOTIFICATIONS, NotificationKind, OrderNotification, OrderNotifier,
};
pub use waiter_calls::{WaiterCallEvent, WaiterCallView, WaiterCallWatcher};

use std::time::Duration;

use shared::models::URGENT_THRESHOLD_MS;

use crate::retry::RetryConfig;
use crate::utils::{SharedClock, system_clock};

/// Broadcast capacity for watcher events
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Collaborators shared by every watcher
#[derive(Clone)]
pub struct WatcherOptions {
    pub clock: SharedClock,
    /// `None` = silent (no toasts, no chime)
    pub alerts: Option<Alerts>,
    /// Policy for dismiss/resolve writes
    pub retry: RetryConfig,
    pub urgent_threshold: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            clock: system_clock(),
            alerts: None,
            retry: RetryConfig::write(),
            urgent_threshold: Duration::from_millis(URGENT_THRESHOLD_MS as u64),
        }
    }
}

impl WatcherOptions {
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_alerts(mut self, alerts: Alerts) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_urgent_threshold(mut self, threshold: Duration) -> Self {
        self.urgent_threshold = threshold;
        self
    }
}
