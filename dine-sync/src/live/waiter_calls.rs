//! Waiter call watcher
//!
//! Holds the pending-call list of one tenant, fed only by the change stream.
//! Dismissal is two-phase:
//!
//! 1. optimistic: the call disappears from the local view immediately
//! 2. authoritative: the retried backend write triggers a change event that
//!    overwrites the local view unconditionally
//!
//! If the write finally fails, the view rolls back to the last authoritative
//! list.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use shared::error::{AppError, AppResult};
use shared::{WaiterCall, WaiterCallPatch};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::adapters::subscribe_waiter_calls;
use super::alerts::{Toast, ToastKind};
use super::{EVENT_CHANNEL_CAPACITY, WatcherOptions};
use crate::backend::{DocumentStore, Subscription};
use crate::retry::with_retry;

/// A pending call with its derived urgency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiterCallView {
    #[serde(flatten)]
    pub call: WaiterCall,
    pub waiting_ms: i64,
    pub is_urgent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WaiterCallEvent {
    /// Local view changed (stream delivery, optimistic removal or rollback)
    Updated { pending: usize },
    /// A call arrived after the baseline snapshot
    NewCall(WaiterCall),
    /// Dismiss write failed, view rolled back
    DismissFailed { call_id: String },
    /// Urgent count changed with the passage of time (ticker)
    UrgencyChanged { urgent: usize },
}

#[derive(Default)]
struct CallState {
    /// Last list delivered by the change stream
    authoritative: Vec<WaiterCall>,
    /// What callers see: authoritative minus optimistic removals
    view: Vec<WaiterCall>,
    baseline_seen: bool,
}

struct Shared {
    tenant_id: String,
    options: WatcherOptions,
    state: Mutex<CallState>,
    events: broadcast::Sender<WaiterCallEvent>,
}

impl Shared {
    fn on_snapshot(&self, calls: Vec<WaiterCall>) {
        let new_calls: Vec<WaiterCall> = {
            let mut state = self.state.lock();
            let new_calls = if state.baseline_seen {
                calls
                    .iter()
                    .filter(|c| !state.authoritative.iter().any(|p| p.id == c.id))
                    .cloned()
                    .collect()
            } else {
                state.baseline_seen = true;
                Vec::new()
            };
            state.authoritative = calls.clone();
            state.view = calls;
            new_calls
        };

        tracing::debug!(
            tenant_id = %self.tenant_id,
            pending = self.pending_count(),
            new = new_calls.len(),
            "Waiter calls updated"
        );

        if !new_calls.is_empty() {
            if let Some(alerts) = &self.options.alerts {
                for call in &new_calls {
                    alerts.sink.show(&Toast {
                        kind: ToastKind::WaiterCall,
                        title: format!("Table {}", call.table_number),
                        message: "A guest is calling for a waiter".to_string(),
                        table_number: call.table_number,
                        reference_id: call.id.clone(),
                    });
                }
                alerts.chime.ring();
            }
            for call in new_calls {
                let _ = self.events.send(WaiterCallEvent::NewCall(call));
            }
        }
        self.notify_updated();
    }

    fn pending_count(&self) -> usize {
        self.state
            .lock()
            .view
            .iter()
            .filter(|c| c.status.is_pending())
            .count()
    }

    fn views(&self) -> Vec<WaiterCallView> {
        let now = self.options.clock.now_millis();
        let threshold = self.options.urgent_threshold.as_millis() as i64;
        self.state
            .lock()
            .view
            .iter()
            .filter(|c| c.status.is_pending())
            .map(|c| WaiterCallView {
                call: c.clone(),
                waiting_ms: c.waiting_ms(now),
                is_urgent: c.is_urgent_with(now, threshold),
            })
            .collect()
    }

    fn urgent_count(&self) -> usize {
        self.views().iter().filter(|c| c.is_urgent).count()
    }

    fn notify_updated(&self) {
        let pending = self.pending_count();
        let _ = self.events.send(WaiterCallEvent::Updated { pending });
    }
}

/// Live pending waiter calls of one tenant
pub struct WaiterCallWatcher {
    shared: Arc<Shared>,
    store: Arc<dyn DocumentStore>,
    subscription: Mutex<Option<Subscription>>,
    ticker: Mutex<Option<CancellationToken>>,
}

impl WaiterCallWatcher {
    /// Subscribe and receive the baseline snapshot
    pub fn mount(
        store: Arc<dyn DocumentStore>,
        tenant_id: impl Into<String>,
        options: WatcherOptions,
    ) -> AppResult<Self> {
        let tenant_id = tenant_id.into();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            tenant_id: tenant_id.clone(),
            options,
            state: Mutex::new(CallState::default()),
            events,
        });

        let sink = shared.clone();
        let subscription =
            subscribe_waiter_calls(store.as_ref(), &tenant_id, move |calls| sink.on_snapshot(calls))
                .map_err(|e| {
                    tracing::error!(tenant_id = %tenant_id, error = %e, "Waiter call subscription failed");
                    AppError::from(e)
                })?;
        tracing::info!(tenant_id = %tenant_id, "Waiter call watcher mounted");

        Ok(Self {
            shared,
            store,
            subscription: Mutex::new(Some(subscription)),
            ticker: Mutex::new(None),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.shared.tenant_id
    }

    /// Pending calls with urgency computed against the current time
    pub fn calls(&self) -> Vec<WaiterCallView> {
        self.shared.views()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending_count()
    }

    pub fn urgent_count(&self) -> usize {
        self.shared.urgent_count()
    }

    /// Recompute urgency every `period`, broadcasting when the count changes
    ///
    /// Urgency depends on wall-clock time alone, so no stream event fires
    /// when a call crosses the threshold. Requires a tokio runtime; a second
    /// call while running is ignored.
    pub fn start_urgency_ticker(&self, period: Duration) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let shutdown = token.clone();
        let shared = self.shared.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last = shared.urgent_count();
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let urgent = shared.urgent_count();
                        if urgent != last {
                            last = urgent;
                            tracing::debug!(tenant_id = %shared.tenant_id, urgent, "Urgent waiter calls changed");
                            let _ = shared.events.send(WaiterCallEvent::UrgencyChanged { urgent });
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::debug!(tenant_id = %shared.tenant_id, "Urgency ticker stopped");
                        return;
                    }
                }
            }
        });
        *ticker = Some(token);
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.lock().is_some()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WaiterCallEvent> {
        self.shared.events.subscribe()
    }

    /// Resolve a pending call
    ///
    /// No-op when the call is not pending in the local view (already
    /// dismissed, resolved, or unknown).
    pub async fn dismiss_call(&self, call_id: &str) -> AppResult<()> {
        {
            let mut state = self.shared.state.lock();
            let Some(pos) = state
                .view
                .iter()
                .position(|c| c.id == call_id && c.status.is_pending())
            else {
                tracing::debug!(call_id, "Dismiss ignored, call not pending");
                return Ok(());
            };
            state.view.remove(pos);
        }
        self.shared.notify_updated();

        let patch = WaiterCallPatch::resolve(self.shared.options.clock.now_millis());
        let store = self.store.clone();
        let outcome = with_retry(&self.shared.options.retry, || {
            let store = store.clone();
            let patch = patch.clone();
            let id = call_id.to_string();
            async move { store.update_waiter_call(&id, &patch).await }
        })
        .await;

        match outcome.result {
            Ok(()) => {
                tracing::info!(call_id, attempts = outcome.attempts, "Waiter call dismissed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(call_id, error = %e, "Failed to dismiss waiter call, rolling back");
                {
                    let mut state = self.shared.state.lock();
                    state.view = state.authoritative.clone();
                }
                let _ = self.shared.events.send(WaiterCallEvent::DismissFailed {
                    call_id: call_id.to_string(),
                });
                self.shared.notify_updated();
                Err(AppError::from(e))
            }
        }
    }

    /// Detach from the change stream; the last view stays readable
    pub fn unmount(&self) {
        if let Some(token) = self.ticker.lock().take() {
            token.cancel();
        }
        if let Some(sub) = self.subscription.lock().take() {
            sub.dispose();
            tracing::info!(tenant_id = %self.shared.tenant_id, "Waiter call watcher unmounted");
        }
    }
}

impl Drop for WaiterCallWatcher {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, BackendErrorKind, MemoryStore};
    use crate::live::alerts::{Alerts, AudioGate, Chime, RecordingAlertSink, RecordingChime};
    use crate::retry::RetryConfig;
    use crate::utils::ManualClock;
    use shared::WaiterCallStatus;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        sink: Arc<RecordingAlertSink>,
        chime: Arc<RecordingChime>,
        watcher: WaiterCallWatcher,
    }

    async fn fixture(existing: &[(&str, u32)]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        for (id, table) in existing {
            store
                .create_waiter_call(WaiterCall::new(*id, "t1", *table, 0))
                .await
                .unwrap();
        }
        let clock = Arc::new(ManualClock::new(0));
        let sink = Arc::new(RecordingAlertSink::new());
        let chime = Arc::new(RecordingChime::new());
        let gate = Arc::new(AudioGate::new());
        gate.record_interaction();

        let options = WatcherOptions::default()
            .with_clock(clock.clone())
            .with_alerts(Alerts::new(sink.clone(), Chime::new(gate, chime.clone())))
            .with_retry(RetryConfig::default().with_max_attempts(2).with_initial_delay_ms(10));
        let watcher = WaiterCallWatcher::mount(store.clone(), "t1", options).unwrap();
        Fixture {
            store,
            clock,
            sink,
            chime,
            watcher,
        }
    }

    #[tokio::test]
    async fn test_baseline_does_not_alert() {
        let f = fixture(&[("w1", 1), ("w2", 2)]).await;
        assert_eq!(f.watcher.pending_count(), 2);
        assert!(f.sink.toasts().is_empty());
        assert_eq!(f.chime.play_count(), 0);

        f.store
            .create_waiter_call(WaiterCall::new("w3", "t1", 3, 10))
            .await
            .unwrap();
        assert_eq!(f.watcher.pending_count(), 3);
        assert_eq!(f.sink.count_of(ToastKind::WaiterCall), 1);
        assert_eq!(f.chime.play_count(), 1);
    }

    #[tokio::test]
    async fn test_urgency_is_derived_from_clock() {
        let f = fixture(&[("w1", 5)]).await;
        f.clock.set(4 * 60 * 1000);
        assert_eq!(f.watcher.urgent_count(), 0);
        f.clock.set(5 * 60 * 1000 + 1_000);
        assert_eq!(f.watcher.urgent_count(), 1);
        assert!(f.watcher.calls()[0].is_urgent);
    }

    #[tokio::test]
    async fn test_dismiss_resolves_and_is_idempotent() {
        let f = fixture(&[("w1", 5)]).await;
        f.watcher.dismiss_call("w1").await.unwrap();
        assert_eq!(f.watcher.pending_count(), 0);
        let stored = f.store.get_waiter_call("w1").await.unwrap().unwrap();
        assert_eq!(stored.status, WaiterCallStatus::Resolved);

        let writes = f.store.write_count();
        f.watcher.dismiss_call("w1").await.unwrap();
        f.watcher.dismiss_call("unknown").await.unwrap();
        assert_eq!(f.store.write_count(), writes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dismiss_rolls_back() {
        let f = fixture(&[("w1", 5)]).await;
        let mut events = f.watcher.subscribe_events();
        f.store.fail_next_n(
            BackendError::new(BackendErrorKind::Unavailable, "offline"),
            2,
        );

        let err = f.watcher.dismiss_call("w1").await.unwrap_err();
        assert_eq!(err.code, shared::ErrorCode::ServiceUnavailable);
        assert_eq!(f.watcher.pending_count(), 1);

        let mut saw_rollback = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, WaiterCallEvent::DismissFailed { .. }) {
                saw_rollback = true;
            }
        }
        assert!(saw_rollback);
    }

    #[tokio::test(start_paused = true)]
    async fn test_urgency_ticker_broadcasts_threshold_crossing() {
        let f = fixture(&[("w1", 5)]).await;
        let mut events = f.watcher.subscribe_events();
        f.watcher.start_urgency_ticker(Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(events.try_recv().is_err());

        f.clock.set(5 * 60 * 1000 + 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            events.try_recv().unwrap(),
            WaiterCallEvent::UrgencyChanged { urgent: 1 }
        );

        f.watcher.unmount();
        f.clock.set(0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unmount_detaches() {
        let f = fixture(&[]).await;
        assert_eq!(f.store.waiter_call_listener_count(), 1);
        f.watcher.unmount();
        assert!(!f.watcher.is_mounted());
        assert_eq!(f.store.waiter_call_listener_count(), 0);

        f.store
            .create_waiter_call(WaiterCall::new("late", "t1", 1, 0))
            .await
            .unwrap();
        assert_eq!(f.watcher.pending_count(), 0);
    }
}
