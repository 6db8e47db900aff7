//! Waiter call end-to-end: urgency over time, dismiss, double dismiss

use std::sync::Arc;
use std::time::Duration;

use dine_sync::live::{Alerts, AudioGate, Chime, RecordingAlertSink, RecordingChime, ToastKind};
use dine_sync::utils::ManualClock;
use dine_sync::{DocumentStore, MemoryStore, OrderActions, WaiterCallWatcher, WatcherOptions};
use shared::WaiterCallStatus;

const T0: i64 = 1_700_000_000_000;

#[tokio::test]
async fn test_waiter_call_urgency_and_dismiss() {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(T0));
    let actions = OrderActions::new(store.clone()).with_clock(clock.clone());

    let sink = Arc::new(RecordingAlertSink::new());
    let chime = Arc::new(RecordingChime::new());
    let gate = Arc::new(AudioGate::new());
    let options = WatcherOptions::default()
        .with_clock(clock.clone())
        .with_alerts(Alerts::new(sink.clone(), Chime::new(gate.clone(), chime.clone())));
    let watcher = WaiterCallWatcher::mount(store.clone(), "r1", options).unwrap();
    assert_eq!(watcher.pending_count(), 0);

    // Guest at table 5 calls at T
    let call = actions.create_waiter_call("r1", 5).await.unwrap();
    assert_eq!(watcher.pending_count(), 1);
    assert_eq!(sink.count_of(ToastKind::WaiterCall), 1);
    // No interaction yet: toast only, no sound
    assert_eq!(chime.play_count(), 0);

    clock.advance(Duration::from_secs(4 * 60));
    let calls = watcher.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].call.table_number, 5);
    assert!(!calls[0].is_urgent);
    assert_eq!(watcher.urgent_count(), 0);

    clock.set(T0 + 5 * 60 * 1000 + 1_000);
    assert!(watcher.calls()[0].is_urgent);
    assert_eq!(watcher.urgent_count(), 1);

    watcher.dismiss_call(&call.id).await.unwrap();
    assert_eq!(watcher.pending_count(), 0);
    assert_eq!(watcher.urgent_count(), 0);
    let stored = store.get_waiter_call(&call.id).await.unwrap().unwrap();
    assert_eq!(stored.status, WaiterCallStatus::Resolved);
    let resolved_at = stored.resolved_at;
    assert!(resolved_at.is_some());

    // Second dismiss: no write, status stays resolved
    let writes = store.write_count();
    watcher.dismiss_call(&call.id).await.unwrap();
    assert_eq!(store.write_count(), writes);
    let stored = store.get_waiter_call(&call.id).await.unwrap().unwrap();
    assert_eq!(stored.status, WaiterCallStatus::Resolved);
    assert_eq!(stored.resolved_at, resolved_at);

    // After the first interaction new calls also chime
    gate.record_interaction();
    actions.create_waiter_call("r1", 8).await.unwrap();
    assert_eq!(chime.play_count(), 1);
}

#[tokio::test]
async fn test_other_tenant_calls_are_invisible() {
    let store = Arc::new(MemoryStore::new());
    let actions = OrderActions::new(store.clone());
    let watcher = WaiterCallWatcher::mount(store.clone(), "r1", WatcherOptions::default()).unwrap();

    actions.create_waiter_call("r2", 1).await.unwrap();
    assert_eq!(watcher.pending_count(), 0);

    drop(watcher);
    assert_eq!(store.waiter_call_listener_count(), 0);
}
